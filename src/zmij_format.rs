//! YAML spellings of floating-point numbers.

use num_traits::float::FloatCore;
use zmij::Float;

/// Append `f` as a YAML float: `.nan`, `.inf`, `-.inf`, or a finite number that always
/// carries a decimal point (zmij renders `4e-6`, YAML 1.1 wants `4.0e-6`).
pub(crate) fn push_float_string<F: Float + FloatCore>(target: &mut String, f: F) {
    if f.is_nan() {
        target.push_str(".nan");
        return;
    }
    if f.is_infinite() {
        target.push_str(if f.is_sign_positive() { ".inf" } else { "-.inf" });
        return;
    }
    let mut buf = zmij::Buffer::new();
    let s = buf.format_finite(f);
    if s.contains('.') {
        target.push_str(s);
    } else if let Some(exp_pos) = s.find(['e', 'E']) {
        target.push_str(&s[..exp_pos]);
        target.push_str(".0");
        target.push_str(&s[exp_pos..]);
    } else {
        target.push_str(s);
        target.push_str(".0");
    }
}

/// Owned variant of [`push_float_string`].
pub(crate) fn float_string<F: Float + FloatCore>(f: F) -> String {
    let mut out = String::new();
    push_float_string(&mut out, f);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn special_values() {
        assert_eq!(float_string(f64::NAN), ".nan");
        assert_eq!(float_string(f64::INFINITY), ".inf");
        assert_eq!(float_string(f64::NEG_INFINITY), "-.inf");
    }

    #[test]
    fn always_has_a_decimal_point() {
        assert_eq!(float_string(3.0f64), "3.0");
        assert_eq!(float_string(1.5f64), "1.5");
        let tiny = float_string(4e-6f64);
        assert!(tiny.contains('.') && tiny.contains('e'), "{tiny}");
        assert_eq!(tiny.parse::<f64>().unwrap(), 4e-6);
    }
}
