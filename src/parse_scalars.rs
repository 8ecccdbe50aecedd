//! Scalar coercion rules of the YAML 1.1 type repository.
//!
//! Classifiers (`classify_int`, `is_float`, `is_null`) decide which grammar a scalar
//! matches; the coercion functions then convert text that already matched. Both are
//! pure: errors are returned without a position and the caller attaches the span of
//! the scalar event.

use crate::error::Error;

/// Radix of an integer literal, as detected from its prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntBase {
    Binary,
    Octal,
    Decimal,
    Hexadecimal,
    /// YAML 1.1 base 60 (`1:30:00`).
    Sexagesimal,
}

const YAML11_TRUE: [&str; 4] = ["true", "yes", "y", "on"];
const YAML11_FALSE: [&str; 4] = ["false", "no", "n", "off"];

/// YAML 1.1 boolean words, any letter case: `y`, `yes`, `on` and their negatives.
pub fn parse_yaml11_bool(s: &str) -> Result<bool, Error> {
    let t = s.trim();
    let is = |words: &[&str]| words.iter().any(|w| t.eq_ignore_ascii_case(w));
    if is(&YAML11_TRUE) {
        Ok(true)
    } else if is(&YAML11_FALSE) {
        Ok(false)
    } else {
        Err(Error::format(format!("invalid YAML 1.1 bool: `{s}`")))
    }
}

/// Parse only the exact `true`/`false` literals (any letter case).
pub fn parse_strict_bool(s: &str) -> Result<bool, Error> {
    let t = s.trim();
    if t.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if t.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(Error::format(format!("invalid bool: `{s}`")))
    }
}

/// Core schema booleans used when inferring the type of an untyped plain scalar.
pub fn core_bool(s: &str) -> Option<bool> {
    match s {
        "true" | "True" | "TRUE" => Some(true),
        "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

/// Any YAML 1.1 boolean word, the core forms included.
pub fn is_bool(s: &str) -> bool {
    parse_yaml11_bool(s).is_ok()
}

/// `^(null|Null|NULL|~?)$`
pub fn is_null(s: &str) -> bool {
    matches!(s, "" | "~" | "null" | "Null" | "NULL")
}

fn split_sign(s: &str) -> (bool, &str) {
    match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    }
}

fn all_digits_or_underscore(s: &str, radix: u32) -> bool {
    s.chars().all(|c| c == '_' || c.is_digit(radix))
}

/// Detect which integer grammar the literal matches, if any.
///
/// - base 2: `^[-+]?0b[0-1_]+$`
/// - base 8: `^[-+]?0[0-7_]+$` (and YAML 1.2 `0o`)
/// - base 10: `^[-+]?(0|[1-9][0-9_]*)$`
/// - base 16: `^[-+]?0x[0-9a-fA-F_]+$`
/// - base 60: `^[-+]?[1-9][0-9_]*(:[0-5]?[0-9])+$`
pub fn classify_int(s: &str) -> Option<IntBase> {
    let (_, rest) = split_sign(s);
    if rest.is_empty() {
        return None;
    }
    if let Some(bin) = rest.strip_prefix("0b") {
        return (!bin.is_empty() && all_digits_or_underscore(bin, 2)).then_some(IntBase::Binary);
    }
    if let Some(hex) = rest.strip_prefix("0x") {
        return (!hex.is_empty() && all_digits_or_underscore(hex, 16))
            .then_some(IntBase::Hexadecimal);
    }
    if let Some(oct) = rest.strip_prefix("0o") {
        return (!oct.is_empty() && all_digits_or_underscore(oct, 8)).then_some(IntBase::Octal);
    }
    if rest == "0" {
        return Some(IntBase::Decimal);
    }
    if let Some(oct) = rest.strip_prefix('0') {
        return all_digits_or_underscore(oct, 8).then_some(IntBase::Octal);
    }
    if !rest.starts_with(|c: char| ('1'..='9').contains(&c)) {
        return None;
    }
    if rest.contains(':') {
        let mut groups = rest.split(':');
        let head = groups.next().unwrap_or_default();
        if !all_digits_or_underscore(head, 10) {
            return None;
        }
        return groups.all(is_sexagesimal_group).then_some(IntBase::Sexagesimal);
    }
    all_digits_or_underscore(rest, 10).then_some(IntBase::Decimal)
}

/// `[0-5]?[0-9]`
fn is_sexagesimal_group(group: &str) -> bool {
    let b = group.as_bytes();
    match b.len() {
        1 => b[0].is_ascii_digit(),
        2 => (b'0'..=b'5').contains(&b[0]) && b[1].is_ascii_digit(),
        _ => false,
    }
}

fn too_large(s: &str) -> Error {
    Error::overflow(format!("value too large: `{s}`"))
}

/// Accumulate digits of `digits` in `radix`, skipping `_`, with checked arithmetic.
fn accumulate(digits: &str, radix: u32, original: &str) -> Result<u64, Error> {
    let mut val: u64 = 0;
    let mut saw = false;
    for c in digits.chars() {
        if c == '_' {
            continue;
        }
        let d = c
            .to_digit(radix)
            .ok_or_else(|| Error::format(format!("invalid integer: `{original}`")))?;
        val = val
            .checked_mul(radix as u64)
            .and_then(|v| v.checked_add(d as u64))
            .ok_or_else(|| too_large(original))?;
        saw = true;
    }
    if saw {
        Ok(val)
    } else {
        Err(Error::format(format!("invalid integer: `{original}`")))
    }
}

/// Coerce an integer literal into its mathematical value.
///
/// The magnitude is accumulated as `u64`; the sign applies to the whole value, so the
/// result spans `i64::MIN ..= u64::MAX`. Larger magnitudes are overflow errors, text that
/// matches no integer grammar is a format error.
pub fn parse_int(s: &str) -> Result<i128, Error> {
    let t = s.trim();
    let base = classify_int(t).ok_or_else(|| Error::format(format!("invalid integer: `{s}`")))?;
    let (neg, rest) = split_sign(t);
    let magnitude = match base {
        IntBase::Binary => accumulate(&rest[2..], 2, s)?,
        IntBase::Hexadecimal => accumulate(&rest[2..], 16, s)?,
        IntBase::Octal => {
            let digits = rest.strip_prefix("0o").unwrap_or(&rest[1..]);
            accumulate(digits, 8, s)?
        }
        IntBase::Decimal => accumulate(rest, 10, s)?,
        IntBase::Sexagesimal => {
            let mut acc: u64 = 0;
            for group in rest.split(':') {
                let g = accumulate(group, 10, s)?;
                acc = acc
                    .checked_mul(60)
                    .and_then(|v| v.checked_add(g))
                    .ok_or_else(|| too_large(s))?;
            }
            acc
        }
    };
    let magnitude = magnitude as i128;
    if neg {
        if magnitude > i64::MAX as i128 + 1 {
            return Err(too_large(s));
        }
        Ok(-magnitude)
    } else {
        Ok(magnitude)
    }
}

/// Re-check the range of a parsed value against a fixed-width target.
///
/// Arguments:
/// - `value`: result of [`parse_int`].
/// - `ty`: target type name for the message.
pub fn cast_int<T: TryFrom<i128>>(value: i128, ty: &str) -> Result<T, Error> {
    T::try_from(value).map_err(|_| Error::overflow(format!("value {value} is too large for {ty}")))
}

/// True if the text is a decimal float (YAML 1.1 grammar, with the relaxed YAML 1.2
/// exponent forms), a base 60 float, `.inf` or `.nan`.
///
/// Plain integers are not floats here; float targets accept them separately.
pub fn is_float(s: &str) -> bool {
    is_special_float(s) || is_decimal_float(s) || is_sexagesimal_float(s)
}

fn is_special_float(s: &str) -> bool {
    let (_, rest) = split_sign(s);
    matches!(rest, ".inf" | ".Inf" | ".INF") || matches!(s, ".nan" | ".NaN" | ".NAN")
}

/// `^[-+]?([0-9][0-9_]*)?\.[0-9_]*([eE][-+]?[0-9]+)?$`, or digits with an exponent.
fn is_decimal_float(s: &str) -> bool {
    let (_, rest) = split_sign(s);
    let (mantissa, exponent) = match rest.find(['e', 'E']) {
        Some(pos) => (&rest[..pos], Some(&rest[pos + 1..])),
        None => (rest, None),
    };
    if let Some(exp) = exponent {
        let digits = exp.strip_prefix(['-', '+']).unwrap_or(exp);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
    }
    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (mantissa, None),
    };
    if frac_part.is_none() && exponent.is_none() {
        return false;
    }
    if !int_part.is_empty() && !int_part.starts_with(|c: char| c.is_ascii_digit()) {
        return false;
    }
    let frac = frac_part.unwrap_or_default();
    all_digits_or_underscore(int_part, 10)
        && all_digits_or_underscore(frac, 10)
        && (int_part.bytes().any(|b| b.is_ascii_digit()) || frac.bytes().any(|b| b.is_ascii_digit()))
}

/// `^[-+]?[0-9][0-9_]*(:[0-5]?[0-9])+\.[0-9_]*$`
fn is_sexagesimal_float(s: &str) -> bool {
    let (_, rest) = split_sign(s);
    let Some((groups, frac)) = rest.rsplit_once('.') else {
        return false;
    };
    if !all_digits_or_underscore(frac, 10) || !groups.contains(':') {
        return false;
    }
    let mut parts = groups.split(':');
    let head = parts.next().unwrap_or_default();
    head.starts_with(|c: char| c.is_ascii_digit())
        && all_digits_or_underscore(head, 10)
        && parts.all(is_sexagesimal_group)
}

/// Coerce a float literal (or an integer literal) into `f64`.
///
/// Parsing never depends on the host locale: `_` separators are stripped and `.` is
/// the only decimal point.
pub fn parse_float(s: &str) -> Result<f64, Error> {
    let t = s.trim();
    let invalid = || Error::format(format!("invalid floating point value: `{s}`"));
    if is_special_float(t) {
        let (neg, rest) = split_sign(t);
        if rest.eq_ignore_ascii_case(".nan") {
            return Ok(f64::NAN);
        }
        return Ok(if neg { f64::NEG_INFINITY } else { f64::INFINITY });
    }
    if is_sexagesimal_float(t) {
        let (neg, rest) = split_sign(t);
        let mut acc = 0.0f64;
        for group in rest.split(':') {
            let cleaned: String = group.chars().filter(|c| *c != '_').collect();
            let g: f64 = cleaned.parse().map_err(|_| invalid())?;
            acc = acc * 60.0 + g;
        }
        return Ok(if neg { -acc } else { acc });
    }
    if is_decimal_float(t) {
        let cleaned: String = t.chars().filter(|c| *c != '_').collect();
        let cleaned = if cleaned.ends_with('.') {
            format!("{cleaned}0")
        } else {
            cleaned
        };
        return cleaned.parse::<f64>().map_err(|_| invalid());
    }
    if classify_int(t).is_some() {
        return Ok(parse_int(t)? as f64);
    }
    Err(invalid())
}

/// Narrow a parsed float to `f32`, rejecting finite values outside its range.
pub fn cast_f32(value: f64) -> Result<f32, Error> {
    if value.is_finite() && value.abs() > f32::MAX as f64 {
        return Err(Error::overflow(format!("value {value} is too large for f32")));
    }
    Ok(value as f32)
}
