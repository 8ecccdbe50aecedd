//! Naming conventions mapping member names to YAML keys.

use std::fmt::Debug;

/// Transform from a member name to the exposed key.
pub trait NamingConvention: Debug + Send + Sync {
    fn apply(&self, name: &str) -> String;
}

/// Leaves names untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullNaming;

/// `thisIsATest`
#[derive(Clone, Copy, Debug, Default)]
pub struct CamelCase;

/// `ThisIsATest`
#[derive(Clone, Copy, Debug, Default)]
pub struct PascalCase;

/// `this_is_a_test`
#[derive(Clone, Copy, Debug, Default)]
pub struct Underscored;

/// `this-is-a-test`
#[derive(Clone, Copy, Debug, Default)]
pub struct Hyphenated;

/// `thisisatest`
#[derive(Clone, Copy, Debug, Default)]
pub struct LowerCase;

impl NamingConvention for NullNaming {
    fn apply(&self, name: &str) -> String {
        name.to_owned()
    }
}

impl NamingConvention for CamelCase {
    fn apply(&self, name: &str) -> String {
        let mut out = String::with_capacity(name.len());
        for (i, word) in words(name).iter().enumerate() {
            if i == 0 {
                out.push_str(&word.to_lowercase());
            } else {
                push_capitalized(&mut out, word);
            }
        }
        out
    }
}

impl NamingConvention for PascalCase {
    fn apply(&self, name: &str) -> String {
        let mut out = String::with_capacity(name.len());
        for word in words(name) {
            push_capitalized(&mut out, word);
        }
        out
    }
}

impl NamingConvention for Underscored {
    fn apply(&self, name: &str) -> String {
        join_lower(name, "_")
    }
}

impl NamingConvention for Hyphenated {
    fn apply(&self, name: &str) -> String {
        join_lower(name, "-")
    }
}

impl NamingConvention for LowerCase {
    fn apply(&self, name: &str) -> String {
        join_lower(name, "")
    }
}

fn join_lower(name: &str, separator: &str) -> String {
    words(name)
        .iter()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(separator)
}

fn push_capitalized(out: &mut String, word: &str) {
    let mut chars = word.chars();
    if let Some(first) = chars.next() {
        out.extend(first.to_uppercase());
        out.push_str(&chars.as_str().to_lowercase());
    }
}

/// Split on `_`, `-`, spaces and case boundaries. An uppercase letter opens a word
/// after a lowercase letter or digit, or when it is the last capital of an acronym
/// followed by a lowercase letter (`ATest` splits as `A`, `Test`).
fn words(name: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = name.char_indices().collect();
    let mut out = Vec::new();
    let mut start: Option<usize> = None;
    for (pos, &(idx, c)) in chars.iter().enumerate() {
        if matches!(c, '_' | '-' | ' ') {
            if let Some(s) = start.take() {
                out.push(&name[s..idx]);
            }
            continue;
        }
        if c.is_uppercase()
            && let Some(s) = start
        {
            let prev = chars[pos - 1].1;
            let next_lower = chars.get(pos + 1).is_some_and(|&(_, n)| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower)
            {
                out.push(&name[s..idx]);
                start = Some(idx);
            }
        }
        if start.is_none() {
            start = Some(idx);
        }
    }
    if let Some(s) = start {
        out.push(&name[s..]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_case() {
        for (input, expected) in [
            ("test", "test"),
            ("this-is-a-test", "thisIsATest"),
            ("this_is_a_test", "thisIsATest"),
            ("ThisIsATest", "thisIsATest"),
        ] {
            assert_eq!(CamelCase.apply(input), expected, "{input}");
        }
    }

    #[test]
    fn pascal_case() {
        for (input, expected) in [
            ("test", "Test"),
            ("this-is-a-test", "ThisIsATest"),
            ("thisIsATest", "ThisIsATest"),
        ] {
            assert_eq!(PascalCase.apply(input), expected, "{input}");
        }
    }

    #[test]
    fn separated_forms() {
        assert_eq!(Hyphenated.apply("thisIsATest"), "this-is-a-test");
        assert_eq!(Hyphenated.apply("this-is-a-test"), "this-is-a-test");
        assert_eq!(Underscored.apply("thisIsATest"), "this_is_a_test");
        assert_eq!(Underscored.apply("max_retry_count"), "max_retry_count");
        assert_eq!(LowerCase.apply("HttpServer"), "httpserver");
        assert_eq!(NullNaming.apply("As_Is"), "As_Is");
    }

    #[test]
    fn acronyms_and_digits() {
        assert_eq!(Underscored.apply("HTTPServer"), "http_server");
        assert_eq!(Underscored.apply("ipv4Address"), "ipv4_address");
    }
}
