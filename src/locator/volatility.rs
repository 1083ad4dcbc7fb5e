//! Volatility classification for attribute values, class names and text.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Words that read as stable even when a pattern would flag them
const STABLE_WORDS: &[&str] =
    &["button", "input", "select", "modal", "dialog", "header", "footer", "submit", "cancel", "save", "close"];

/// How eagerly values containing digits are rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolatilityPolicy {
    /// Any digit marks a value volatile
    #[default]
    Aggressive,
    /// Only the generated-value patterns apply
    Lenient,
}

fn patterns() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        [
            r"[0-9]{5,}",
            r"^[0-9]+$",
            r"(?i)[a-f0-9]{8,}",
            r"(?i)^(ember|ng-|jss|css-|_-|sc-|mui|v-|dx-|ag-)",
            r"(_ngcontent|_nghost)",
            r"(?i)^[a-z]-[0-9]+$",
            r"(?i)\[#[a-f0-9]{6}\]",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("static volatility pattern"))
        .collect()
    })
}

fn suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)[_-]([a-z0-9]{5,})$").expect("static suffix pattern"))
}

/// A trailing `-xxxxx`/`_xxxxx` chunk that does not read like a word
fn has_random_suffix(value: &str) -> bool {
    suffix_re().captures(value).and_then(|c| c.get(1)).is_some_and(|m| {
        let chunk = m.as_str();
        chunk.chars().any(|c| c.is_ascii_digit()) || !chunk.chars().any(|c| "aeiouyAEIOUY".contains(c))
    })
}

/// Classify a value with the default aggressive policy
pub fn is_volatile(value: &str) -> bool {
    is_volatile_with(value, VolatilityPolicy::Aggressive)
}

/// Whether `value` looks generated or likely to change between renders
pub fn is_volatile_with(value: &str, policy: VolatilityPolicy) -> bool {
    if value.is_empty() {
        return false;
    }
    if STABLE_WORDS.iter().any(|w| w.eq_ignore_ascii_case(value)) {
        return false;
    }
    if policy == VolatilityPolicy::Aggressive && value.chars().any(|c| c.is_ascii_digit()) {
        return true;
    }
    patterns().iter().any(|p| p.is_match(value)) || has_random_suffix(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_digit_runs_are_volatile() {
        assert!(is_volatile("order-12345"));
        assert!(is_volatile_with("order-12345", VolatilityPolicy::Lenient));
        assert!(is_volatile_with("row 99999 of list", VolatilityPolicy::Lenient));
    }

    #[test]
    fn test_generated_patterns() {
        for value in [
            "a1b2c3d4e5",
            "ember512",
            "ng-tns-c12",
            "css-1x2y3z",
            "sc-bdVaJa",
            "MuiButton-root",
            "_ngcontent-abc",
            "x-12",
            "bg-[#a1b2c3]",
            "dx-button",
            "ag-row",
        ] {
            assert!(is_volatile_with(value, VolatilityPolicy::Lenient), "{} should be volatile", value);
        }
    }

    #[test]
    fn test_random_suffix_needs_to_look_random() {
        assert!(is_volatile_with("card_xkcdq", VolatilityPolicy::Lenient));
        assert!(is_volatile_with("panel-a9f3k", VolatilityPolicy::Lenient));
        assert!(!is_volatile_with("user-input", VolatilityPolicy::Lenient));
        assert!(!is_volatile_with("nav-header", VolatilityPolicy::Lenient));
    }

    #[test]
    fn test_aggressive_policy_rejects_any_digit() {
        assert!(is_volatile("step2"));
        assert!(!is_volatile_with("step2", VolatilityPolicy::Lenient));
        assert!(is_volatile("2024-01-01"));
    }

    #[test]
    fn test_stable_words_and_empty() {
        assert!(!is_volatile(""));
        assert!(!is_volatile("Submit"));
        assert!(!is_volatile("MODAL"));
        assert!(!is_volatile("login-form"));
        assert!(!is_volatile("username"));
    }
}
