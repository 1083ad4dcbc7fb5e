//! Text stabilization: strip transient fragments (counts, prices, dates,
//! generated ids) and keep one human-meaningful phrase to anchor on.

use crate::dom::{is_xml_whitespace, normalize_whitespace};
use regex::Regex;
use std::sync::OnceLock;

const DELIMITER: &str = "\u{1F}";

/// Ordered replacement battery; earlier patterns win over later overlapping ones
fn volatile_fragments() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        [
            r"[0-9]{5,}",
            r"^[0-9]+$",
            r"(?i)[a-f0-9]{8,}",
            r"(?i)^(ember|ng-|jss|css-|_-|sc-|mui|v-|dx-|ag-)",
            r"(_ngcontent|_nghost)",
            r"(?i)[0-9]+(\.[0-9]+)?\s*[kmb]\+?(\s|$)",
            r"[0-9]+(\.[0-9]+)?%",
            r"[$£€¥₹]\s?[0-9]+([.,][0-9]+)*",
            r"[0-9]+([.,][0-9]+)*\s?[$£€¥₹]",
            r"(?i)\b(ago|today|yesterday|tomorrow)\b",
            r"(?i)[0-9]+\s+(min|hour|day|week|month|year)s?",
            r"[0-9]{1,2}:[0-9]{2}",
            r"(?i)\b[0-9]{1,2}\s+(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)\b",
            r"\b(19|20)[0-9]{2}\b",
            r"[0-9]+",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("static stabilizer pattern"))
        .collect()
    })
}

fn trailing_punctuation() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[?.!,]+$").expect("static punctuation pattern"))
}

fn trailing_stopword() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(in|at|on|for|with|by|to|of|and|the|a|an)$").expect("static stopword pattern"))
}

fn is_punctuation_only(chunk: &str) -> bool {
    chunk.chars().all(|c| ".,!?;:()[]{}".contains(c))
}

/// Extract the stable text segment of `text`, if one exists.
///
/// The result is at least four characters long and contains a letter.
pub fn stabilize(text: &str) -> Option<String> {
    let normalized = normalize_whitespace(text);
    if normalized.is_empty() {
        return None;
    }

    let mut delimited = normalized;
    for pattern in volatile_fragments() {
        delimited = pattern.replace_all(&delimited, DELIMITER).into_owned();
    }

    let chunks: Vec<&str> = delimited
        .split(DELIMITER)
        .map(|c| c.trim_matches(is_xml_whitespace))
        .filter(|c| c.chars().count() >= 3 && !is_punctuation_only(c))
        .collect();

    let first = *chunks.first()?;
    let best = if first.chars().count() >= 6 {
        first
    } else {
        // Longest chunk; the earliest wins ties
        chunks.iter().copied().fold(first, |best, c| if c.chars().count() > best.chars().count() { c } else { best })
    };

    let stripped = trailing_punctuation().replace(best, "");
    let stripped = trailing_stopword().replace(stripped.trim_matches(is_xml_whitespace), "");
    let stable = stripped.trim_matches(is_xml_whitespace);

    if stable.chars().count() >= 4 && stable.chars().any(char::is_alphabetic) {
        Some(stable.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_shorthand_is_removed() {
        assert_eq!(stabilize("4.1K followers").as_deref(), Some("followers"));
        assert_eq!(stabilize("12M+ downloads").as_deref(), Some("downloads"));
    }

    #[test]
    fn test_plain_text_is_kept() {
        assert_eq!(stabilize("  Submit   order ").as_deref(), Some("Submit order"));
        assert_eq!(stabilize("Sign in").as_deref(), Some("Sign"));
        assert_eq!(stabilize("Save\u{a0}now").as_deref(), Some("Save\u{a0}now"));
        assert_eq!(stabilize("Grüße aus Köln").as_deref(), Some("Grüße aus Köln"));
    }

    #[test]
    fn test_first_long_chunk_wins() {
        assert_eq!(stabilize("Updated 2 hours ago by admin").as_deref(), Some("Updated"));
        assert_eq!(stabilize("Order 48213 shipped to warehouse").as_deref(), Some("shipped to warehouse"));
    }

    #[test]
    fn test_prices_and_percentages() {
        assert_eq!(stabilize("$19.99 Premium plan").as_deref(), Some("Premium plan"));
        assert_eq!(stabilize("Save 25% today").as_deref(), Some("Save"));
        assert_eq!(stabilize("Total 49,00 €").as_deref(), Some("Total"));
    }

    #[test]
    fn test_dates_and_times() {
        assert_eq!(stabilize("Posted 3 Jan 2024 at 10:45").as_deref(), Some("Posted"));
        assert_eq!(stabilize("2024-01-01"), None);
    }

    #[test]
    fn test_trailing_stopword_and_punctuation() {
        assert_eq!(stabilize("Welcome back to").as_deref(), Some("Welcome back"));
        assert_eq!(stabilize("Are you sure?").as_deref(), Some("Are you sure"));
    }

    #[test]
    fn test_rejects_short_or_letterless() {
        assert_eq!(stabilize("OK"), None);
        assert_eq!(stabilize("12345"), None);
        assert_eq!(stabilize(""), None);
        assert_eq!(stabilize("--- !!! ---"), None);
    }

    #[test]
    fn test_generated_ids_do_not_leak() {
        let stable = stabilize("Item a3f9c2e1b7 details").unwrap();
        assert!(!stable.contains("a3f9c2e1b7"));
        assert_eq!(stable, "details");
    }
}
