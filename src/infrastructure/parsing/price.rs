//! Price cleaning: free-text price fragments to a canonical two-decimal value.
//!
//! Cleaning is idempotent: re-applying it to an already-cleaned value returns
//! the same value. Input that survives no stage of the pipeline yields `None`,
//! which callers map to the `"Not Found"` sentinel.

use once_cell::sync::Lazy;
use regex::Regex;

/// First group of one-to-three digits optionally followed by up to two
/// decimals. The first match wins.
static PRICE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,3}(?:\.\d{1,2})?)").expect("hard-coded price pattern"));

/// Clean a raw price fragment into a `"123.45"`-shaped string.
///
/// Stages, in order: strip everything but digits, `.` and `,`; convert the
/// first `,` to `.`; collapse runs of dots; keep only the first remaining `.`;
/// take the first 1-3 digit group with up to two decimals; render with two
/// decimal places.
pub fn clean_price(raw: &str) -> Option<String> {
    let mut text: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();

    if let Some(idx) = text.find(',') {
        text.replace_range(idx..idx + 1, ".");
    }
    while text.contains("..") {
        text = text.replace("..", ".");
    }
    if let Some(first_dot) = text.find('.') {
        let tail: String = text[first_dot + 1..].chars().filter(|c| *c != '.').collect();
        text.truncate(first_dot + 1);
        text.push_str(&tail);
    }

    let value: f64 = PRICE_PATTERN.captures(&text)?.get(1)?.as_str().parse().ok()?;
    Some(format!("{value:.2}"))
}

/// Clean and parse in one step.
pub fn clean_price_value(raw: &str) -> Option<f64> {
    clean_price(raw)?.parse().ok()
}
