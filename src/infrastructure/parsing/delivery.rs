//! Delivery estimate normalization and status computation.
//!
//! Raw delivery text arrives in many shapes ("Arrives Monday, June 8 -
//! Thursday, June 11", "20 June", "4 - 10 July"). Normalization rejects text
//! that is actually a price, strips weekday and connector words, reorders
//! day-month tokens to month-day, and matches an ordered list of date shapes.
//! No shape matching leaves the original text in place; normalization is
//! best-effort and never fails.
//!
//! Status computation resolves the (end) date against the current year. A
//! date far enough in the past is treated as a year-boundary wraparound and
//! moved into the next year; a recently passed date is reported as stale.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::domain::constants::{policy, sentinel};
use crate::domain::DeliveryStatus;

static CURRENCY: Lazy<Regex> = Lazy::new(|| re(r"\$\s*\d+"));
static WEEKDAYS: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)(?:Monday|Tuesday|Wednesday|Thursday|Friday|Saturday|Sunday),?\s*"));
static CONNECTORS: Lazy<Regex> = Lazy::new(|| re(r"(?i)(?:Arrives|between|and|on)\s*"));
static COMMA_RUNS: Lazy<Regex> = Lazy::new(|| re(r"\s*,\s*"));
static DAY_MONTH: Lazy<Regex> = Lazy::new(|| re(r"\b(\d{1,2})\s([A-Za-z]+)\b"));

const SEP: &str = r"(?:\s*(?:-|–|—|to)\s*)+";

static YEAR_ENDING_RANGE: Lazy<Regex> = Lazy::new(|| {
    re(&format!(r"^([A-Za-z]+\s\d{{1,2}}){SEP}([A-Za-z]+\s\d{{1,2}})\s+\d{{4}}$"))
});
static DAY_MONTH_ONLY: Lazy<Regex> = Lazy::new(|| re(r"^\d{1,2}\s[A-Za-z]+$"));
static PARTIAL_RANGE: Lazy<Regex> =
    Lazy::new(|| re(&format!(r"^(\d{{1,2}}){SEP}(\d{{1,2}})\s+([A-Za-z]+)$")));
static RANGE_DAY_FIRST: Lazy<Regex> =
    Lazy::new(|| re(&format!(r"(\d{{1,2}}\s[A-Za-z]+){SEP}(\d{{1,2}}\s[A-Za-z]+)")));
static RANGE_MONTH_FIRST: Lazy<Regex> =
    Lazy::new(|| re(&format!(r"([A-Za-z]+\s\d{{1,2}}){SEP}([A-Za-z]+\s\d{{1,2}})")));
static SINGLE: Lazy<Regex> = Lazy::new(|| re(r"^([A-Za-z]+\s\d{1,2})$"));
static WEEKDAY_SINGLE: Lazy<Regex> = Lazy::new(|| re(r"^[A-Za-z]+,\s\d{1,2}\s[A-Za-z]+$"));
static ANY_MONTH_DAY: Lazy<Regex> = Lazy::new(|| re(r"\b[A-Za-z]+\s\d{1,2}\b"));

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("hard-coded delivery pattern")
}

/// Reorder a "20 June" or "Friday, 20 June" token to "June 20". Tokens that
/// are already month-first pass through untouched.
fn fix_date_format(text: &str) -> String {
    let parts: Vec<&str> = text.trim().split_whitespace().collect();
    match parts.as_slice() {
        [day, month] if day.chars().all(|c| c.is_ascii_digit()) => format!("{month} {day}"),
        [weekday, day, month]
            if weekday.ends_with(',') && day.chars().all(|c| c.is_ascii_digit()) =>
        {
            format!("{month} {day}")
        }
        _ => text.trim().to_string(),
    }
}

/// Normalize raw delivery text into a single month-day token or a
/// `"<start> – <end>"` range.
///
/// Returns `None` when the text is actually a captured price (currency-like
/// pattern), which callers map to the `"Delivery Not Found"` sentinel.
pub fn normalize_delivery(raw: &str) -> Option<String> {
    if raw.to_lowercase().contains("price") || CURRENCY.is_match(raw) {
        debug!("delivery block contains a price, skipping: {raw:?}");
        return None;
    }

    let mut cleaned = WEEKDAYS.replace_all(raw, "").to_string();
    cleaned = CONNECTORS.replace_all(&cleaned, "").to_string();
    cleaned = COMMA_RUNS.replace_all(&cleaned, " ").trim().to_string();

    if let Some(caps) = YEAR_ENDING_RANGE.captures(&cleaned) {
        cleaned = format!("{} – {}", &caps[1], &caps[2]);
    }

    if DAY_MONTH_ONLY.is_match(&cleaned) {
        return Some(fix_date_format(&cleaned));
    }
    if let Some(caps) = PARTIAL_RANGE.captures(&cleaned) {
        let month = &caps[3];
        return Some(format!("{month} {} – {month} {}", &caps[1], &caps[2]));
    }
    if let Some(caps) = RANGE_DAY_FIRST
        .captures(&cleaned)
        .or_else(|| RANGE_MONTH_FIRST.captures(&cleaned))
    {
        return Some(format!(
            "{} – {}",
            fix_date_format(&caps[1]),
            fix_date_format(&caps[2])
        ));
    }
    if let Some(caps) = SINGLE.captures(&cleaned) {
        return Some(caps[1].to_string());
    }
    if WEEKDAY_SINGLE.is_match(&cleaned) {
        return Some(fix_date_format(&cleaned));
    }

    // Generic fallback: pull month-day tokens from anywhere in the string.
    let tokens: Vec<String> = ANY_MONTH_DAY
        .find_iter(&cleaned)
        .map(|m| fix_date_format(m.as_str()))
        .collect();
    match tokens.as_slice() {
        [start, end] => Some(format!("{start} – {end}")),
        [single] => Some(single.clone()),
        _ => {
            debug!("unknown delivery format, passing through: {raw:?}");
            Some(raw.to_string())
        }
    }
}

/// Resolve a normalized delivery string against `today` and describe it.
pub fn check_delivery_status(delivery: &str, today: NaiveDate) -> DeliveryStatus {
    let trimmed = delivery.trim();
    if trimmed.is_empty() || trimmed == sentinel::DELIVERY_NOT_FOUND {
        return DeliveryStatus::NotApplicable;
    }

    // Tolerate day-month tokens that slipped through normalization.
    let text = DAY_MONTH.replace_all(trimmed, "$2 $1").to_string();

    if let Some(caps) = RANGE_MONTH_FIRST.captures(&text) {
        return match parse_month_day(&caps[2], today).map(|d| offset_with_rollover(d, today)) {
            Some(days) if days < 0 => DeliveryStatus::Past,
            Some(days) => DeliveryStatus::InDays(days),
            None => DeliveryStatus::NotFound,
        };
    }

    if let Some(caps) = SINGLE.captures(&text) {
        return match parse_month_day(&caps[1], today).map(|d| offset_with_rollover(d, today)) {
            Some(0) => DeliveryStatus::Today,
            Some(days) if days > 0 => DeliveryStatus::InDays(days),
            Some(_) => DeliveryStatus::Past,
            None => DeliveryStatus::NotFound,
        };
    }

    DeliveryStatus::NotFound
}

/// Day offset from today, adding one year when the resolved date is far
/// enough in the past to be a wraparound rather than a stale estimate.
fn offset_with_rollover(date: NaiveDate, today: NaiveDate) -> i64 {
    let diff = (date - today).num_days();
    if diff <= -policy::YEAR_WRAP_LOOKBACK_DAYS {
        if let Some(next_year) = date.with_year(date.year() + 1) {
            return (next_year - today).num_days();
        }
    }
    diff
}

/// Parse a "June 8" / "Jun 8" token against the current year.
fn parse_month_day(token: &str, today: NaiveDate) -> Option<NaiveDate> {
    let mut parts = token.split_whitespace();
    let month = month_number(parts.next()?)?;
    let day: u32 = parts.next()?.parse().ok()?;
    NaiveDate::from_ymd_opt(today.year(), month, day)
}

fn month_number(name: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    let lower = name.to_lowercase();
    MONTHS
        .iter()
        .position(|prefix| lower.starts_with(prefix))
        .map(|idx| idx as u32 + 1)
}
