//! Core entities flowing through the pipeline.
//!
//! `RawExtraction` is what the strategy chain yields, `NormalizedRecord` is the
//! canonical form used for comparison and storage. A `NormalizedRecord` is
//! produced fresh per item per run and never mutated afterwards; a new record
//! always replaces the prior one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::constants::sentinel;

/// Raw text fragments located on the page, one per attribute. Each field is
/// independently optional; absence of one never blocks the others.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawExtraction {
    pub price: Option<String>,
    pub stock: Option<String>,
    pub seller: Option<String>,
    pub delivery_text: Option<String>,
}

impl RawExtraction {
    /// The degraded result returned once every whole-attempt retry has been
    /// exhausted: every field carries the `"Error"` sentinel so callers can
    /// treat extraction as a total function.
    pub fn error() -> Self {
        let e = Some(sentinel::ERROR.to_string());
        Self {
            price: e.clone(),
            stock: e.clone(),
            seller: e.clone(),
            delivery_text: e,
        }
    }
}

/// Canonical price: either a two-decimal non-negative value or one of the
/// fixed sentinels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Price {
    Value(f64),
    NotFound,
    Unavailable,
    Error,
}

impl Price {
    /// Parse a recorded cell value back into a canonical price. Sentinel
    /// strings round-trip; anything else is parsed as a number.
    pub fn parse_cell(cell: &str) -> Self {
        match cell.trim() {
            sentinel::NOT_FOUND => Self::NotFound,
            sentinel::UNAVAILABLE => Self::Unavailable,
            sentinel::ERROR => Self::Error,
            other => other.parse::<f64>().map_or(Self::NotFound, Self::Value),
        }
    }

    /// Whole cents, for exact comparison of two-decimal values.
    pub fn cents(&self) -> Option<i64> {
        match self {
            Self::Value(v) => Some((v * 100.0).round() as i64),
            _ => None,
        }
    }

    /// Whether this value forces a needs-attention write regardless of the
    /// other fields.
    pub fn is_invalid(&self) -> bool {
        !matches!(self, Self::Value(_))
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v:.2}"),
            Self::NotFound => f.write_str(sentinel::NOT_FOUND),
            Self::Unavailable => f.write_str(sentinel::UNAVAILABLE),
            Self::Error => f.write_str(sentinel::ERROR),
        }
    }
}

/// Canonical stock state. Exactly two values, never free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockStatus {
    InStock,
    OutOfStock,
}

impl std::fmt::Display for StockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InStock => f.write_str("In Stock"),
            Self::OutOfStock => f.write_str("Out of Stock"),
        }
    }
}

/// Outcome of resolving a delivery estimate against the current date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryStatus {
    /// No delivery text was present at all; rendered as the fixed value `0`.
    NotApplicable,
    /// Delivery lands this many days from today.
    InDays(i64),
    /// Delivery lands today.
    Today,
    /// The resolved date has recently passed; the estimate is stale.
    Past,
    /// Text was present but no date shape could be parsed out of it.
    NotFound,
}

impl DeliveryStatus {
    /// Day offset from today, where known.
    pub fn offset_days(&self) -> Option<i64> {
        match self {
            Self::InDays(n) => Some(*n),
            Self::Today => Some(0),
            _ => None,
        }
    }

    /// A status is resolved when it carries an actual verdict about a date.
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::NotFound)
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotApplicable => f.write_str("0"),
            Self::InDays(1) => f.write_str("Delivery in 1 day"),
            Self::InDays(n) => write!(f, "Delivery in {n} days"),
            Self::Today => f.write_str("Today is the delivery date"),
            Self::Past => f.write_str("Delivery Date is in the Past"),
            Self::NotFound => f.write_str(sentinel::DELIVERY_NOT_FOUND),
        }
    }
}

/// Canonical per-item snapshot produced by one extraction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub price: Price,
    pub stock: StockStatus,
    pub seller: String,
    pub delivery_text: String,
    pub delivery_status: DeliveryStatus,
    pub checked_at: DateTime<Utc>,
}

/// One tracked row of the external record store: the item key plus the
/// last-recorded values it will be diffed against. Read-only to the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedItem {
    /// External item identifier (e.g. a marketplace product key).
    pub key: String,
    /// 1-based row number in the record source.
    pub row: usize,
    pub price: String,
    pub stock: String,
    pub seller: String,
    pub delivery_text: String,
}

/// Immutable proxy endpoint configuration; selected at random per job when
/// proxying is enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proxy {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

/// Identifies one external record batch to process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSource {
    /// Store-level identifier (e.g. a spreadsheet id).
    pub id: String,
    /// Logical range name within the store.
    pub name: String,
    /// Reference to the credential material the store client needs.
    pub credential_ref: String,
}
