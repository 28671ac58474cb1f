//! Normalization engine: raw extracted text to canonical attribute values.

pub mod delivery;
pub mod price;
pub mod stock;

use chrono::{NaiveDate, Utc};

use crate::domain::constants::sentinel;
use crate::domain::{NormalizedRecord, Price, RawExtraction};

pub use delivery::{check_delivery_status, normalize_delivery};
pub use price::{clean_price, clean_price_value};
pub use stock::normalize_stock;

/// Convert one raw extraction into the canonical record it will be compared
/// and stored as. Field-level absence maps to the fixed sentinels; it is data,
/// not an error.
pub fn normalize(raw: &RawExtraction, today: NaiveDate) -> NormalizedRecord {
    let price = match raw.price.as_deref().map(str::trim) {
        None => Price::NotFound,
        Some(sentinel::ERROR) => Price::Error,
        Some(sentinel::UNAVAILABLE) => Price::Unavailable,
        Some(text) => clean_price_value(text).map_or(Price::NotFound, Price::Value),
    };

    let stock = normalize_stock(raw.stock.as_deref().unwrap_or(""));

    let seller = raw
        .seller
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(sentinel::SELLER_NOT_FOUND)
        .to_string();

    let delivery_text = raw
        .delivery_text
        .as_deref()
        .and_then(normalize_delivery)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| sentinel::DELIVERY_NOT_FOUND.to_string());

    let delivery_status = check_delivery_status(&delivery_text, today);

    NormalizedRecord {
        price,
        stock,
        seller,
        delivery_text,
        delivery_status,
        checked_at: Utc::now(),
    }
}
