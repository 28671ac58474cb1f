//! Change detection between a stored row and a fresh observation.
//!
//! A write is planned only when something actually changed or the delivery
//! situation needs a human look; unchanged rows produce no update at all.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::constants::{policy, sentinel};
use crate::domain::{NormalizedRecord, Price, TrackedItem};
use crate::infrastructure::record_store::{ResolvedSchema, RowUpdate};

/// Tuning for what counts as attention-worthy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangePolicy {
    /// Flag rows whose delivery estimate exceeds this many days.
    pub delivery_exceeded_days: i64,
    /// Flag rows that are out of stock with no resolvable delivery date.
    pub flag_unresolved_out_of_stock: bool,
}

impl Default for ChangePolicy {
    fn default() -> Self {
        Self {
            delivery_exceeded_days: policy::DEFAULT_DELIVERY_EXCEEDED_DAYS,
            flag_unresolved_out_of_stock: true,
        }
    }
}

fn eq_trimmed_ci(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Decide whether `fresh` warrants a write for `item`, and build the row
/// update if so. Returns `None` when the stored row is already current.
pub fn plan_update(
    item: &TrackedItem,
    fresh: &NormalizedRecord,
    schema: &ResolvedSchema,
    policy: &ChangePolicy,
) -> Option<RowUpdate> {
    let price_text = fresh.price.to_string();
    let stock_text = fresh.stock.to_string();
    let status_text = fresh.delivery_status.to_string();

    if fresh.price.is_invalid() {
        // The page gave us nothing trustworthy; record that and flag the row.
        debug!(key = %item.key, price = %price_text, "invalid price observation");
        return Some(RowUpdate {
            row: item.row,
            start_col: schema.write_start(),
            values: vec![
                "0".to_string(),
                "0".to_string(),
                "1".to_string(),
                stock_text,
                fresh.seller.clone(),
                fresh.delivery_text.clone(),
                status_text,
            ],
        });
    }

    let old_price = Price::parse_cell(&item.price);
    let price_changed = old_price.cents() != fresh.price.cents();
    let stock_changed = !eq_trimmed_ci(&item.stock, &stock_text);
    let seller_changed = !eq_trimmed_ci(&item.seller, &fresh.seller);
    let delivery_changed = !eq_trimmed_ci(&item.delivery_text, &fresh.delivery_text);

    let delivery_exceeded = fresh
        .delivery_status
        .offset_days()
        .is_some_and(|days| days > policy.delivery_exceeded_days);
    let unresolved_out_of_stock = policy.flag_unresolved_out_of_stock
        && stock_text == crate::domain::StockStatus::OutOfStock.to_string()
        && !fresh.delivery_status.is_resolved();
    let needs_attention = delivery_exceeded || unresolved_out_of_stock;

    if !(price_changed || stock_changed || seller_changed || delivery_changed || needs_attention) {
        return None;
    }

    debug!(
        key = %item.key,
        price_changed,
        stock_changed,
        seller_changed,
        delivery_changed,
        needs_attention,
        "row update planned"
    );

    Some(RowUpdate {
        row: item.row,
        start_col: schema.write_start(),
        values: vec![
            price_text,
            if price_changed { "1" } else { "0" }.to_string(),
            if needs_attention { "1" } else { "0" }.to_string(),
            stock_text,
            fresh.seller.clone(),
            fresh.delivery_text.clone(),
            status_text,
        ],
    })
}

/// True when a stored price cell is one of the untrustworthy placeholder
/// values rather than a real observation.
pub fn is_invalid_price_cell(cell: &str) -> bool {
    sentinel::INVALID_PRICES
        .iter()
        .any(|p| p.eq_ignore_ascii_case(cell.trim()))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::{DeliveryStatus, StockStatus};
    use crate::infrastructure::record_store::{columns, ResolvedSchema};

    fn schema() -> ResolvedSchema {
        let headers: Vec<String> = [
            columns::ITEM_KEY,
            columns::PRICE,
            columns::PRICE_CHANGED,
            columns::NEEDS_ATTENTION,
            columns::STOCK,
            columns::SELLER,
            columns::DELIVERY_TEXT,
            columns::DELIVERY_STATUS,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        ResolvedSchema::resolve(&headers).expect("schema")
    }

    fn item() -> TrackedItem {
        TrackedItem {
            key: "B000TEST".to_string(),
            row: 5,
            price: "19.99".to_string(),
            stock: "In Stock".to_string(),
            seller: "Acme".to_string(),
            delivery_text: "June 8".to_string(),
        }
    }

    fn fresh() -> NormalizedRecord {
        NormalizedRecord {
            price: Price::Value(19.99),
            stock: StockStatus::InStock,
            seller: "Acme".to_string(),
            delivery_text: "June 8".to_string(),
            delivery_status: DeliveryStatus::InDays(3),
            checked_at: Utc::now(),
        }
    }

    #[test]
    fn identical_observation_plans_no_write() {
        assert!(plan_update(&item(), &fresh(), &schema(), &ChangePolicy::default()).is_none());
    }

    #[test]
    fn price_comparison_ignores_formatting_noise() {
        let mut stored = item();
        stored.price = " 19.99 ".to_string();
        assert!(plan_update(&stored, &fresh(), &schema(), &ChangePolicy::default()).is_none());
    }

    #[test]
    fn seller_change_alone_triggers_a_write() {
        let mut observed = fresh();
        observed.seller = "Other Seller".to_string();

        let update =
            plan_update(&item(), &observed, &schema(), &ChangePolicy::default()).expect("update");
        assert_eq!(update.row, 5);
        assert_eq!(update.values[1], "0"); // price unchanged
        assert_eq!(update.values[2], "0");
        assert_eq!(update.values[4], "Other Seller");
    }

    #[test]
    fn price_change_sets_the_changed_flag() {
        let mut observed = fresh();
        observed.price = Price::Value(17.49);

        let update =
            plan_update(&item(), &observed, &schema(), &ChangePolicy::default()).expect("update");
        assert_eq!(update.values[0], "17.49");
        assert_eq!(update.values[1], "1");
    }

    #[test]
    fn invalid_price_forces_an_attention_write() {
        let mut observed = fresh();
        observed.price = Price::NotFound;

        let update =
            plan_update(&item(), &observed, &schema(), &ChangePolicy::default()).expect("update");
        assert_eq!(update.values[0], "0");
        assert_eq!(update.values[1], "0");
        assert_eq!(update.values[2], "1");
    }

    #[test]
    fn slow_delivery_is_flagged_even_without_changes() {
        let mut observed = fresh();
        observed.delivery_status = DeliveryStatus::InDays(30);

        let update =
            plan_update(&item(), &observed, &schema(), &ChangePolicy::default()).expect("update");
        assert_eq!(update.values[2], "1");
        assert_eq!(update.values[6], "Delivery in 30 days");
    }

    #[test]
    fn out_of_stock_without_a_date_is_flagged() {
        let mut stored = item();
        stored.stock = "Out of Stock".to_string();
        stored.delivery_text = "Delivery Not Found".to_string();
        let mut observed = fresh();
        observed.stock = StockStatus::OutOfStock;
        observed.delivery_text = "Delivery Not Found".to_string();
        observed.delivery_status = DeliveryStatus::NotFound;

        let update =
            plan_update(&stored, &observed, &schema(), &ChangePolicy::default()).expect("update");
        assert_eq!(update.values[2], "1");
    }

    #[test]
    fn invalid_price_cells_are_recognized() {
        for cell in ["0", "-1", "Not Found", "error", " Unavailable "] {
            assert!(is_invalid_price_cell(cell), "{cell:?}");
        }
        assert!(!is_invalid_price_cell("19.99"));
    }
}
