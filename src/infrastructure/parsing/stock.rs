//! Stock phrase classification.
//!
//! Raw availability text is matched by substring containment against two fixed
//! keyword sets covering English and German phrasings. The available set wins
//! when both would match; no match at all defaults to `OutOfStock`, since an
//! unconfirmed offer cannot be treated as purchasable.

use crate::domain::constants::stock;
use crate::domain::StockStatus;

/// Classify a raw stock phrase into the canonical two-value status.
pub fn normalize_stock(raw: &str) -> StockStatus {
    let text = raw.trim().to_lowercase();

    if stock::AVAILABLE.iter().any(|kw| text.contains(kw)) {
        return StockStatus::InStock;
    }
    if stock::UNAVAILABLE.iter().any(|kw| text.contains(kw)) {
        return StockStatus::OutOfStock;
    }
    StockStatus::OutOfStock
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("In Stock", StockStatus::InStock)]
    #[case("Only 3 left in stock", StockStatus::InStock)]
    #[case("Nur noch 2 auf Lager - vorrätig", StockStatus::InStock)]
    #[case("Usually ships within 4 to 5 days", StockStatus::InStock)]
    #[case("Out of Stock", StockStatus::OutOfStock)]
    #[case("Derzeit nicht auf Lager", StockStatus::OutOfStock)]
    #[case("Currently unavailable", StockStatus::OutOfStock)]
    #[case("", StockStatus::OutOfStock)]
    #[case("Error", StockStatus::OutOfStock)]
    fn classifies_phrases(#[case] raw: &str, #[case] expected: StockStatus) {
        assert_eq!(normalize_stock(raw), expected);
    }

    #[test]
    fn available_wins_when_both_sets_match() {
        // "only ... left in stock" hits the available set even though the
        // phrase also mentions "out of stock".
        assert_eq!(
            normalize_stock("Only 1 left in stock - more out of stock soon"),
            StockStatus::InStock
        );
    }
}
