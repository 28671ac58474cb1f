//! Record store boundary.
//!
//! The external store is a named tabular range with position-independent,
//! name-addressed columns. The core reads the full range once per run and
//! writes back only changed rows. All required headers are resolved once at
//! run start (`ResolvedSchema::resolve`); a missing header aborts that
//! source with a configuration error instead of surfacing later as a bad
//! index.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{RecordSource, TrackedItem};

/// Required header names, in the order the write columns are laid out.
pub mod columns {
    pub const ITEM_KEY: &str = "Item Key";
    pub const PRICE: &str = "Last Price";
    pub const PRICE_CHANGED: &str = "Price_Changed";
    pub const NEEDS_ATTENTION: &str = "Needs_Attention";
    pub const STOCK: &str = "Stock";
    pub const SELLER: &str = "Seller";
    pub const DELIVERY_TEXT: &str = "Delivery_Time";
    pub const DELIVERY_STATUS: &str = "Delivery_Status";
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("required column '{0}' missing from header row")]
    MissingColumn(&'static str),

    #[error("write columns are not laid out contiguously after '{0}'")]
    NonContiguousColumns(&'static str),

    // `source` as a field name would be taken for the error's cause chain.
    #[error("row {row} out of range for source '{source_name}'")]
    RowOutOfRange { source_name: String, row: usize },

    #[error("record source I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("record source payload invalid: {0}")]
    Payload(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Column indices resolved from the header row, 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSchema {
    pub item_key: usize,
    pub price: usize,
    pub price_changed: usize,
    pub needs_attention: usize,
    pub stock: usize,
    pub seller: usize,
    pub delivery_text: usize,
    pub delivery_status: usize,
}

impl ResolvedSchema {
    /// Resolve every required column against the header row, failing fast
    /// with the first missing name. The seven written columns must be laid
    /// out contiguously (price through delivery status) since writes address
    /// them as one range.
    pub fn resolve(headers: &[String]) -> Result<Self, StoreError> {
        let find = |name: &'static str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or(StoreError::MissingColumn(name))
        };

        let schema = Self {
            item_key: find(columns::ITEM_KEY)?,
            price: find(columns::PRICE)?,
            price_changed: find(columns::PRICE_CHANGED)?,
            needs_attention: find(columns::NEEDS_ATTENTION)?,
            stock: find(columns::STOCK)?,
            seller: find(columns::SELLER)?,
            delivery_text: find(columns::DELIVERY_TEXT)?,
            delivery_status: find(columns::DELIVERY_STATUS)?,
        };

        let expected = [
            (schema.price_changed, columns::PRICE),
            (schema.needs_attention, columns::PRICE_CHANGED),
            (schema.stock, columns::NEEDS_ATTENTION),
            (schema.seller, columns::STOCK),
            (schema.delivery_text, columns::SELLER),
            (schema.delivery_status, columns::DELIVERY_TEXT),
        ];
        let mut previous = schema.price;
        for (index, after) in expected {
            if index != previous + 1 {
                return Err(StoreError::NonContiguousColumns(after));
            }
            previous = index;
        }

        Ok(schema)
    }

    /// First written column (the price column).
    pub fn write_start(&self) -> usize {
        self.price
    }

    /// Build the tracked item for one data row. Missing trailing cells read
    /// as empty, matching how tabular stores truncate rows.
    pub fn item(&self, cells: &[String], row: usize) -> TrackedItem {
        let cell = |idx: usize| cells.get(idx).map(String::as_str).unwrap_or("").to_string();
        TrackedItem {
            key: cell(self.item_key),
            row,
            price: cell(self.price),
            stock: cell(self.stock),
            seller: cell(self.seller),
            delivery_text: cell(self.delivery_text),
        }
    }
}

/// One proposed write: the seven reconciled values for a single row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowUpdate {
    /// 1-based row number in the source range (header row is 1).
    pub row: usize,
    /// 0-based index of the first written column.
    pub start_col: usize,
    pub values: Vec<String>,
}

impl RowUpdate {
    /// Render the A1-style range this update addresses, for stores that
    /// speak column letters.
    pub fn a1_range(&self, range_name: &str) -> String {
        let end_col = self.start_col + self.values.len().saturating_sub(1);
        format!(
            "{range_name}!{}{row}:{}{row}",
            column_letter(self.start_col),
            column_letter(end_col),
            row = self.row
        )
    }
}

/// 0-based column index to letters (0 -> A, 27 -> AB).
pub fn column_letter(mut index: usize) -> String {
    let mut letters = String::new();
    loop {
        letters.insert(0, (b'A' + (index % 26) as u8) as char);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters
}

/// External record store contract: one full read per run, row-addressed
/// writes for changed rows only.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All rows of the source range, header row first.
    async fn read_all(&self, source: &RecordSource) -> Result<Vec<Vec<String>>, StoreError>;

    /// Write one row's reconciled values. Failures affect only this row.
    async fn write_row(&self, source: &RecordSource, update: &RowUpdate)
        -> Result<(), StoreError>;
}

/// File-backed reference implementation of the contract: each source is a
/// JSON array of rows under `root`, addressed by its `credential_ref`.
/// Useful for local runs and tests; production deployments plug in their own
/// store client behind the same trait.
pub struct JsonRecordStore {
    root: PathBuf,
}

impl JsonRecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, source: &RecordSource) -> PathBuf {
        self.root.join(&source.credential_ref)
    }
}

#[async_trait]
impl RecordStore for JsonRecordStore {
    async fn read_all(&self, source: &RecordSource) -> Result<Vec<Vec<String>>, StoreError> {
        let bytes = tokio::fs::read(self.path_for(source)).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn write_row(
        &self,
        source: &RecordSource,
        update: &RowUpdate,
    ) -> Result<(), StoreError> {
        let path = self.path_for(source);
        let bytes = tokio::fs::read(&path).await?;
        let mut rows: Vec<Vec<String>> = serde_json::from_slice(&bytes)?;

        let row = rows
            .get_mut(update.row - 1)
            .ok_or_else(|| StoreError::RowOutOfRange {
                source_name: source.name.clone(),
                row: update.row,
            })?;
        if row.len() < update.start_col + update.values.len() {
            row.resize(update.start_col + update.values.len(), String::new());
        }
        row.splice(
            update.start_col..update.start_col + update.values.len(),
            update.values.iter().cloned(),
        );

        tokio::fs::write(&path, serde_json::to_vec_pretty(&rows)?).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers() -> Vec<String> {
        [
            columns::ITEM_KEY,
            "Notes",
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
        .collect()
    }

    #[test]
    fn resolves_headers_by_name() {
        let schema = ResolvedSchema::resolve(&headers()).expect("schema resolves");
        assert_eq!(schema.item_key, 0);
        assert_eq!(schema.price, 2);
        assert_eq!(schema.delivery_status, 8);
        assert_eq!(schema.write_start(), 2);
    }

    #[test]
    fn missing_header_fails_fast_with_its_name() {
        let mut h = headers();
        h.retain(|name| name != columns::SELLER);
        match ResolvedSchema::resolve(&h) {
            Err(StoreError::MissingColumn(name)) => assert_eq!(name, columns::SELLER),
            other => panic!("expected MissingColumn, got {other:?}"),
        }
    }

    #[test]
    fn scattered_write_columns_are_rejected() {
        let mut h = headers();
        h.push("Extra".to_string());
        h.swap(5, 9); // move Stock to the end
        assert!(matches!(
            ResolvedSchema::resolve(&h),
            Err(StoreError::NonContiguousColumns(_))
        ));
    }

    #[test]
    fn column_letters_wrap_past_z() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(27), "AB");
    }

    #[test]
    fn a1_range_spans_the_written_columns() {
        let update = RowUpdate {
            row: 5,
            start_col: 2,
            values: vec![String::new(); 7],
        };
        assert_eq!(update.a1_range("Items"), "Items!C5:I5");
    }

    #[tokio::test]
    async fn out_of_range_write_reports_the_source_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = RecordSource {
            id: "local".to_string(),
            name: "Items".to_string(),
            credential_ref: "items.json".to_string(),
        };
        let rows = vec![vec!["Item Key".to_string()]];
        std::fs::write(
            dir.path().join("items.json"),
            serde_json::to_vec(&rows).expect("serialize"),
        )
        .expect("seed file");

        let store = JsonRecordStore::new(dir.path());
        let update = RowUpdate {
            row: 9,
            start_col: 0,
            values: vec!["x".to_string()],
        };
        match store.write_row(&source, &update).await {
            Err(StoreError::RowOutOfRange { source_name, row }) => {
                assert_eq!(source_name, "Items");
                assert_eq!(row, 9);
            }
            other => panic!("expected RowOutOfRange, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn json_store_round_trips_row_updates() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = RecordSource {
            id: "local".to_string(),
            name: "Items".to_string(),
            credential_ref: "items.json".to_string(),
        };
        let rows = vec![
            vec!["Item Key".to_string(), "Last Price".to_string()],
            vec!["K1".to_string(), "10.00".to_string()],
        ];
        std::fs::write(
            dir.path().join("items.json"),
            serde_json::to_vec(&rows).expect("serialize"),
        )
        .expect("seed file");

        let store = JsonRecordStore::new(dir.path());
        let update = RowUpdate {
            row: 2,
            start_col: 1,
            values: vec!["12.50".to_string()],
        };
        store.write_row(&source, &update).await.expect("write");

        let all = store.read_all(&source).await.expect("read");
        assert_eq!(all[1][1], "12.50");
    }
}
