//! Domain layer: entities, canonical value types and named constants.

pub mod constants;
pub mod record;

pub use record::{
    DeliveryStatus, NormalizedRecord, Price, Proxy, RawExtraction, RecordSource, StockStatus,
    TrackedItem,
};
