//! External-facing adapters: HTTP fetching, page extraction, connectivity
//! probing, record storage, configuration and logging.

pub mod config;
pub mod extractor;
pub mod gate;
pub mod http_client;
pub mod logging;
pub mod parsing;
pub mod record_store;

pub use config::{AppConfig, LoggingConfig, ScrapingConfig};
pub use extractor::{Extractor, ExtractorConfig};
pub use gate::{ConnectivityGate, GateConfig, RegionProbe};
pub use http_client::{Document, DocumentFetcher, FetcherConfig, PageFetcher};
pub use record_store::{JsonRecordStore, RecordStore, ResolvedSchema, RowUpdate, StoreError};
