//! pricewatch: scheduled price, stock and delivery tracking for product
//! listing pages.
//!
//! The crate is split into three layers. `domain` holds the entity types and
//! shared constants, `infrastructure` adapts the outside world (HTTP, HTML
//! extraction, connectivity probing, record storage), and `application`
//! carries the use cases: the bounded scheduler, change detection and the
//! run orchestrator.

pub mod application;
pub mod domain;
pub mod infrastructure;
