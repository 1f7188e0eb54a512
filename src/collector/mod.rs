//! Remote collector client.
//!
//! ```text
//! collector/
//! ├── client.rs  Collector trait → HttpCollector (reqwest)
//! └── error.rs   CollectorError
//! ```

pub mod client;
pub mod error;

pub use client::{Collector, HttpCollector, IngestPayload, LocationRecord, LocationReport};
pub use error::CollectorError;
