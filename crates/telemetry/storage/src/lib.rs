//! Append-only persistence for telemetry readings and anomalies.
//!
//! Two relations are kept: readings (every ingested value) and anomalies
//! (readings whose z-score crossed the threshold). Rows are never updated or
//! deleted. Backends:
//! - [`memory::InMemoryTelemetryStore`] for tests and ephemeral runs
//! - [`sqlite::SqliteTelemetryStore`] (feature `sqlite`, on by default)
//!
//! Ordering contract shared by all backends: series are oldest first,
//! anomaly listings newest first, ties broken by insertion order.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

mod error;
pub mod memory;
mod model;
#[cfg(feature = "sqlite")]
pub mod sqlite;
mod traits;

pub use error::{StorageError, StorageResult};
pub use memory::InMemoryTelemetryStore;
pub use model::{AnomalyQuery, MetricSummary, SeriesQuery};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteTelemetryStore;
pub use traits::{AnomalyStore, IngestionSink, QueryWindow, ReadingStore, TelemetryStore};
