//! # telemetry-types
//!
//! Shared data model for the telemetry anomaly engine.
//!
//! - [`NewReading`]: an inbound submission as handed over by the transport layer
//! - [`Reading`]: a validated, timestamped, identified observation (append-only)
//! - [`WindowKey`]: the `(device_id, metric_name)` statistics partition
//! - [`Anomaly`]: the persisted record of a reading whose z-score crossed the threshold
//!
//! Readings and anomalies are immutable once constructed; the storage layer
//! only ever appends them.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod anomaly;
pub mod error;
pub mod reading;

pub use anomaly::{Anomaly, AnomalyKind};
pub use error::{ValidationError, ValidationResult};
pub use reading::{NewReading, Reading, ReadingId, WindowKey};
