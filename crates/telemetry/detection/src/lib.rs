//! # telemetry-detection
//!
//! Real-time statistical classification of telemetry readings.
//!
//! ## Architecture
//!
//! ```text
//!   (key, value)
//!       │
//!       ▼
//!   WindowStore ── DashMap<WindowKey, Mutex<Window>>
//!       │             │
//!       │             └── bounded ring buffer + Welford mean/M2
//!       │
//!       │ PriorStats (computed BEFORE the value is inserted)
//!       ▼
//!   AnomalyDetector ── z = (value - mean) / std_dev, |z| > threshold
//!       │
//!       ▼
//!   Verdict
//! ```
//!
//! The per-key mutex is held only for the in-memory update; callers persist
//! results after it is released.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod detector;
pub mod error;
pub mod store;
pub mod window;

pub use config::DetectionConfig;
pub use detector::{AnomalyDetector, Verdict};
pub use error::{DetectionError, DetectionResult};
pub use store::{PriorStats, WindowSnapshot, WindowStore};
pub use window::{Window, WindowStats};

/// Default number of recent values kept per key.
pub const DEFAULT_WINDOW_CAPACITY: usize = 30;

/// Default number of prior samples required before a reading is scored.
pub const DEFAULT_MIN_SAMPLES: usize = 2;

/// Default absolute z-score above which a reading is anomalous.
pub const DEFAULT_Z_THRESHOLD: f64 = 2.5;

/// Standard deviations at or below this are treated as zero variance.
pub const DEFAULT_EPSILON: f64 = 1e-9;
