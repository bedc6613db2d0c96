use chrono::{DateTime, Utc};
use thiserror::Error;

/// Reasons an inbound reading is rejected before any state is touched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("device_id must not be empty")]
    EmptyDeviceId,

    #[error("metric_name must not be empty")]
    EmptyMetricName,

    #[error("value must be a finite number, got {0}")]
    NonFiniteValue(f64),

    #[error("timestamp {0} outside the storable range (1677-09-21 to 2262-04-11 UTC)")]
    TimestampOutOfRange(DateTime<Utc>),
}

/// Convenience type alias for validation results.
pub type ValidationResult<T> = Result<T, ValidationError>;
