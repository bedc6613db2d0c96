//! Readings and their statistics partition key.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ValidationError, ValidationResult};

// ── Identity ────────────────────────────────────────────────────────────

/// Unique identifier assigned to a reading when it is accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReadingId(pub Uuid);

impl ReadingId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ReadingId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReadingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Window key ──────────────────────────────────────────────────────────

/// The `(device_id, metric_name)` pair that owns one rolling window.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowKey {
    pub device_id: String,
    pub metric_name: String,
}

impl WindowKey {
    pub fn new(device_id: impl Into<String>, metric_name: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            metric_name: metric_name.into(),
        }
    }
}

impl fmt::Display for WindowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.device_id, self.metric_name)
    }
}

// ── Inbound submission ──────────────────────────────────────────────────

/// A reading as submitted by a device, before validation.
///
/// The timestamp is optional; [`NewReading::into_reading`] stamps it with
/// the ingestion time when absent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewReading {
    pub device_id: String,
    pub metric_name: String,
    pub value: f64,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewReading {
    pub fn new(device_id: impl Into<String>, metric_name: impl Into<String>, value: f64) -> Self {
        Self {
            device_id: device_id.into(),
            metric_name: metric_name.into(),
            value,
            unit: None,
            timestamp: None,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Check the submission without consuming it.
    pub fn validate(&self) -> ValidationResult<()> {
        if self.device_id.trim().is_empty() {
            return Err(ValidationError::EmptyDeviceId);
        }
        if self.metric_name.trim().is_empty() {
            return Err(ValidationError::EmptyMetricName);
        }
        if !self.value.is_finite() {
            return Err(ValidationError::NonFiniteValue(self.value));
        }
        if let Some(timestamp) = self.timestamp {
            check_timestamp(timestamp)?;
        }
        Ok(())
    }

    /// Validate and turn the submission into an identified [`Reading`].
    ///
    /// `received_at` is used as the timestamp when the device did not send one.
    pub fn into_reading(self, received_at: DateTime<Utc>) -> ValidationResult<Reading> {
        self.validate()?;
        let timestamp = check_timestamp(self.timestamp.unwrap_or(received_at))?;
        Ok(Reading {
            id: ReadingId::new(),
            device_id: self.device_id,
            metric_name: self.metric_name,
            value: self.value,
            unit: self.unit,
            timestamp,
        })
    }
}

/// Timestamps must fit in signed 64-bit nanoseconds since the Unix epoch.
fn check_timestamp(timestamp: DateTime<Utc>) -> ValidationResult<DateTime<Utc>> {
    match timestamp.timestamp_nanos_opt() {
        Some(_) => Ok(timestamp),
        None => Err(ValidationError::TimestampOutOfRange(timestamp)),
    }
}

// ── Accepted reading ────────────────────────────────────────────────────

/// One validated, timestamped observation. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub id: ReadingId,
    pub device_id: String,
    pub metric_name: String,
    pub value: f64,
    pub unit: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Reading {
    pub fn key(&self) -> WindowKey {
        WindowKey::new(self.device_id.clone(), self.metric_name.clone())
    }

    pub fn matches(&self, device_id: &str, metric_name: &str) -> bool {
        self.device_id == device_id && self.metric_name == metric_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn into_reading_keeps_supplied_timestamp() {
        let ts = Utc.with_ymd_and_hms(2023, 10, 27, 10, 0, 0).unwrap();
        let reading = NewReading::new("sensor-001", "temperature", 25.5)
            .with_unit("Celsius")
            .at(ts)
            .into_reading(Utc::now())
            .unwrap();

        assert_eq!(reading.timestamp, ts);
        assert_eq!(reading.unit.as_deref(), Some("Celsius"));
        assert_eq!(reading.key(), WindowKey::new("sensor-001", "temperature"));
    }

    #[test]
    fn into_reading_stamps_missing_timestamp() {
        let received = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let reading = NewReading::new("d", "m", 1.0)
            .into_reading(received)
            .unwrap();
        assert_eq!(reading.timestamp, received);
    }

    #[test]
    fn rejects_blank_identifiers() {
        let err = NewReading::new("  ", "m", 1.0).validate().unwrap_err();
        assert_eq!(err, ValidationError::EmptyDeviceId);

        let err = NewReading::new("d", "", 1.0).validate().unwrap_err();
        assert_eq!(err, ValidationError::EmptyMetricName);
    }

    #[test]
    fn rejects_non_finite_values() {
        for v in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = NewReading::new("d", "m", v).validate().unwrap_err();
            assert!(matches!(err, ValidationError::NonFiniteValue(_)));
        }
    }

    #[test]
    fn rejects_timestamps_outside_nanosecond_range() {
        for year in [1500, 1677, 2263, 9999] {
            let ts = Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap();
            let err = NewReading::new("d", "m", 1.0).at(ts).validate().unwrap_err();
            assert_eq!(err, ValidationError::TimestampOutOfRange(ts));
        }

        let far_future = Utc.with_ymd_and_hms(2300, 1, 1, 0, 0, 0).unwrap();
        let err = NewReading::new("d", "m", 1.0)
            .into_reading(far_future)
            .unwrap_err();
        assert_eq!(err, ValidationError::TimestampOutOfRange(far_future));

        let edge = Utc.with_ymd_and_hms(2262, 1, 1, 0, 0, 0).unwrap();
        assert!(NewReading::new("d", "m", 1.0).at(edge).validate().is_ok());
    }

    #[test]
    fn submission_deserializes_without_optional_fields() {
        let json = r#"{"device_id":"sensor-7","metric_name":"humidity","value":41.0}"#;
        let submission: NewReading = serde_json::from_str(json).unwrap();
        assert!(submission.unit.is_none());
        assert!(submission.timestamp.is_none());
    }

    #[test]
    fn window_key_display() {
        assert_eq!(WindowKey::new("dev", "cpu").to_string(), "dev/cpu");
    }

    #[test]
    fn reading_ids_are_unique() {
        assert_ne!(ReadingId::new(), ReadingId::new());
    }
}
