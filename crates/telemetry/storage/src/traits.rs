use async_trait::async_trait;
use chrono::{DateTime, Utc};
use telemetry_types::{Anomaly, Reading};

use crate::model::{AnomalyQuery, MetricSummary, SeriesQuery};
use crate::StorageResult;

/// Generic query window for paged reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryWindow {
    /// Maximum rows to return. `0` means unbounded.
    pub limit: usize,
    pub offset: usize,
}

impl QueryWindow {
    pub fn new(limit: usize, offset: usize) -> Self {
        Self { limit, offset }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }
}

/// Write side used by ingestion.
#[async_trait]
pub trait IngestionSink: Send + Sync {
    /// Persist `reading` and, if present, the anomaly raised for it.
    ///
    /// Both rows become visible together or not at all.
    async fn record(&self, reading: &Reading, anomaly: Option<&Anomaly>) -> StorageResult<()>;
}

/// Read side over persisted readings.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// All readings, oldest first.
    async fn list_readings(&self, window: QueryWindow) -> StorageResult<Vec<Reading>>;

    /// Readings of one device across all metrics, oldest first.
    async fn readings_for_device(
        &self,
        device_id: &str,
        window: QueryWindow,
    ) -> StorageResult<Vec<Reading>>;

    /// The `count` most recent readings of one device, newest first.
    async fn recent_readings(&self, device_id: &str, count: usize) -> StorageResult<Vec<Reading>>;

    /// Readings of one key, oldest first.
    async fn time_series(&self, query: &SeriesQuery) -> StorageResult<Vec<Reading>>;

    /// `None` when the key has no readings.
    async fn metric_summary(
        &self,
        device_id: &str,
        metric_name: &str,
    ) -> StorageResult<Option<MetricSummary>>;
}

/// Read side over persisted anomalies.
#[async_trait]
pub trait AnomalyStore: Send + Sync {
    /// Anomalies newest first.
    async fn list_anomalies(&self, query: &AnomalyQuery) -> StorageResult<Vec<Anomaly>>;

    /// Anomalies of one key within an inclusive time range, oldest first.
    async fn anomalies_for_key(
        &self,
        device_id: &str,
        metric_name: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> StorageResult<Vec<Anomaly>>;
}

/// Unified storage bundle used by the ingestion and query services.
pub trait TelemetryStore: IngestionSink + ReadingStore + AnomalyStore + Send + Sync {}

impl<T> TelemetryStore for T where T: IngestionSink + ReadingStore + AnomalyStore + Send + Sync {}
