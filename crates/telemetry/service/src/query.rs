//! Read-only views over persisted readings and anomalies.
//!
//! Queries never consult window state; everything comes from storage, so a
//! query sees every ingestion that returned before it started.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use telemetry_storage::{AnomalyQuery, MetricSummary, QueryWindow, SeriesQuery, TelemetryStore};
use telemetry_types::{Anomaly, Reading, ReadingId};
use tracing::instrument;

use crate::error::EngineResult;

/// Readings returned by [`QueryService::recent_readings`] when no count is given.
pub const DEFAULT_RECENT_COUNT: usize = 10;

/// Readings returned by [`QueryService::plot_series`] when no limit is given.
pub const DEFAULT_PLOT_LIMIT: usize = 200;

/// One key's readings plus the anomalies raised for exactly those readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotSeries {
    pub device_id: String,
    pub metric_name: String,
    /// Oldest first.
    pub readings: Vec<Reading>,
    /// Oldest first.
    pub anomalies: Vec<Anomaly>,
}

pub struct QueryService {
    store: Arc<dyn TelemetryStore>,
}

impl QueryService {
    pub fn new(store: Arc<dyn TelemetryStore>) -> Self {
        Self { store }
    }

    /// Anomalies newest first, optionally only those at or after `since`.
    #[instrument(skip(self))]
    pub async fn list_anomalies(
        &self,
        limit: Option<usize>,
        since: Option<DateTime<Utc>>,
    ) -> EngineResult<Vec<Anomaly>> {
        Ok(self
            .store
            .list_anomalies(&AnomalyQuery::new(limit, since))
            .await?)
    }

    /// Like [`Self::list_anomalies`] with full control over the query, including an offset.
    pub async fn anomalies(&self, query: &AnomalyQuery) -> EngineResult<Vec<Anomaly>> {
        Ok(self.store.list_anomalies(query).await?)
    }

    /// Readings of one key oldest first, bounds inclusive.
    #[instrument(skip(self))]
    pub async fn time_series(
        &self,
        device_id: &str,
        metric_name: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> EngineResult<Vec<Reading>> {
        self.series(&SeriesQuery::new(device_id, metric_name).from(from).to(to))
            .await
    }

    /// Like [`Self::time_series`] with full control over the query, including a row limit.
    pub async fn series(&self, query: &SeriesQuery) -> EngineResult<Vec<Reading>> {
        Ok(self.store.time_series(query).await?)
    }

    #[instrument(skip(self))]
    pub async fn list_readings(&self, window: QueryWindow) -> EngineResult<Vec<Reading>> {
        Ok(self.store.list_readings(window).await?)
    }

    #[instrument(skip(self))]
    pub async fn readings_for_device(
        &self,
        device_id: &str,
        window: QueryWindow,
    ) -> EngineResult<Vec<Reading>> {
        Ok(self.store.readings_for_device(device_id, window).await?)
    }

    /// Most recent readings of a device, newest first.
    #[instrument(skip(self))]
    pub async fn recent_readings(
        &self,
        device_id: &str,
        count: Option<usize>,
    ) -> EngineResult<Vec<Reading>> {
        let count = count.unwrap_or(DEFAULT_RECENT_COUNT);
        Ok(self.store.recent_readings(device_id, count).await?)
    }

    #[instrument(skip(self))]
    pub async fn metric_summary(
        &self,
        device_id: &str,
        metric_name: &str,
    ) -> EngineResult<Option<MetricSummary>> {
        Ok(self.store.metric_summary(device_id, metric_name).await?)
    }

    /// The first `limit` readings of a key and the anomalies raised for them.
    #[instrument(skip(self))]
    pub async fn plot_series(
        &self,
        device_id: &str,
        metric_name: &str,
        limit: Option<usize>,
    ) -> EngineResult<PlotSeries> {
        let query = SeriesQuery::new(device_id, metric_name)
            .limit(limit.unwrap_or(DEFAULT_PLOT_LIMIT));
        let readings = self.store.time_series(&query).await?;

        let anomalies = match (readings.first(), readings.last()) {
            (Some(first), Some(last)) => {
                let ids: HashSet<ReadingId> = readings.iter().map(|r| r.id).collect();
                self.store
                    .anomalies_for_key(
                        device_id,
                        metric_name,
                        Some(first.timestamp),
                        Some(last.timestamp),
                    )
                    .await?
                    .into_iter()
                    .filter(|a| ids.contains(&a.reading_id))
                    .collect()
            }
            _ => Vec::new(),
        };

        Ok(PlotSeries {
            device_id: device_id.to_string(),
            metric_name: metric_name.to_string(),
            readings,
            anomalies,
        })
    }
}
