//! Ingestion pipeline: validate, update the window, score, persist.
//!
//! ```text
//!   NewReading
//!       │ validate (nothing mutated on failure)
//!       ▼
//!   WindowStore::update_and_stat ── per-key lock held only here
//!       │ PriorStats
//!       ▼
//!   AnomalyDetector::evaluate_prior
//!       │ Verdict
//!       ▼
//!   IngestionSink::record(reading, anomaly?) ── one transaction, bounded by timeout
//! ```
//!
//! Window state is not rolled back when persistence fails. After such a
//! failure the in-memory statistics already include the reading, so a retry
//! of the same reading is scored against history that counts it once.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use telemetry_detection::{AnomalyDetector, DetectionConfig, Verdict, WindowSnapshot, WindowStore};
use telemetry_storage::{IngestionSink, StorageError};
use telemetry_types::{Anomaly, NewReading, Reading, WindowKey};
use tracing::{debug, info, instrument, warn};

use crate::config::IngestionConfig;
use crate::error::EngineResult;

/// Outcome of one ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionResult {
    /// The reading as persisted, with its assigned id and timestamp.
    pub reading: Reading,
    /// Always `true` on success; failures surface as errors instead.
    pub stored: bool,
    pub anomaly: Option<Anomaly>,
}

impl IngestionResult {
    pub fn is_anomalous(&self) -> bool {
        self.anomaly.is_some()
    }
}

/// Owns the window store and turns submissions into persisted verdicts.
pub struct IngestionService {
    windows: WindowStore,
    detector: AnomalyDetector,
    sink: Arc<dyn IngestionSink>,
    persistence_timeout: Option<Duration>,
}

impl IngestionService {
    pub fn new(
        detection: &DetectionConfig,
        ingestion: &IngestionConfig,
        sink: Arc<dyn IngestionSink>,
    ) -> Self {
        let persistence_timeout = match ingestion.persistence_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };
        Self {
            windows: WindowStore::from_config(detection),
            detector: AnomalyDetector::from_config(detection),
            sink,
            persistence_timeout,
        }
    }

    pub fn detector(&self) -> &AnomalyDetector {
        &self.detector
    }

    /// Validate, score and persist one reading.
    ///
    /// Exactly one reading row and at most one anomaly row are committed
    /// before this returns `Ok`.
    #[instrument(
        skip(self, submission),
        fields(device_id = %submission.device_id, metric = %submission.metric_name)
    )]
    pub async fn ingest(&self, submission: NewReading) -> EngineResult<IngestionResult> {
        let reading = submission.into_reading(Utc::now())?;
        let key = reading.key();

        let prior = self.windows.update_and_stat(&key, reading.value)?;
        let verdict = self.detector.evaluate_prior(reading.value, &prior);
        debug!(prior_count = prior.count(), ?verdict, "reading evaluated");

        let anomaly = match verdict {
            Verdict::Scored {
                score,
                anomalous: true,
            } => Anomaly::for_reading(&reading, score, self.detector.threshold()),
            _ => None,
        };

        if let Err(e) = self.persist(&reading, anomaly.as_ref()).await {
            warn!(
                reading_id = %reading.id,
                error = %e,
                "persistence failed after window update; window now ahead of storage"
            );
            return Err(e.into());
        }

        if let Some(anomaly) = &anomaly {
            info!(
                reading_id = %reading.id,
                value = reading.value,
                score = anomaly.score,
                anomaly_type = %anomaly.anomaly_type,
                "anomaly detected"
            );
        }

        Ok(IngestionResult {
            reading,
            stored: true,
            anomaly,
        })
    }

    /// Current contents of one window, for diagnostics.
    pub fn window_snapshot(
        &self,
        device_id: &str,
        metric_name: &str,
    ) -> EngineResult<Option<WindowSnapshot>> {
        Ok(self
            .windows
            .snapshot(&WindowKey::new(device_id, metric_name))?)
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.key_count()
    }

    async fn persist(&self, reading: &Reading, anomaly: Option<&Anomaly>) -> Result<(), StorageError> {
        let write = self.sink.record(reading, anomaly);
        match self.persistence_timeout {
            Some(limit) => tokio::time::timeout(limit, write)
                .await
                .map_err(|_| StorageError::Timeout(limit))?,
            None => write.await,
        }
    }
}
