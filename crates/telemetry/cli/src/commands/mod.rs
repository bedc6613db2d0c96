//! Subcommand implementations

pub mod ingest;
pub mod query;

use telemetry_types::{Anomaly, Reading};
use tabled::Tabled;

/// Table row for reading display
#[derive(Debug, Tabled)]
pub struct ReadingRow {
    id: String,
    device: String,
    metric: String,
    value: f64,
    unit: String,
    timestamp: String,
}

impl From<&Reading> for ReadingRow {
    fn from(r: &Reading) -> Self {
        Self {
            id: short_id(&r.id.to_string()),
            device: r.device_id.clone(),
            metric: r.metric_name.clone(),
            value: r.value,
            unit: r.unit.clone().unwrap_or_default(),
            timestamp: r.timestamp.to_rfc3339(),
        }
    }
}

/// Table row for anomaly display
#[derive(Debug, Tabled)]
pub struct AnomalyRow {
    reading: String,
    device: String,
    metric: String,
    value: f64,
    #[tabled(rename = "z-score")]
    score: String,
    #[tabled(rename = "type")]
    kind: String,
    timestamp: String,
}

impl From<&Anomaly> for AnomalyRow {
    fn from(a: &Anomaly) -> Self {
        Self {
            reading: short_id(&a.reading_id.to_string()),
            device: a.device_id.clone(),
            metric: a.metric_name.clone(),
            value: a.value,
            score: format!("{:+.2}", a.score),
            kind: a.anomaly_type.to_string(),
            timestamp: a.timestamp.to_rfc3339(),
        }
    }
}

fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}
