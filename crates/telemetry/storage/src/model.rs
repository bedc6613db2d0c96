use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::traits::QueryWindow;

/// Aggregate over every stored reading of one `(device, metric)` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub device_id: String,
    pub metric_name: String,
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// Readings of one key, optionally bounded in time. Bounds are inclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesQuery {
    pub device_id: String,
    pub metric_name: String,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Maximum rows, oldest first. `0` means unbounded.
    pub limit: usize,
}

impl SeriesQuery {
    pub fn new(device_id: impl Into<String>, metric_name: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            metric_name: metric_name.into(),
            from: None,
            to: None,
            limit: 0,
        }
    }

    pub fn from(mut self, from: Option<DateTime<Utc>>) -> Self {
        self.from = from;
        self
    }

    pub fn to(mut self, to: Option<DateTime<Utc>>) -> Self {
        self.to = to;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// An inverted range can match nothing.
    pub fn is_empty_range(&self) -> bool {
        matches!((self.from, self.to), (Some(from), Some(to)) if from > to)
    }
}

/// Filter for anomaly listings, which are always newest first.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AnomalyQuery {
    /// Only anomalies at or after this instant.
    pub since: Option<DateTime<Utc>>,
    pub window: QueryWindow,
}

impl AnomalyQuery {
    pub fn new(limit: Option<usize>, since: Option<DateTime<Utc>>) -> Self {
        Self {
            since,
            window: QueryWindow {
                limit: limit.unwrap_or(0),
                offset: 0,
            },
        }
    }

    /// Skip the `offset` newest matches.
    pub fn skip(mut self, offset: usize) -> Self {
        self.window.offset = offset;
        self
    }
}
