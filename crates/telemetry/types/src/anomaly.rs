//! Anomaly records raised at ingestion time.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reading::{Reading, ReadingId};

/// Direction of the deviation, derived from the sign of the z-score.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyKind {
    High,
    Low,
}

impl AnomalyKind {
    /// `None` for a score of exactly zero (or NaN), which cannot be anomalous.
    pub fn from_score(score: f64) -> Option<Self> {
        if score > 0.0 {
            Some(Self::High)
        } else if score < 0.0 {
            Some(Self::Low)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnomalyKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "high" => Ok(Self::High),
            "low" => Ok(Self::Low),
            other => Err(format!("unknown anomaly type `{other}`")),
        }
    }
}

/// Persisted record of a reading whose z-score crossed the threshold.
///
/// Carries a copy of the triggering reading's fields so anomalies can be
/// listed without joining back to the readings relation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub reading_id: ReadingId,
    pub device_id: String,
    pub metric_name: String,
    pub value: f64,
    pub unit: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub score: f64,
    pub anomaly_type: AnomalyKind,
    pub threshold_used: f64,
}

impl Anomaly {
    /// Build the record for `reading`. Returns `None` when the score has no sign.
    pub fn for_reading(reading: &Reading, score: f64, threshold_used: f64) -> Option<Self> {
        let anomaly_type = AnomalyKind::from_score(score)?;
        Some(Self {
            reading_id: reading.id,
            device_id: reading.device_id.clone(),
            metric_name: reading.metric_name.clone(),
            value: reading.value,
            unit: reading.unit.clone(),
            timestamp: reading.timestamp,
            score,
            anomaly_type,
            threshold_used,
        })
    }

    /// Whether this anomaly was raised for `reading`, field for field.
    pub fn describes(&self, reading: &Reading) -> bool {
        self.reading_id == reading.id
            && self.device_id == reading.device_id
            && self.metric_name == reading.metric_name
            && self.value == reading.value
            && self.unit == reading.unit
            && self.timestamp == reading.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::NewReading;

    #[test]
    fn kind_follows_score_sign() {
        assert_eq!(AnomalyKind::from_score(3.75), Some(AnomalyKind::High));
        assert_eq!(AnomalyKind::from_score(-3.75), Some(AnomalyKind::Low));
        assert_eq!(AnomalyKind::from_score(0.0), None);
        assert_eq!(AnomalyKind::from_score(f64::NAN), None);
    }

    #[test]
    fn kind_string_forms() {
        assert_eq!(AnomalyKind::High.to_string(), "high");
        assert_eq!("low".parse::<AnomalyKind>().unwrap(), AnomalyKind::Low);
        assert!("sideways".parse::<AnomalyKind>().is_err());
        assert_eq!(
            serde_json::to_string(&AnomalyKind::High).unwrap(),
            "\"high\""
        );
    }

    #[test]
    fn anomaly_copies_reading_fields() {
        let reading = NewReading::new("pump-3", "pressure", 17.5)
            .with_unit("bar")
            .into_reading(Utc::now())
            .unwrap();
        let anomaly = Anomaly::for_reading(&reading, 3.75, 2.5).unwrap();

        assert!(anomaly.describes(&reading));
        assert_eq!(anomaly.anomaly_type, AnomalyKind::High);
        assert!((anomaly.threshold_used - 2.5).abs() < f64::EPSILON);
    }
}
