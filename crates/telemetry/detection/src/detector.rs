//! Z-score classification.

use telemetry_types::AnomalyKind;

use crate::config::DetectionConfig;
use crate::store::PriorStats;

/// Outcome of scoring one value against prior statistics.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Verdict {
    /// Too little history to score; never anomalous.
    InsufficientHistory,
    /// Prior standard deviation was at or below epsilon; never anomalous.
    DegenerateVariance,
    /// A z-score was computed.
    Scored { score: f64, anomalous: bool },
}

impl Verdict {
    pub fn score(&self) -> Option<f64> {
        match self {
            Self::Scored { score, .. } => Some(*score),
            _ => None,
        }
    }

    pub fn is_anomalous(&self) -> bool {
        matches!(self, Self::Scored { anomalous: true, .. })
    }

    /// Direction of an anomalous score.
    pub fn kind(&self) -> Option<AnomalyKind> {
        match self {
            Self::Scored {
                score,
                anomalous: true,
            } => AnomalyKind::from_score(*score),
            _ => None,
        }
    }
}

/// Stateless z-score detector.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnomalyDetector {
    z_threshold: f64,
    epsilon: f64,
}

impl AnomalyDetector {
    pub fn new(z_threshold: f64, epsilon: f64) -> Self {
        Self {
            z_threshold,
            epsilon,
        }
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(config.z_threshold, config.epsilon)
    }

    pub fn threshold(&self) -> f64 {
        self.z_threshold
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Score `value` against a prior mean and standard deviation.
    ///
    /// Anomalous iff `|score| > threshold`. A standard deviation at or below
    /// epsilon (or NaN) yields [`Verdict::DegenerateVariance`] instead of a
    /// score.
    pub fn evaluate(&self, value: f64, mean: f64, std_dev: f64) -> Verdict {
        if !(std_dev > self.epsilon) {
            return Verdict::DegenerateVariance;
        }
        let score = (value - mean) / std_dev;
        Verdict::Scored {
            score,
            anomalous: score.abs() > self.z_threshold,
        }
    }

    /// Score `value` against the result of a window update.
    pub fn evaluate_prior(&self, value: f64, prior: &PriorStats) -> Verdict {
        match prior {
            PriorStats::InsufficientHistory { .. } => Verdict::InsufficientHistory,
            PriorStats::Ready(stats) => self.evaluate(value, stats.mean, stats.std_dev),
        }
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::from_config(&DetectionConfig::default())
    }
}
