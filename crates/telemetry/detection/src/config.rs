//! Detection tuning knobs.

use serde::{Deserialize, Serialize};

use crate::error::{DetectionError, DetectionResult};

/// Configuration shared by the window store and the detector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Maximum values retained per `(device, metric)` window.
    #[serde(default = "default_window_capacity")]
    pub window_capacity: usize,

    /// Prior samples required before a reading is scored.
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    /// Absolute z-score above which a reading is anomalous.
    #[serde(default = "default_z_threshold")]
    pub z_threshold: f64,

    /// Standard deviations at or below this count as zero variance.
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            window_capacity: super::DEFAULT_WINDOW_CAPACITY,
            min_samples: super::DEFAULT_MIN_SAMPLES,
            z_threshold: super::DEFAULT_Z_THRESHOLD,
            epsilon: super::DEFAULT_EPSILON,
        }
    }
}

impl DetectionConfig {
    pub fn validate(&self) -> DetectionResult<()> {
        if self.window_capacity == 0 {
            return Err(DetectionError::InvalidConfig(
                "window_capacity must be at least 1".into(),
            ));
        }
        if self.min_samples > self.window_capacity {
            return Err(DetectionError::InvalidConfig(format!(
                "min_samples ({}) cannot exceed window_capacity ({})",
                self.min_samples, self.window_capacity
            )));
        }
        if !self.z_threshold.is_finite() || self.z_threshold <= 0.0 {
            return Err(DetectionError::InvalidConfig(format!(
                "z_threshold must be a positive finite number, got {}",
                self.z_threshold
            )));
        }
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(DetectionError::InvalidConfig(format!(
                "epsilon must be a non-negative finite number, got {}",
                self.epsilon
            )));
        }
        Ok(())
    }
}

fn default_window_capacity() -> usize {
    super::DEFAULT_WINDOW_CAPACITY
}

fn default_min_samples() -> usize {
    super::DEFAULT_MIN_SAMPLES
}

fn default_z_threshold() -> f64 {
    super::DEFAULT_Z_THRESHOLD
}

fn default_epsilon() -> f64 {
    super::DEFAULT_EPSILON
}
