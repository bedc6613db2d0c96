//! Concurrent per-key window registry.
//!
//! Windows live in a sharded `DashMap`, each behind its own mutex. A lookup
//! takes the shard lock only long enough to clone the window handle, so
//! updates for different keys never wait on each other, while updates for the
//! same key serialize on the window mutex.

use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use telemetry_types::WindowKey;
use tracing::debug;

use crate::config::DetectionConfig;
use crate::error::{DetectionError, DetectionResult};
use crate::window::{Window, WindowStats};

/// Statistics of a window as they were *before* the latest value went in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PriorStats {
    /// Too few prior samples to judge the new value.
    InsufficientHistory { count: usize },
    /// Enough history; the new value is scored against these.
    Ready(WindowStats),
}

impl PriorStats {
    pub fn count(&self) -> usize {
        match self {
            Self::InsufficientHistory { count } => *count,
            Self::Ready(stats) => stats.count,
        }
    }

    pub fn stats(&self) -> Option<&WindowStats> {
        match self {
            Self::InsufficientHistory { .. } => None,
            Self::Ready(stats) => Some(stats),
        }
    }
}

/// Point-in-time copy of one window.
#[derive(Clone, Debug, PartialEq)]
pub struct WindowSnapshot {
    pub key: WindowKey,
    pub values: Vec<f64>,
    pub stats: WindowStats,
}

/// Owns one rolling window per `(device, metric)` key.
pub struct WindowStore {
    windows: DashMap<WindowKey, Arc<Mutex<Window>>>,
    capacity: usize,
    min_samples: usize,
}

impl WindowStore {
    pub fn new(capacity: usize, min_samples: usize) -> Self {
        Self {
            windows: DashMap::new(),
            capacity: capacity.max(1),
            // Zero prior samples can never be judged.
            min_samples: min_samples.max(1),
        }
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(config.window_capacity, config.min_samples)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn min_samples(&self) -> usize {
        self.min_samples
    }

    /// Insert `value` into the window for `key` and return the statistics of
    /// the window's contents before the insertion.
    ///
    /// Creates the window on first use. The read-modify-write is atomic per
    /// key.
    pub fn update_and_stat(&self, key: &WindowKey, value: f64) -> DetectionResult<PriorStats> {
        let window = self.window_for(key);
        let mut guard = window
            .lock()
            .map_err(|_| DetectionError::LockPoisoned(key.clone()))?;

        let prior = guard.stats();
        guard.push(value);
        drop(guard);

        if prior.count < self.min_samples {
            Ok(PriorStats::InsufficientHistory { count: prior.count })
        } else {
            Ok(PriorStats::Ready(prior))
        }
    }

    /// Copy of the window for `key`, if one exists.
    pub fn snapshot(&self, key: &WindowKey) -> DetectionResult<Option<WindowSnapshot>> {
        let Some(window) = self.windows.get(key).map(|w| Arc::clone(w.value())) else {
            return Ok(None);
        };
        let guard = window
            .lock()
            .map_err(|_| DetectionError::LockPoisoned(key.clone()))?;
        Ok(Some(WindowSnapshot {
            key: key.clone(),
            values: guard.values().collect(),
            stats: guard.stats(),
        }))
    }

    /// Number of keys with a window.
    pub fn key_count(&self) -> usize {
        self.windows.len()
    }

    fn window_for(&self, key: &WindowKey) -> Arc<Mutex<Window>> {
        if let Some(existing) = self.windows.get(key) {
            return Arc::clone(existing.value());
        }
        let entry = self.windows.entry(key.clone()).or_insert_with(|| {
            debug!(device_id = %key.device_id, metric = %key.metric_name, "window created");
            Arc::new(Mutex::new(Window::new(self.capacity)))
        });
        Arc::clone(entry.value())
    }
}

impl Default for WindowStore {
    fn default() -> Self {
        Self::from_config(&DetectionConfig::default())
    }
}
