//! Bounded rolling window with incremental mean/variance.
//!
//! Aggregates follow Welford's online algorithm. Eviction of the oldest value
//! reverses its contribution instead of rescanning the buffer, so each push
//! is O(1). After every full turnover of the buffer the aggregates are
//! recomputed exactly from its contents, which keeps accumulated rounding
//! error bounded over arbitrarily long streams at O(1) amortized cost.

use std::collections::VecDeque;

/// Summary statistics over a window's current contents.
///
/// `variance` is the population variance (divides by `count`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindowStats {
    pub count: usize,
    pub mean: f64,
    pub variance: f64,
    pub std_dev: f64,
}

impl WindowStats {
    pub const EMPTY: Self = Self {
        count: 0,
        mean: 0.0,
        variance: 0.0,
        std_dev: 0.0,
    };
}

/// The most recent `capacity` values for one key plus running aggregates.
#[derive(Clone, Debug)]
pub struct Window {
    values: VecDeque<f64>,
    capacity: usize,
    mean: f64,
    /// Sum of squared deviations from the mean.
    m2: f64,
    /// Pushes since the aggregates were last recomputed from scratch.
    drift_pushes: usize,
}

impl Window {
    /// Create an empty window. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
            mean: 0.0,
            m2: 0.0,
            drift_pushes: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Values currently held, oldest first.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }

    pub fn stats(&self) -> WindowStats {
        let count = self.values.len();
        if count == 0 {
            return WindowStats::EMPTY;
        }
        let variance = (self.m2 / count as f64).max(0.0);
        WindowStats {
            count,
            mean: self.mean,
            variance,
            std_dev: variance.sqrt(),
        }
    }

    /// Append `value`, evicting and returning the oldest value when full.
    pub fn push(&mut self, value: f64) -> Option<f64> {
        let evicted = if self.values.len() == self.capacity {
            let oldest = self.values.pop_front();
            if let Some(old) = oldest {
                self.remove_contribution(old);
            }
            oldest
        } else {
            None
        };

        self.values.push_back(value);
        self.add_contribution(value);

        self.drift_pushes += 1;
        if self.drift_pushes >= self.capacity {
            self.resync();
        }

        evicted
    }

    fn add_contribution(&mut self, value: f64) {
        let n = self.values.len() as f64;
        let delta = value - self.mean;
        self.mean += delta / n;
        self.m2 += delta * (value - self.mean);
    }

    /// Reverse a value's contribution. `self.values` must already exclude it.
    fn remove_contribution(&mut self, value: f64) {
        let remaining = self.values.len();
        if remaining == 0 {
            self.mean = 0.0;
            self.m2 = 0.0;
            return;
        }
        let old_mean = self.mean;
        self.mean = old_mean - (value - old_mean) / remaining as f64;
        self.m2 -= (value - old_mean) * (value - self.mean);
        if self.m2 < 0.0 {
            self.m2 = 0.0;
        }
    }

    /// Recompute mean and M2 from the buffer (shifted two-pass).
    ///
    /// Shifting by the oldest value keeps a window of identical values at
    /// exactly zero M2.
    fn resync(&mut self) {
        self.drift_pushes = 0;
        let Some(&pivot) = self.values.front() else {
            self.mean = 0.0;
            self.m2 = 0.0;
            return;
        };
        let n = self.values.len() as f64;
        let mean = pivot + self.values.iter().map(|v| v - pivot).sum::<f64>() / n;
        self.m2 = self.values.iter().map(|v| (v - mean) * (v - mean)).sum();
        self.mean = mean;
    }
}
