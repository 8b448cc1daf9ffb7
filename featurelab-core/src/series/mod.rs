//! Append-only numeric series addressable by lag.
//!
//! Lag 0 is the most recent sample. A series remembers how many samples were
//! ever appended, so "not enough history yet" (warm-up, yields the NaN
//! sentinel) is distinguishable from "history was discarded by retention"
//! (a caller bug, yields `OutOfRange`).

pub mod bar_series;

pub use bar_series::BarSeries;

use crate::error::FeatureError;

/// Minimum backing-buffer slack before retained samples are compacted.
const COMPACT_SLACK: usize = 64;

#[derive(Debug, Clone, Default)]
pub struct Series {
    values: Vec<f64>,
    dropped: usize,
    retention: Option<usize>,
}

impl Series {
    /// Unbounded series: every sample stays addressable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Series that keeps at least the last `retention` samples.
    pub fn with_retention(retention: usize) -> Self {
        Self {
            values: Vec::new(),
            dropped: 0,
            retention: Some(retention.max(1)),
        }
    }

    pub fn retention(&self) -> Option<usize> {
        self.retention
    }

    /// Append one sample. Past samples are never modified.
    pub fn push(&mut self, value: f64) {
        self.values.push(value);
        if let Some(keep) = self.retention {
            if self.values.len() >= keep * 2 + COMPACT_SLACK {
                let excess = self.values.len() - keep;
                self.values.drain(..excess);
                self.dropped += excess;
            }
        }
    }

    /// Total number of samples ever appended (one per processed bar).
    pub fn len(&self) -> usize {
        self.dropped + self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of samples currently addressable.
    pub fn retained(&self) -> usize {
        self.values.len()
    }

    /// Sample at `lag`, failing if it is not retained (or never existed).
    pub fn get(&self, lag: usize) -> Result<f64, FeatureError> {
        if lag >= self.values.len() {
            return Err(FeatureError::OutOfRange {
                lag,
                retained: self.values.len(),
            });
        }
        Ok(self.values[self.values.len() - 1 - lag])
    }

    /// Sample at `lag`, or the NaN sentinel when that much history does not
    /// exist yet. Discarded history is still an error.
    pub fn lagged(&self, lag: usize) -> Result<f64, FeatureError> {
        if lag >= self.len() {
            return Ok(f64::NAN);
        }
        self.get(lag)
    }

    /// The last `n` samples, oldest first. `None` while fewer than `n`
    /// samples have been appended.
    pub fn window(&self, n: usize) -> Result<Option<&[f64]>, FeatureError> {
        if n > self.len() {
            return Ok(None);
        }
        if n > self.values.len() {
            return Err(FeatureError::OutOfRange {
                lag: n - 1,
                retained: self.values.len(),
            });
        }
        Ok(Some(&self.values[self.values.len() - n..]))
    }

    /// Most recent sample, NaN when empty.
    pub fn latest(&self) -> f64 {
        self.values.last().copied().unwrap_or(f64::NAN)
    }
}
