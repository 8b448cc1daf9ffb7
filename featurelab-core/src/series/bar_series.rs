//! Time-ordered OHLC buffer with bounded lookback.

use std::collections::VecDeque;

use chrono::NaiveDateTime;

use super::Series;
use crate::domain::{Bar, BarField};
use crate::error::FeatureError;

/// Append-only OHLC history. Each field is stored as its own `Series` so
/// derived series can read bar fields exactly like any other input.
#[derive(Debug, Clone)]
pub struct BarSeries {
    open: Series,
    high: Series,
    low: Series,
    close: Series,
    timestamps: VecDeque<NaiveDateTime>,
    retention: Option<usize>,
}

impl Default for BarSeries {
    fn default() -> Self {
        Self::new()
    }
}

impl BarSeries {
    pub fn new() -> Self {
        Self {
            open: Series::new(),
            high: Series::new(),
            low: Series::new(),
            close: Series::new(),
            timestamps: VecDeque::new(),
            retention: None,
        }
    }

    /// Keep at least `retention` bars addressable; older bars may be dropped.
    pub fn with_retention(retention: usize) -> Self {
        let retention = retention.max(1);
        Self {
            open: Series::with_retention(retention),
            high: Series::with_retention(retention),
            low: Series::with_retention(retention),
            close: Series::with_retention(retention),
            timestamps: VecDeque::with_capacity(retention + 1),
            retention: Some(retention),
        }
    }

    /// Append one bar. Timestamps must strictly increase.
    pub fn append(&mut self, bar: &Bar) -> Result<(), FeatureError> {
        if let Some(&previous) = self.timestamps.back() {
            if bar.timestamp <= previous {
                return Err(FeatureError::OutOfOrderBar {
                    timestamp: bar.timestamp,
                    previous,
                });
            }
        }
        self.open.push(bar.open);
        self.high.push(bar.high);
        self.low.push(bar.low);
        self.close.push(bar.close);
        self.timestamps.push_back(bar.timestamp);
        if let Some(keep) = self.retention {
            while self.timestamps.len() > keep {
                self.timestamps.pop_front();
            }
        }
        Ok(())
    }

    /// Value of `field` at `lag` bars back.
    pub fn get(&self, field: BarField, lag: usize) -> Result<f64, FeatureError> {
        self.series(field).get(lag)
    }

    /// Timestamp of the bar `lag` bars back.
    pub fn timestamp(&self, lag: usize) -> Result<NaiveDateTime, FeatureError> {
        let n = self.timestamps.len();
        if lag >= n {
            return Err(FeatureError::OutOfRange { lag, retained: n });
        }
        Ok(self.timestamps[n - 1 - lag])
    }

    /// Whole-field view, used by the derived-series graph.
    pub fn series(&self, field: BarField) -> &Series {
        match field {
            BarField::Open => &self.open,
            BarField::High => &self.high,
            BarField::Low => &self.low,
            BarField::Close => &self.close,
        }
    }

    /// Number of bars appended so far.
    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn ts(hours: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::hours(hours)
    }

    fn bar(hours: i64, close: f64) -> Bar {
        Bar::new(ts(hours), close, close + 1.0, close - 1.0, close)
    }

    #[test]
    fn get_reads_fields_by_lag() {
        let mut bars = BarSeries::new();
        bars.append(&bar(0, 100.0)).unwrap();
        bars.append(&bar(1, 101.0)).unwrap();

        assert_eq!(bars.get(BarField::Close, 0), Ok(101.0));
        assert_eq!(bars.get(BarField::High, 1), Ok(101.0));
        assert_eq!(bars.get(BarField::Low, 0), Ok(100.0));
        assert_eq!(bars.timestamp(1), Ok(ts(0)));
        assert_eq!(bars.len(), 2);
    }

    #[test]
    fn lag_beyond_history_fails() {
        let mut bars = BarSeries::new();
        bars.append(&bar(0, 100.0)).unwrap();
        assert!(matches!(
            bars.get(BarField::Close, 1),
            Err(FeatureError::OutOfRange { lag: 1, .. })
        ));
    }

    #[test]
    fn rejects_duplicate_and_backward_timestamps() {
        let mut bars = BarSeries::new();
        bars.append(&bar(5, 100.0)).unwrap();
        assert!(matches!(
            bars.append(&bar(5, 101.0)),
            Err(FeatureError::OutOfOrderBar { .. })
        ));
        assert!(matches!(
            bars.append(&bar(4, 101.0)),
            Err(FeatureError::OutOfOrderBar { .. })
        ));
        assert_eq!(bars.len(), 1);
    }

    #[test]
    fn retention_bounds_timestamps() {
        let mut bars = BarSeries::with_retention(3);
        for h in 0..10 {
            bars.append(&bar(h, 100.0 + h as f64)).unwrap();
        }
        assert_eq!(bars.len(), 10);
        assert_eq!(bars.timestamp(2), Ok(ts(7)));
        assert!(bars.timestamp(3).is_err());
        assert_eq!(bars.get(BarField::Close, 2), Ok(107.0));
    }
}
