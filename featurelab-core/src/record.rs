//! Record assembly: one fixed-schema output row per bar.
//!
//! Feature columns are read from the previous, fully settled bar. Bar `t`'s
//! high, low and close are unknown at decision time, so only the target
//! label (the dependent variable) looks at the current bar.

use chrono::{NaiveDate, NaiveDateTime};

use crate::domain::Bar;
use crate::error::FeatureError;
use crate::graph::{DerivedSeriesGraph, SeriesRef};

/// Lag at which every feature column is read.
pub const FEATURE_LAG: usize = 1;

/// Header of the leading date column.
pub const DATE_COLUMN: &str = "DDMMYYYY";

/// Row date format (`dd.mm.YYYY`).
pub const DATE_FORMAT: &str = "%d.%m.%Y";

/// One named output column backed by a series.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub series: SeriesRef,
    /// Decimal digits when rendered.
    pub precision: usize,
}

/// One output row before formatting.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Timestamp of the bar the record was emitted on.
    pub timestamp: NaiveDateTime,
    pub target: f64,
    /// Feature values in column order, read at `FEATURE_LAG`.
    pub features: Vec<f64>,
}

impl Record {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// True once every feature column and the target hold a number.
    pub fn is_complete(&self) -> bool {
        !self.target.is_nan() && self.features.iter().all(|v| !v.is_nan())
    }
}

/// Reads an ordered column set out of a graph.
#[derive(Debug, Clone)]
pub struct RecordAssembler {
    target: Column,
    columns: Vec<Column>,
}

impl RecordAssembler {
    pub fn new(target: Column, columns: Vec<Column>) -> Self {
        Self { target, columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn target(&self) -> &Column {
        &self.target
    }

    /// Column names in row order, starting with the date and the target.
    pub fn header(&self) -> Vec<String> {
        let mut header = Vec::with_capacity(self.columns.len() + 2);
        header.push(DATE_COLUMN.to_string());
        header.push(self.target.name.clone());
        header.extend(self.columns.iter().map(|c| c.name.clone()));
        header
    }

    /// Build the record for the graph's current bar.
    pub fn assemble(&self, graph: &DerivedSeriesGraph) -> Result<Record, FeatureError> {
        let timestamp = graph.bars().timestamp(0)?;
        let target = graph.value(self.target.series, 0)?;
        let features = self
            .columns
            .iter()
            .map(|c| graph.value(c.series, FEATURE_LAG))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Record {
            timestamp,
            target,
            features,
        })
    }

    /// Number of bars after which every column can hold a defined value.
    pub fn warmup_bars(&self, graph: &DerivedSeriesGraph) -> usize {
        let target = graph.first_defined(self.target.series) + 1;
        self.columns
            .iter()
            .map(|c| graph.first_defined(c.series) + FEATURE_LAG + 1)
            .fold(target, usize::max)
    }

    /// Render a record as text fields in header order.
    pub fn format(&self, record: &Record) -> Vec<String> {
        let mut row = Vec::with_capacity(record.features.len() + 2);
        row.push(record.timestamp.format(DATE_FORMAT).to_string());
        row.push(format_value(record.target, self.target.precision));
        row.extend(
            record
                .features
                .iter()
                .zip(&self.columns)
                .map(|(v, c)| format_value(*v, c.precision)),
        );
        row
    }
}

/// Fixed-precision rendering; the sentinel renders as `NaN`.
pub fn format_value(value: f64, precision: usize) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    format!("{value:.precision$}")
}

/// A feature graph together with the record layout that reads it.
#[derive(Debug, Clone)]
pub struct FeatureSet {
    graph: DerivedSeriesGraph,
    assembler: RecordAssembler,
}

impl FeatureSet {
    pub fn new(graph: DerivedSeriesGraph, assembler: RecordAssembler) -> Self {
        Self { graph, assembler }
    }

    pub fn graph(&self) -> &DerivedSeriesGraph {
        &self.graph
    }

    pub fn assembler(&self) -> &RecordAssembler {
        &self.assembler
    }

    /// Process one bar to completion and return its record.
    pub fn advance(&mut self, bar: &Bar) -> Result<Record, FeatureError> {
        self.graph.push_bar(bar)?;
        self.assembler.assemble(&self.graph)
    }

    pub fn warmup_bars(&self) -> usize {
        self.assembler.warmup_bars(&self.graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BarField;
    use crate::graph::{GraphBuilder, RollingStat};
    use chrono::{Duration, NaiveDate};

    fn make_bars(closes: &[f64]) -> Vec<Bar> {
        let base = NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::new(base + Duration::days(i as i64), c, c + 1.0, c - 1.0, c))
            .collect()
    }

    fn small_set() -> FeatureSet {
        let mut b = GraphBuilder::new();
        let close = b.bar(BarField::Close);
        let sma = b.rolling(close, 2, RollingStat::Mean);
        let target = b.change(close, 1);
        b.require_history(close, 2);
        b.require_history(sma, 2);
        let graph = b.build().unwrap();
        let col = |name: &str, series| Column {
            name: name.to_string(),
            series,
            precision: 5,
        };
        FeatureSet::new(
            graph,
            RecordAssembler::new(
                Column {
                    precision: 3,
                    ..col("target", target)
                },
                vec![col("C", close), col("sma2", sma)],
            ),
        )
    }

    #[test]
    fn features_lag_one_bar_target_does_not() {
        let mut set = small_set();
        let bars = make_bars(&[10.0, 12.0, 15.0]);
        let first = set.advance(&bars[0]).unwrap();
        assert!(first.target.is_nan());
        assert!(first.features.iter().all(|v| v.is_nan()));

        set.advance(&bars[1]).unwrap();
        let third = set.advance(&bars[2]).unwrap();
        assert_eq!(third.timestamp, bars[2].timestamp);
        assert_eq!(third.target, 3.0);
        assert_eq!(third.features, vec![12.0, 11.0]);
    }

    #[test]
    fn header_and_row_align() {
        let mut set = small_set();
        let mut last = None;
        for bar in make_bars(&[10.0, 12.0, 15.0]) {
            last = Some(set.advance(&bar).unwrap());
        }
        let record = last.unwrap();
        let a = set.assembler();
        assert_eq!(a.header(), vec!["DDMMYYYY", "target", "C", "sma2"]);
        assert_eq!(
            a.format(&record),
            vec!["06.03.2024", "3.000", "12.00000", "11.00000"]
        );
    }

    #[test]
    fn sentinel_renders_as_nan() {
        assert_eq!(format_value(f64::NAN, 5), "NaN");
        assert_eq!(format_value(-1.0, 3), "-1.000");
        assert_eq!(format_value(0.123456, 5), "0.12346");
    }

    #[test]
    fn warmup_covers_lag_and_windows() {
        let set = small_set();
        // sma2 is first defined on bar index 1, read one bar later
        assert_eq!(set.warmup_bars(), 3);
    }

    #[test]
    fn completeness_reflects_sentinels() {
        let mut set = small_set();
        let bars = make_bars(&[10.0, 12.0, 15.0]);
        let r0 = set.advance(&bars[0]).unwrap();
        let r1 = set.advance(&bars[1]).unwrap();
        let r2 = set.advance(&bars[2]).unwrap();
        assert!(!r0.is_complete());
        assert!(!r1.is_complete());
        assert!(r2.is_complete());
    }
}
