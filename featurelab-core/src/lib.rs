//! FeatureLab Core: causal feature derivation over OHLC bar streams.
//!
//! This crate contains the numeric heart of the exporter:
//! - Domain types (bars, bar fields)
//! - Append-only series addressable by lag
//! - Rolling statistics (moments, extrema, regressions, filters, fractal measures)
//! - Derived-series graph evaluated once per bar in dependency order
//! - Percentile-rank and z-score normalization
//! - Feature catalog and lag-1 record assembly
//!
//! No I/O happens here; loading bars and writing rows live in the runner.

pub mod catalog;
pub mod domain;
pub mod error;
pub mod graph;
pub mod normalize;
pub mod record;
pub mod series;
pub mod stats;

pub use catalog::{FeatureConfig, FeatureSchema, Tier};
pub use domain::{Bar, BarField};
pub use error::FeatureError;
pub use graph::{DerivedSeriesGraph, GraphBuilder, SeriesId, SeriesRef};
pub use normalize::Normalization;
pub use record::{Column, FeatureSet, Record, RecordAssembler};
pub use series::{BarSeries, Series};
