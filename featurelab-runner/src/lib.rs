//! FeatureLab Runner: configuration, bar loading, and the export loop.
//!
//! This crate builds on `featurelab-core` to provide:
//! - TOML configuration with validation and content-addressed run ids
//! - Bar loading from CSV plus a seeded synthetic generator
//! - Record sinks (CSV file, in-memory)
//! - Warm-up and session/date emission policy
//! - The per-bar run loop over an explicit `RunState`

pub mod config;
pub mod data_loader;
pub mod runner;
pub mod session;
pub mod sink;
pub mod warmup;

pub use config::{ConfigError, PipelineConfig, RunId, SessionConfig};
pub use data_loader::{
    dataset_hash, generate_synthetic_bars, load_bars_csv, write_bars_csv, LoadError, LoadedData,
};
pub use runner::{run_export, run_pipeline, BarOutcome, RunError, RunState, RunSummary};
pub use session::{Emission, SessionPolicy};
pub use sink::{CsvSink, MemorySink, RecordSink, SinkError};
pub use warmup::WarmupState;

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<PipelineConfig>();
        assert_sync::<PipelineConfig>();
        assert_send::<SessionPolicy>();
        assert_sync::<SessionPolicy>();
    }

    #[test]
    fn loaded_data_is_send_sync() {
        assert_send::<LoadedData>();
        assert_sync::<LoadedData>();
    }

    #[test]
    fn run_summary_is_send_sync() {
        assert_send::<RunSummary>();
        assert_sync::<RunSummary>();
    }

    #[test]
    fn sinks_are_send() {
        assert_send::<CsvSink>();
        assert_send::<MemorySink>();
    }
}
