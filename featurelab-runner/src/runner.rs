//! Export runner: wires the feature set, the emission policy, and a sink.
//!
//! All per-run mutable state lives in an explicit `RunState`: the bar
//! history and derived series (inside the feature set), the warm-up gate,
//! the sink, and the run counters. One call to `process_bar` advances the
//! whole pipeline by one bar.
//!
//! Entry points:
//! - `run_pipeline()`: pre-loaded bars into any sink. No file I/O of its own.
//! - `run_export()`: loads the bar file and writes the configured CSV output.

use std::path::Path;

use chrono::NaiveDate;
use featurelab_core::catalog;
use featurelab_core::{Bar, FeatureError, FeatureSet};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, PipelineConfig, RunId};
use crate::data_loader::{load_bars_csv, LoadError, LoadedData};
use crate::session::{Emission, SessionPolicy};
use crate::sink::{CsvSink, RecordSink, SinkError};
use crate::warmup::WarmupState;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("feature error: {0}")]
    Feature(#[from] FeatureError),
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
    #[error("fingerprint error: {0}")]
    Fingerprint(#[from] serde_json::Error),
}

/// Outcome of processing a single bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarOutcome {
    /// Not processed: after the configured end date.
    Ignored,
    /// Processed; the record was not written for this reason.
    Withheld(Emission),
    Written,
    /// The sink failed and the run is configured to continue.
    Skipped,
}

/// Summary of a finished export run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub instrument: String,
    pub dataset_hash: String,
    pub is_synthetic: bool,
    pub bars_processed: usize,
    pub bars_ignored: usize,
    pub warmup_bars: usize,
    pub columns: usize,
    pub rows_written: usize,
    pub rows_skipped: usize,
    pub first_row: Option<NaiveDate>,
    pub last_row: Option<NaiveDate>,
}

/// Explicit state of one export run.
pub struct RunState<'a, S: RecordSink> {
    config: &'a PipelineConfig,
    features: FeatureSet,
    warmup: WarmupState,
    session: SessionPolicy,
    sink: &'a mut S,
    bars_ignored: usize,
    rows_written: usize,
    rows_skipped: usize,
    first_row: Option<NaiveDate>,
    last_row: Option<NaiveDate>,
}

impl<'a, S: RecordSink> RunState<'a, S> {
    /// Declare the feature graph and start a fresh table in `sink`.
    pub fn new(config: &'a PipelineConfig, sink: &'a mut S) -> Result<Self, RunError> {
        let features = catalog::build(&config.features)?;
        let warmup = WarmupState::resolve(config.warmup_bars, features.warmup_bars());
        sink.initialize(&features.assembler().header())?;
        Ok(Self {
            config,
            features,
            warmup,
            session: SessionPolicy::from_config(config),
            sink,
            bars_ignored: 0,
            rows_written: 0,
            rows_skipped: 0,
            first_row: None,
            last_row: None,
        })
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    pub fn warmup(&self) -> &WarmupState {
        &self.warmup
    }

    /// Process one bar to completion.
    pub fn process_bar(&mut self, bar: &Bar) -> Result<BarOutcome, RunError> {
        if self.session.is_past_end(bar.timestamp) {
            if self.bars_ignored == 0 {
                debug!(timestamp = %bar.timestamp, "past end date, ignoring remaining bars");
            }
            self.bars_ignored += 1;
            return Ok(BarOutcome::Ignored);
        }

        let record = self.features.advance(bar)?;
        self.warmup.process_bar();
        if !self.warmup.is_warm() {
            return Ok(BarOutcome::Withheld(Emission::Warmup));
        }
        match self.session.classify(bar.timestamp) {
            Emission::Emit => {}
            other => return Ok(BarOutcome::Withheld(other)),
        }

        let row = self.features.assembler().format(&record);
        match self.sink.append(&row) {
            Ok(()) => {
                self.rows_written += 1;
                self.first_row.get_or_insert(record.date());
                self.last_row = Some(record.date());
                Ok(BarOutcome::Written)
            }
            Err(err) if self.config.continue_on_sink_error => {
                warn!(date = %record.date(), error = %err, "skipping row the sink could not write");
                self.rows_skipped += 1;
                Ok(BarOutcome::Skipped)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Flush the sink and summarize the run.
    pub fn finish(self, data: &LoadedData) -> Result<RunSummary, RunError> {
        self.sink.finish()?;
        Ok(RunSummary {
            run_id: self.config.run_id()?,
            instrument: self.config.instrument.clone(),
            dataset_hash: data.dataset_hash.clone(),
            is_synthetic: data.is_synthetic,
            bars_processed: self.warmup.bars_processed(),
            bars_ignored: self.bars_ignored,
            warmup_bars: self.warmup.warmup_bars(),
            columns: self.features.assembler().header().len(),
            rows_written: self.rows_written,
            rows_skipped: self.rows_skipped,
            first_row: self.first_row,
            last_row: self.last_row,
        })
    }
}

/// Run the pipeline over pre-loaded bars into `sink`.
pub fn run_pipeline<S: RecordSink>(
    config: &PipelineConfig,
    data: &LoadedData,
    sink: &mut S,
) -> Result<RunSummary, RunError> {
    config.validate()?;
    let mut state = RunState::new(config, sink)?;
    info!(
        instrument = %config.instrument,
        bar_period_minutes = config.bar_period_minutes,
        bars = data.bars.len(),
        dataset_hash = %data.dataset_hash,
        synthetic = data.is_synthetic,
        warmup_bars = state.warmup().warmup_bars(),
        columns = state.features().assembler().header().len(),
        "starting export"
    );

    for bar in &data.bars {
        if state.process_bar(bar)? == BarOutcome::Ignored {
            break;
        }
    }
    let summary = state.finish(data)?;
    info!(
        run_id = %summary.run_id,
        bars = summary.bars_processed,
        rows = summary.rows_written,
        skipped = summary.rows_skipped,
        "export finished"
    );
    Ok(summary)
}

/// Load `input` and export it to the configured output file.
pub fn run_export(config: &PipelineConfig, input: &Path) -> Result<RunSummary, RunError> {
    let data = load_bars_csv(input)?;
    let mut sink = CsvSink::new(&config.output);
    run_pipeline(config, &data, &mut sink)
}
