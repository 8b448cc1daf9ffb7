//! Record sinks: persistent tabular storage for assembled rows.
//!
//! A sink is initialized once per run with the header, which discards any
//! previous content, then receives one row per emitted record. Every row is
//! flushed before `append` returns so a write failure is reported against
//! the row that caused it.

use std::fs::File;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("create output '{path}': {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("write row {row}: {source}")]
    WriteFailure { row: usize, source: csv::Error },

    #[error("sink received a row before its header")]
    NotInitialized,
}

/// Destination for assembled rows.
pub trait RecordSink {
    /// Start a fresh table with `header`, discarding prior content.
    fn initialize(&mut self, header: &[String]) -> Result<(), SinkError>;

    /// Append exactly one row.
    fn append(&mut self, row: &[String]) -> Result<(), SinkError>;

    /// Flush anything still buffered.
    fn finish(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Comma-delimited file sink.
pub struct CsvSink {
    path: PathBuf,
    writer: Option<csv::Writer<File>>,
    rows: usize,
}

impl CsvSink {
    /// Sink writing to `path`. The file is created (or truncated) by
    /// `initialize`, not here.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            writer: None,
            rows: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows appended since the last `initialize`.
    pub fn rows_written(&self) -> usize {
        self.rows
    }

    fn write(
        writer: &mut csv::Writer<File>,
        fields: &[String],
        row: usize,
    ) -> Result<(), SinkError> {
        writer
            .write_record(fields)
            .and_then(|_| writer.flush().map_err(csv::Error::from))
            .map_err(|source| SinkError::WriteFailure { row, source })
    }
}

impl RecordSink for CsvSink {
    fn initialize(&mut self, header: &[String]) -> Result<(), SinkError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| SinkError::Open {
                path: self.path.clone(),
                source,
            })?;
        }
        let file = File::create(&self.path).map_err(|source| SinkError::Open {
            path: self.path.clone(),
            source,
        })?;
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b',')
            .flexible(false)
            .from_writer(file);
        Self::write(&mut writer, header, 0)?;
        self.writer = Some(writer);
        self.rows = 0;
        Ok(())
    }

    fn append(&mut self, row: &[String]) -> Result<(), SinkError> {
        let writer = self.writer.as_mut().ok_or(SinkError::NotInitialized)?;
        Self::write(writer, row, self.rows + 1)?;
        self.rows += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush().map_err(|e| SinkError::WriteFailure {
                row: self.rows,
                source: e.into(),
            })?;
        }
        Ok(())
    }
}

/// In-memory sink, for previews and tests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemorySink {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RecordSink for MemorySink {
    fn initialize(&mut self, header: &[String]) -> Result<(), SinkError> {
        self.header = header.to_vec();
        self.rows.clear();
        Ok(())
    }

    fn append(&mut self, row: &[String]) -> Result<(), SinkError> {
        self.rows.push(row.to_vec());
        Ok(())
    }
}
