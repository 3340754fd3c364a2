//! Line-oriented record output

use crate::stream::Record;
use std::io::Write;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to format record: {0}")]
    Format(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Writes records to a sink, one line each
///
/// Every record is flushed as soon as it is written so a downstream
/// consumer sees members as they arrive.
pub struct RecordWriter<W: Write> {
    sink: W,
    written: u64,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(sink: W) -> Self {
        Self { sink, written: 0 }
    }

    /// Writes one record
    ///
    /// # Arguments
    ///
    /// * `record` - The record to write
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The line was written and flushed
    /// * `Err(OutputError)` - Formatting or writing failed
    pub fn write_record(&mut self, record: &Record) -> OutputResult<()> {
        let line = record.to_line()?;
        self.sink.write_all(line.as_bytes())?;
        self.sink.flush()?;
        self.written += 1;
        Ok(())
    }

    /// Number of records written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}
