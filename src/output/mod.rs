//! Output module for delivering records and run summaries
//!
//! This module handles:
//! - Writing emitted records, one per line
//! - Recording stream statistics and printing them at exit

pub mod stats;
mod writer;

pub use stats::{print_statistics, StreamStats};
pub use writer::{OutputError, OutputResult, RecordWriter};
