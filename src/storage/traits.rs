//! Storage traits and error types
//!
//! This module defines the trait interface for checkpoint backends and
//! associated error types.

use crate::storage::CheckpointRecord;
use crate::stream::Checkpoint;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for checkpoint backend implementations
///
/// Checkpoints are keyed by the seed URL of the stream that exported them.
/// Saving never overwrites: every save adds a row, and loading picks the
/// newest one.
pub trait CheckpointStore {
    /// Persists an exported checkpoint
    ///
    /// # Arguments
    ///
    /// * `seed_url` - Seed URL of the stream
    /// * `config_hash` - Hash of the configuration file
    /// * `checkpoint` - The exported state
    ///
    /// # Returns
    ///
    /// The ID of the new row
    fn save_checkpoint(
        &mut self,
        seed_url: &str,
        config_hash: &str,
        checkpoint: &Checkpoint,
    ) -> StorageResult<i64>;

    /// Gets the most recent checkpoint for a seed URL
    fn load_latest_checkpoint(&self, seed_url: &str) -> StorageResult<Option<CheckpointRecord>>;

    /// Deletes every checkpoint for a seed URL, returning how many were removed
    fn clear_checkpoints(&mut self, seed_url: &str) -> StorageResult<usize>;

    /// Counts stored checkpoints across all seeds
    fn count_checkpoints(&self) -> StorageResult<u64>;
}
