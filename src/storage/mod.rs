//! Storage module for persisting stream checkpoints
//!
//! This module handles all database operations for the binary, including:
//! - SQLite database initialization and schema management
//! - Saving exported stream state per seed URL
//! - Loading the most recent state on startup

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteCheckpointStore;
pub use traits::{CheckpointStore, StorageError, StorageResult};

use crate::stream::Checkpoint;
use crate::TideError;

use std::path::Path;

/// Initializes or opens a checkpoint database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteCheckpointStore)` - Successfully initialized storage
/// * `Err(TideError)` - Failed to initialize storage
pub fn open_store(path: &Path) -> Result<SqliteCheckpointStore, TideError> {
    SqliteCheckpointStore::new(path)
}

/// A saved checkpoint and where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointRecord {
    pub id: i64,
    pub seed_url: String,

    /// Hash of the configuration that produced the checkpoint
    pub config_hash: String,

    /// RFC 3339 timestamp
    pub saved_at: String,

    pub checkpoint: Checkpoint,
}

impl CheckpointRecord {
    /// Returns true if the checkpoint was written under a different configuration
    pub fn config_changed(&self, config_hash: &str) -> bool {
        self.config_hash != config_hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_changed() {
        let record = CheckpointRecord {
            id: 1,
            seed_url: "https://ex.org/feed".into(),
            config_hash: "abc".into(),
            saved_at: "2024-01-01T00:00:00Z".into(),
            checkpoint: Checkpoint {
                bookkeeper: "[]".into(),
                member_buffer: "[]".into(),
                processed_uris: "[]".into(),
            },
        };

        assert!(!record.config_changed("abc"));
        assert!(record.config_changed("def"));
    }
}
