//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the CheckpointStore trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{CheckpointStore, StorageResult};
use crate::storage::CheckpointRecord;
use crate::stream::Checkpoint;
use crate::TideError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const SELECT_COLUMNS: &str =
    "SELECT id, seed_url, config_hash, saved_at, bookkeeper, member_buffer, processed_uris FROM checkpoints";

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<CheckpointRecord> {
    Ok(CheckpointRecord {
        id: row.get(0)?,
        seed_url: row.get(1)?,
        config_hash: row.get(2)?,
        saved_at: row.get(3)?,
        checkpoint: Checkpoint {
            bookkeeper: row.get(4)?,
            member_buffer: row.get(5)?,
            processed_uris: row.get(6)?,
        },
    })
}

/// SQLite checkpoint backend
pub struct SqliteCheckpointStore {
    conn: Connection,
}

impl SqliteCheckpointStore {
    /// Creates a new SqliteCheckpointStore instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteCheckpointStore)` - Successfully opened/created database
    /// * `Err(TideError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, TideError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, TideError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

impl CheckpointStore for SqliteCheckpointStore {
    fn save_checkpoint(
        &mut self,
        seed_url: &str,
        config_hash: &str,
        checkpoint: &Checkpoint,
    ) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO checkpoints
             (seed_url, config_hash, saved_at, bookkeeper, member_buffer, processed_uris)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                seed_url,
                config_hash,
                now,
                checkpoint.bookkeeper,
                checkpoint.member_buffer,
                checkpoint.processed_uris
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn load_latest_checkpoint(&self, seed_url: &str) -> StorageResult<Option<CheckpointRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{} WHERE seed_url = ?1 ORDER BY id DESC LIMIT 1",
            SELECT_COLUMNS
        ))?;

        let record = stmt
            .query_row(params![seed_url], record_from_row)
            .optional()?;

        Ok(record)
    }

    fn clear_checkpoints(&mut self, seed_url: &str) -> StorageResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM checkpoints WHERE seed_url = ?1",
            params![seed_url],
        )?;
        Ok(removed)
    }

    fn count_checkpoints(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM checkpoints", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
