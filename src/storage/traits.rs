//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::record::Record;
use crate::storage::{RunRecord, RunTotals, StoredRecord};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Unknown run status '{0}'")]
    UnknownStatus(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new crawl run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Marks a run as completed with its totals and a finish timestamp
    fn complete_run(&mut self, run_id: i64, totals: &RunTotals) -> StorageResult<()>;

    /// Marks a run as failed with the error that ended it
    fn fail_run(&mut self, run_id: i64, error_message: &str) -> StorageResult<()>;

    // ===== Dataset Records =====

    /// Inserts or replaces records keyed by their detail URL
    ///
    /// All records are written in one transaction. A key that already
    /// exists has every field and its timestamp overwritten.
    ///
    /// # Returns
    ///
    /// The number of records written
    fn upsert_records(&mut self, records: &[Record], timestamp: &str) -> StorageResult<usize>;

    /// Counts stored records
    fn count_records(&self) -> StorageResult<u64>;

    /// Gets a stored record by its detail URL
    fn get_record(&self, detail_url: &str) -> StorageResult<Option<StoredRecord>>;
}
