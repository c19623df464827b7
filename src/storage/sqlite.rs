//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::record::{Metadata, MetadataField, Record};
use crate::storage::schema::{dataset_columns, initialize_schema, LEADING_COLUMNS};
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus, RunTotals, StoredRecord};
use crate::HarvestError;
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;

const RUN_COLUMNS: &str = "id, started_at, finished_at, config_hash, status, \
     expected_count, persisted_count, failed_items, error_message";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// The schema is created if missing, so the database is ready for
    /// inserts once this returns.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(HarvestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
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
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let sql = format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS);
        self.conn
            .query_row(&sql, params![run_id], run_from_row)
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let sql = format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS);
        let run = self.conn.query_row(&sql, [], run_from_row).optional()?;
        Ok(run)
    }

    fn complete_run(&mut self, run_id: i64, totals: &RunTotals) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, expected_count = ?3,
                persisted_count = ?4, failed_items = ?5
             WHERE id = ?6",
            params![
                RunStatus::Completed.to_db_string(),
                now,
                totals.expected_count.map(|count| count as i64),
                totals.persisted_count as i64,
                totals.failed_items as i64,
                run_id
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn fail_run(&mut self, run_id: i64, error_message: &str) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, error_message = ?3 WHERE id = ?4",
            params![RunStatus::Failed.to_db_string(), now, error_message, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Dataset Records =====

    fn upsert_records(&mut self, records: &[Record], timestamp: &str) -> StorageResult<usize> {
        let columns = dataset_columns();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT OR REPLACE INTO datasets ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        );

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for record in records {
                let mut values: Vec<Option<&str>> = vec![
                    Some(record.detail_url.as_str()),
                    record.identifier.as_deref(),
                    Some(record.title.as_str()),
                    record.formats.as_deref(),
                    Some(record.category.as_str()),
                ];
                values.extend(record.metadata.iter().map(|(_, value)| value));
                values.push(Some(record.list_url.as_str()));
                values.push(Some(timestamp));

                stmt.execute(params_from_iter(values))?;
            }
        }
        tx.commit()?;

        tracing::debug!("Upserted {} records", records.len());
        Ok(records.len())
    }

    fn count_records(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM datasets", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn get_record(&self, detail_url: &str) -> StorageResult<Option<StoredRecord>> {
        let sql = format!(
            "SELECT {} FROM datasets WHERE detail_url = ?1",
            dataset_columns().join(", ")
        );
        let record = self
            .conn
            .query_row(&sql, params![detail_url], stored_record_from_row)
            .optional()?;
        Ok(record)
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    let status: String = row.get(4)?;
    let status = RunStatus::from_db_string(&status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            Type::Text,
            Box::new(StorageError::UnknownStatus(status.clone())),
        )
    })?;
    let count = |index: usize| -> rusqlite::Result<Option<u64>> {
        Ok(row.get::<_, Option<i64>>(index)?.map(|value| value as u64))
    };

    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status,
        expected_count: count(5)?,
        persisted_count: count(6)?,
        failed_items: count(7)?,
        error_message: row.get(8)?,
    })
}

fn stored_record_from_row(row: &Row<'_>) -> rusqlite::Result<StoredRecord> {
    let first_metadata = LEADING_COLUMNS.len();
    let first_trailing = first_metadata + MetadataField::COUNT;

    let mut metadata = Metadata::default();
    for (offset, field) in MetadataField::ALL.iter().enumerate() {
        metadata.set(*field, row.get(first_metadata + offset)?);
    }

    Ok(StoredRecord {
        record: Record {
            detail_url: row.get(0)?,
            identifier: row.get(1)?,
            title: row.get(2)?,
            formats: row.get(3)?,
            category: row.get(4)?,
            metadata,
            list_url: row.get(first_trailing)?,
        },
        last_updated: row.get(first_trailing + 1)?,
    })
}
