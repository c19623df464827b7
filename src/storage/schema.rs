//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the harvester database.

use crate::record::MetadataField;

/// SQL schema for the database
///
/// The metadata columns of `datasets` follow [`MetadataField::ALL`].
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    expected_count INTEGER,
    persisted_count INTEGER,
    failed_items INTEGER,
    error_message TEXT
);

-- One row per dataset, keyed by its detail page
CREATE TABLE IF NOT EXISTS datasets (
    detail_url TEXT PRIMARY KEY,
    identifier TEXT,
    title TEXT NOT NULL,
    formats TEXT,
    category TEXT NOT NULL,
    source TEXT,
    fee TEXT,
    degree_to_which_processed TEXT,
    date_first_added TEXT,
    license TEXT,
    update_frequency TEXT,
    reporting_period TEXT,
    geographic_coverage TEXT,
    government_contact TEXT,
    email TEXT,
    list_url TEXT NOT NULL,
    last_updated TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_datasets_identifier ON datasets(identifier);
CREATE INDEX IF NOT EXISTS idx_datasets_category ON datasets(category);
"#;

/// Columns of `datasets` before the metadata columns
pub const LEADING_COLUMNS: [&str; 5] = ["detail_url", "identifier", "title", "formats", "category"];

/// Columns of `datasets` after the metadata columns
pub const TRAILING_COLUMNS: [&str; 2] = ["list_url", "last_updated"];

/// All `datasets` columns in row order
pub fn dataset_columns() -> Vec<&'static str> {
    let mut columns = LEADING_COLUMNS.to_vec();
    columns.extend(MetadataField::ALL.iter().map(|field| field.column()));
    columns.extend(TRAILING_COLUMNS);
    columns
}

/// Initializes the database schema
///
/// Safe to run on every open; existing tables and rows are kept.
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_initializes() {
        let conn = Connection::open_in_memory().unwrap();
        let result = initialize_schema(&conn);
        assert!(result.is_ok());
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        // Initialize twice
        initialize_schema(&conn).unwrap();
        let result = initialize_schema(&conn);

        assert!(result.is_ok());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for table in ["runs", "datasets"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_dataset_columns_match_table() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        let mut stmt = conn.prepare("PRAGMA table_info(datasets)").unwrap();
        let columns: Vec<String> = stmt
            .query_map([], |row| row.get(1))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(columns, dataset_columns());
    }
}
