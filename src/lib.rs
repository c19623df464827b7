//! Catalog-Harvester: a dataset catalog scraper
//!
//! This crate crawls a paginated, multi-section open data catalog, extracts
//! dataset metadata from list and detail pages, and stores it idempotently
//! in SQLite.

pub mod config;
pub mod crawler;
pub mod record;
pub mod storage;

use thiserror::Error;

/// Main error type for Catalog-Harvester operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Giving up on {url} after {attempts} attempts: {last}")]
    ExhaustedRetries {
        url: String,
        attempts: u32,
        #[source]
        last: Box<HarvestError>,
    },

    #[error("Malformed markup at {url}: {message}")]
    MalformedMarkup { url: String, message: String },

    #[error("Crawl aborted by failure on {target}: {source}")]
    Aggregate {
        target: String,
        #[source]
        source: Box<HarvestError>,
    },

    #[error("Crawl task failed: {0}")]
    Task(String),

    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

impl HarvestError {
    /// Builds a [`HarvestError::MalformedMarkup`] for the given page
    pub fn malformed(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedMarkup {
            url: url.into(),
            message: message.into(),
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Catalog-Harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{harvest, CrawlResult, FailurePolicy, HarvestReport};
pub use record::{MetadataField, Record, RowSummary};
