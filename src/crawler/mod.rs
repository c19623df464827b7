//! Crawler module for catalog fetching and extraction
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retries and a shared cooldown
//! - HTML extraction through a narrow page interface
//! - Section list pagination and detail page extraction
//! - Overall crawl coordination and persistence

mod backoff;
mod catalog;
mod coordinator;
mod detail;
mod fetcher;
mod list;
mod parser;
mod selectors;

pub use backoff::BackoffCoordinator;
pub use catalog::Catalog;
pub use coordinator::{
    gather, read_index, CatalogIndex, Coordinator, CrawlFailure, CrawlResult, CrawlStage,
    FailurePolicy,
};
pub use detail::{extract_record, fetch_detail};
pub use fetcher::{build_http_client, is_retryable_status, is_transient, FetchedPage, Fetcher};
pub use list::{crawl_list, extract_rows, next_page_url};
pub use parser::{Fragment, Page};
pub use selectors::SiteSelectors;

use crate::config::Config;
use crate::storage::{open_storage, RunTotals, Storage};
use crate::HarvestError;
use chrono::Utc;
use std::path::Path;

/// Summary of a finished harvest
#[derive(Debug, Clone)]
pub struct HarvestReport {
    pub run_id: i64,
    /// Total advertised by the catalog, if it could be read
    pub expected_total: Option<u64>,
    /// Records extracted by this run
    pub scraped: usize,
    /// Records in the database afterwards
    pub persisted: u64,
    pub failures: Vec<CrawlFailure>,
}

impl HarvestReport {
    /// Whether the stored count matches the advertised total
    ///
    /// `None` when the catalog did not advertise one.
    pub fn count_matches(&self) -> Option<bool> {
        self.expected_total.map(|expected| expected == self.persisted)
    }
}

/// Runs a complete harvest
///
/// This is the main entry point for starting a harvest. It will:
/// 1. Open the database, creating the schema if needed
/// 2. Record a new run
/// 3. Crawl the catalog
/// 4. Upsert every record with a fresh timestamp
/// 5. Compare the stored count with the advertised total
/// 6. Close the run with its totals
///
/// A failed crawl marks the run failed and persists nothing.
///
/// # Arguments
///
/// * `config` - The harvester configuration
/// * `config_hash` - Hash of the configuration, recorded with the run
///
/// # Returns
///
/// * `Ok(HarvestReport)` - Harvest completed
/// * `Err(HarvestError)` - Harvest failed
pub async fn harvest(config: Config, config_hash: &str) -> Result<HarvestReport, HarvestError> {
    let coordinator = Coordinator::from_config(&config)?;
    let mut storage = open_storage(Path::new(&config.output.database_path))?;
    let run_id = storage.create_run(config_hash)?;
    tracing::info!("Starting run {}", run_id);

    let result = match coordinator.run().await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("Run {} failed: {}", run_id, e);
            mark_run_failed(&mut storage, run_id, &e.to_string());
            return Err(e);
        }
    };

    let timestamp = Utc::now().to_rfc3339();
    if let Err(e) = storage.upsert_records(&result.records, &timestamp) {
        tracing::error!("Run {} failed to persist records: {}", run_id, e);
        mark_run_failed(&mut storage, run_id, &e.to_string());
        return Err(e.into());
    }
    let persisted = storage.count_records()?;

    match result.expected_total {
        Some(expected) if expected != persisted => tracing::warn!(
            "Catalog advertises {} datasets but the database holds {}",
            expected,
            persisted
        ),
        Some(expected) => tracing::info!("All {} advertised datasets stored", expected),
        None => tracing::info!("{} datasets stored, no advertised total to check", persisted),
    }

    storage.complete_run(
        run_id,
        &RunTotals {
            expected_count: result.expected_total,
            persisted_count: persisted,
            failed_items: result.failures.len() as u64,
        },
    )?;

    Ok(HarvestReport {
        run_id,
        expected_total: result.expected_total,
        scraped: result.records.len(),
        persisted,
        failures: result.failures,
    })
}

/// Marks a run failed
///
/// A storage error here is logged, leaving the caller free to return the
/// error that ended the run.
fn mark_run_failed<S: Storage>(storage: &mut S, run_id: i64, error_message: &str) {
    if let Err(e) = storage.fail_run(run_id, error_message) {
        tracing::error!("Could not mark run {} as failed: {}", run_id, e);
    }
}
