//! Crawler coordinator - main crawl orchestration logic
//!
//! The crawl has three stages:
//! - The index page yields the section list and the advertised dataset total
//! - Every section's list pages are crawled concurrently
//! - Every row's detail page is fetched concurrently
//!
//! Fan-out happens through [`gather`], which runs one task per item on a
//! `JoinSet` and applies the configured [`FailurePolicy`] to failed items.

use crate::config::Config;
use crate::crawler::{crawl_list, fetch_detail, Catalog, Fetcher};
use crate::record::{Record, RowSummary};
use crate::HarvestError;
use serde::Deserialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use url::Url;

/// Word following the dataset total on the index page
const TOTAL_SUFFIX: &str = "datasets";

/// Prefix of the section tabs' `onclick` handlers
const ONCLICK_PREFIX: &str = "location.href=";

/// What a failed list or detail item does to the rest of the crawl
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Cancel every sibling task and fail the crawl
    #[default]
    Abort,

    /// Log the failure, skip the item, keep going
    Collect,
}

/// Crawl stage a task belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlStage {
    List,
    Detail,
}

impl fmt::Display for CrawlStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List => write!(f, "section"),
            Self::Detail => write!(f, "dataset"),
        }
    }
}

/// An item skipped under [`FailurePolicy::Collect`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlFailure {
    pub stage: CrawlStage,
    /// Section or detail URL of the failed item
    pub target: String,
    pub error: String,
}

/// Outcome of a crawl
#[derive(Debug, Clone, Default)]
pub struct CrawlResult {
    /// Total advertised on the index page, if it could be read
    pub expected_total: Option<u64>,
    pub records: Vec<Record>,
    /// Always empty under [`FailurePolicy::Abort`]
    pub failures: Vec<CrawlFailure>,
}

/// What the index page says about the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogIndex {
    pub expected_total: Option<u64>,
    /// Absolute URLs of the first list page of every section
    pub sections: Vec<String>,
}

/// Reads the section URLs and the dataset total from the index page
///
/// `final_url` is the index URL after redirects; section targets are
/// resolved against it.
pub fn read_index(
    catalog: &Catalog,
    body: &str,
    final_url: &str,
) -> Result<CatalogIndex, HarvestError> {
    let page = catalog.parse(body);

    let total_text = page.first_text_containing(&catalog.selectors.dataset_total, TOTAL_SUFFIX);
    let expected_total = match total_text {
        Some(text) => {
            let digits = text.replace(TOTAL_SUFFIX, "");
            match digits.trim().parse::<u64>() {
                Ok(total) => Some(total),
                Err(_) => {
                    tracing::warn!("Unreadable dataset total '{}' on {}", text.trim(), final_url);
                    None
                }
            }
        }
        None => {
            tracing::warn!("No dataset total on {}", final_url);
            None
        }
    };

    let base = Url::parse(final_url)?;
    let handlers = page.attr_values(&catalog.selectors.section_tabs, "onclick");
    let mut sections = Vec::with_capacity(handlers.len());
    for handler in handlers {
        let target = handler
            .trim()
            .trim_start_matches(ONCLICK_PREFIX)
            .trim_end_matches(';')
            .trim_matches('\'');
        sections.push(base.join(target)?.to_string());
    }

    Ok(CatalogIndex {
        expected_total,
        sections,
    })
}

/// Runs one task per item and waits for all of them
///
/// # Arguments
///
/// * `policy` - What a failed item does to its siblings
/// * `stage` - Stage label used in logs and failure reports
/// * `tasks` - `(target, future)` pairs; the target names the item in errors
///
/// # Returns
///
/// * `Ok((values, failures))` - Values in task order, plus the failures
///   skipped under [`FailurePolicy::Collect`]
/// * `Err(HarvestError::Aggregate)` - First failure under [`FailurePolicy::Abort`];
///   all remaining tasks are cancelled
/// * `Err(HarvestError::Task)` - A task panicked
pub async fn gather<T, F>(
    policy: FailurePolicy,
    stage: CrawlStage,
    tasks: Vec<(String, F)>,
) -> Result<(Vec<T>, Vec<CrawlFailure>), HarvestError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, HarvestError>> + Send + 'static,
{
    let total = tasks.len();
    let mut set = JoinSet::new();
    for (index, (target, task)) in tasks.into_iter().enumerate() {
        set.spawn(async move { (index, target, task.await) });
    }

    let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(total).collect();
    let mut failures = Vec::new();

    while let Some(joined) = set.join_next().await {
        let (index, target, result) = match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                set.abort_all();
                return Err(HarvestError::Task(format!("{} task: {}", stage, e)));
            }
        };

        match result {
            Ok(value) => slots[index] = Some(value),
            Err(e) => match policy {
                FailurePolicy::Abort => {
                    tracing::error!("{} {} failed, cancelling the crawl: {}", stage, target, e);
                    set.abort_all();
                    return Err(HarvestError::Aggregate {
                        target,
                        source: Box::new(e),
                    });
                }
                FailurePolicy::Collect => {
                    tracing::warn!("Skipping {} {}: {}", stage, target, e);
                    failures.push(CrawlFailure {
                        stage,
                        target,
                        error: e.to_string(),
                    });
                }
            },
        }
    }

    Ok((slots.into_iter().flatten().collect(), failures))
}

/// Main crawler coordinator structure
#[derive(Debug)]
pub struct Coordinator {
    fetcher: Fetcher,
    catalog: Arc<Catalog>,
    policy: FailurePolicy,
}

impl Coordinator {
    pub fn new(fetcher: Fetcher, catalog: Catalog, policy: FailurePolicy) -> Self {
        Self {
            fetcher,
            catalog: Arc::new(catalog),
            policy,
        }
    }

    /// Creates a coordinator with its own HTTP client and backoff state
    pub fn from_config(config: &Config) -> Result<Self, HarvestError> {
        let fetcher = Fetcher::from_config(&config.user_agent, &config.crawler)?;
        let catalog = Catalog::from_config(config)?;
        Ok(Self::new(fetcher, catalog, config.crawler.failure_policy))
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// Runs the crawl from the index page down to every detail page
    pub async fn run(&self) -> Result<CrawlResult, HarvestError> {
        let start_time = Instant::now();
        let index_url = self.catalog.base_url.to_string();
        tracing::info!("Starting crawl at {}", index_url);

        let index_page = self.fetcher.fetch(&index_url).await?;
        let index = read_index(&self.catalog, &index_page.body, &index_page.url)?;

        if index.sections.is_empty() {
            tracing::warn!("No sections found on {}", index_page.url);
        }
        tracing::info!(
            "{} sections, {} datasets advertised",
            index.sections.len(),
            index
                .expected_total
                .map_or_else(|| "unknown".to_string(), |total| total.to_string())
        );

        let list_tasks = index
            .sections
            .into_iter()
            .map(|section| {
                let fetcher = self.fetcher.clone();
                let catalog = Arc::clone(&self.catalog);
                let target = section.clone();
                let task = async move { crawl_list(&fetcher, &catalog, &section).await };
                (target, task)
            })
            .collect();
        let (sections, mut failures) = gather(self.policy, CrawlStage::List, list_tasks).await?;

        let rows: Vec<RowSummary> = sections.into_iter().flatten().collect();
        tracing::info!("{} rows listed, fetching details", rows.len());

        let detail_tasks = rows
            .into_iter()
            .map(|row| {
                let fetcher = self.fetcher.clone();
                let catalog = Arc::clone(&self.catalog);
                let target = row.detail_url.clone();
                let task = async move { fetch_detail(&fetcher, &catalog, &row).await };
                (target, task)
            })
            .collect();
        let (records, detail_failures) =
            gather(self.policy, CrawlStage::Detail, detail_tasks).await?;
        failures.extend(detail_failures);

        tracing::info!(
            "Crawl finished: {} records, {} failures, {} cooldown episodes in {:?}",
            records.len(),
            failures.len(),
            self.fetcher.backoff().cooldown_episodes(),
            start_time.elapsed()
        );

        Ok(CrawlResult {
            expected_total: index.expected_total,
            records,
            failures,
        })
    }
}
