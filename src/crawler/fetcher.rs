//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the configured user agent
//! - Bounding requests in flight through the shared [`BackoffCoordinator`]
//! - Retrying transient failures and pausing all requests after one
//! - Error classification

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::crawler::backoff::BackoffCoordinator;
use crate::HarvestError;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub url: String,

    /// Page body content
    pub body: String,
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use catalog_harvester::config::{CrawlerConfig, UserAgentConfig};
/// use catalog_harvester::crawler::build_http_client;
///
/// let client = build_http_client(&UserAgentConfig::default(), &CrawlerConfig::default()).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    crawler: &CrawlerConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(crawler.request_timeout())
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Retried GET requests sharing one [`BackoffCoordinator`]
///
/// Cheap to clone; clones share the client and the coordinator.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    backoff: Arc<BackoffCoordinator>,
    max_attempts: u32,
}

impl Fetcher {
    pub fn new(client: Client, backoff: Arc<BackoffCoordinator>, max_attempts: u32) -> Self {
        Self {
            client,
            backoff,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Builds a fetcher and its coordinator from the crawler configuration
    pub fn from_config(
        user_agent: &UserAgentConfig,
        crawler: &CrawlerConfig,
    ) -> Result<Self, HarvestError> {
        let client = build_http_client(user_agent, crawler)?;
        let backoff = Arc::new(BackoffCoordinator::new(
            crawler.concurrency_limit as usize,
            crawler.cooldown(),
        ));
        Ok(Self::new(client, backoff, crawler.max_attempts))
    }

    /// The coordinator shared by this fetcher's requests
    pub fn backoff(&self) -> &Arc<BackoffCoordinator> {
        &self.backoff
    }

    /// Fetches a URL, retrying transient failures
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 2xx | Return the body |
    /// | HTTP 408, 429, 5xx | Pause all requests, retry |
    /// | Connect / timeout / body errors | Pause all requests, retry |
    /// | Other HTTP status | Fail immediately |
    ///
    /// After `max_attempts` transient failures the last one is wrapped in
    /// [`HarvestError::ExhaustedRetries`]. Failures are fatal for this URL only.
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage, HarvestError> {
        let mut attempt = 1;
        loop {
            tracing::trace!("GET {} (attempt {}/{})", url, attempt, self.max_attempts);

            let result = {
                let _permit = self.backoff.acquire().await?;
                self.get_once(url).await
            };

            match result {
                Ok(page) => return Ok(page),
                Err(e) if is_transient(&e) => {
                    if attempt >= self.max_attempts {
                        return Err(HarvestError::ExhaustedRetries {
                            url: url.to_string(),
                            attempts: attempt,
                            last: Box::new(e),
                        });
                    }
                    tracing::debug!("Transient failure on {}: {}", url, e);
                    self.backoff.report_failure(url, &e).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Issues a single GET and reads the body
    async fn get_once(&self, url: &str) -> Result<FetchedPage, HarvestError> {
        let http_error = |source: reqwest::Error| HarvestError::Http {
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url).send().await.map_err(http_error)?;
        let status = response.status();

        if !status.is_success() {
            return Err(HarvestError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let body = response.text().await.map_err(http_error)?;

        Ok(FetchedPage {
            url: final_url,
            body,
        })
    }
}

/// Whether a status code is worth retrying
pub fn is_retryable_status(status: u16) -> bool {
    status == StatusCode::REQUEST_TIMEOUT.as_u16()
        || status == StatusCode::TOO_MANY_REQUESTS.as_u16()
        || (500..=599).contains(&status)
}

/// Classifies an error as transient (retry after a cooldown) or fatal
pub fn is_transient(error: &HarvestError) -> bool {
    match error {
        HarvestError::Http { source, .. } => {
            source.is_connect()
                || source.is_timeout()
                || source.is_request()
                || source.is_body()
                || source.is_decode()
        }
        HarvestError::Status { status, .. } => is_retryable_status(*status),
        _ => false,
    }
}
