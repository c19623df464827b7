use crate::crawler::FailurePolicy;
use crate::record::{IdentifierMode, MetadataField};
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Catalog-Harvester
///
/// Every section is optional; omitted keys take the defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub site: SiteConfig,
    pub labels: LabelConfig,
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Maximum number of requests in flight across the whole crawl
    pub concurrency_limit: u32,

    /// Attempts per URL before giving up
    pub max_attempts: u32,

    /// Pause applied to all requests after a transient failure (milliseconds)
    pub cooldown_ms: u64,

    /// Per-request timeout (seconds)
    pub request_timeout_secs: u64,

    /// What a failed list or detail fetch does to the rest of the crawl
    pub failure_policy: FailurePolicy,

    /// How dataset identifiers are derived from detail URLs
    pub identifier: IdentifierMode,
}

impl CrawlerConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 8,
            max_attempts: 3,
            cooldown_ms: 5000,
            request_timeout_secs: 30,
            failure_policy: FailurePolicy::default(),
            identifier: IdentifierMode::default(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UserAgentConfig {
    /// Name of the crawler
    pub crawler_name: String,

    /// Version of the crawler
    pub crawler_version: String,
}

impl UserAgentConfig {
    /// Formats the `User-Agent` header value
    pub fn header_value(&self) -> String {
        format!("{}/{}", self.crawler_name, self.crawler_version)
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: env!("CARGO_PKG_NAME").to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Description of the catalog site
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SiteConfig {
    /// Index page, also the base for relative links
    pub base_url: String,

    /// Text of the "next page" link on list pages
    pub next_label: String,

    /// Server warning that injects an extra column into list tables
    pub warning_marker: String,

    /// Query parameter that suppresses the warning column
    pub suppress_param: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://www.data.gov.cy/".to_string(),
            next_label: "Επόμενη".to_string(),
            warning_marker: "[Replication or Save Conflict]".to_string(),
            suppress_param: "Collapse=".to_string(),
        }
    }
}

/// Label text preceding each metadata value on detail pages
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LabelConfig {
    pub source: String,
    pub fee: String,
    pub processing_level: String,
    pub date_added: String,
    pub license: String,
    pub update_frequency: String,
    pub reporting_period: String,
    pub geographic_coverage: String,
    pub contact: String,
    pub email: String,
}

impl LabelConfig {
    /// Label text for one field
    pub fn label(&self, field: MetadataField) -> &str {
        match field {
            MetadataField::Source => &self.source,
            MetadataField::Fee => &self.fee,
            MetadataField::ProcessingLevel => &self.processing_level,
            MetadataField::DateAdded => &self.date_added,
            MetadataField::License => &self.license,
            MetadataField::UpdateFrequency => &self.update_frequency,
            MetadataField::ReportingPeriod => &self.reporting_period,
            MetadataField::GeographicCoverage => &self.geographic_coverage,
            MetadataField::Contact => &self.contact,
            MetadataField::Email => &self.email,
        }
    }

    /// The `(field, label)` table in fixed field order
    pub fn table(&self) -> [(MetadataField, &str); MetadataField::COUNT] {
        MetadataField::ALL.map(|field| (field, self.label(field)))
    }
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            source: "Πηγή Ενημέρωσης:".to_string(),
            fee: "Χρέωση:".to_string(),
            processing_level: "Επίπεδο Επεξεργασίας:".to_string(),
            date_added: "Προστέθηκε στο data.gov.cy:".to_string(),
            license: "Άδεια Χρήσης:".to_string(),
            update_frequency: "Συχνότητα Επικαιροποίησης:".to_string(),
            reporting_period: "Περίοδος Αναφοράς:".to_string(),
            geographic_coverage: "Γεωγραφική Κάλυψη:".to_string(),
            contact: "Σύνδεσμος Επικοινωνίας:".to_string(),
            email: "e-mail:".to_string(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite database file
    pub database_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "data.sqlite".to_string(),
        }
    }
}
