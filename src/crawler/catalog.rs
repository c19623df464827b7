//! The catalog being crawled and its extraction rules

use crate::config::{Config, LabelConfig, SiteConfig};
use crate::crawler::selectors::SiteSelectors;
use crate::crawler::Page;
use crate::record::IdentifierMode;
use crate::HarvestError;
use url::Url;

/// Everything needed to read catalog pages, independent of the network
#[derive(Debug)]
pub struct Catalog {
    /// Index page and base for relative links
    pub base_url: Url,
    pub site: SiteConfig,
    pub labels: LabelConfig,
    pub identifier_mode: IdentifierMode,
    pub selectors: SiteSelectors,
}

impl Catalog {
    pub fn from_config(config: &Config) -> Result<Self, HarvestError> {
        Ok(Self {
            base_url: Url::parse(&config.site.base_url)?,
            site: config.site.clone(),
            labels: config.labels.clone(),
            identifier_mode: config.crawler.identifier,
            selectors: SiteSelectors::new()?,
        })
    }

    /// Parses a page of this catalog
    pub fn parse<'c>(&'c self, raw: &str) -> Page<'c> {
        Page::parse(raw, &self.base_url)
    }

    /// URL of a list page with the warning column suppressed
    pub fn suppressed_url(&self, list_url: &str) -> String {
        let separator = if list_url.contains('?') { '&' } else { '?' };
        format!("{}{}{}", list_url, separator, self.site.suppress_param)
    }
}
