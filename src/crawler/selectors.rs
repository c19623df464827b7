//! CSS selectors describing the catalog's markup
//!
//! Compiled once per crawl and shared by every list and detail task.

use crate::HarvestError;
use scraper::Selector;

/// Section tabs on the index page; their `onclick` holds the section URL
const SECTION_TABS: &str = r#"div[class="AccordionPanelTab"] > a[onclick]"#;

/// Element holding the "N datasets" total on the index page
const DATASET_TOTAL: &str = "span";

/// Element right before the results table on list pages
const RESULTS_ANCHOR: &str = r#"font[class="datasetresults"]"#;

/// Format tags within a list row
const ROW_FORMATS: &str = r#"[class^="format-box"]"#;

/// Category within a list row
const ROW_CATEGORY: &str = r#"[class="datasetcat"]"#;

/// Detail page link within a list row
const ROW_DETAIL_LINK: &str = r#"a[class="datasethead"]"#;

/// Dataset title on detail pages
const DETAIL_TITLE: &str = r#"[class="datasethead"]"#;

/// Bold labels preceding metadata values on detail pages
const LABEL_MARKER: &str = "b";

/// Links scanned for the "next page" text
const TEXT_LINKS: &str = "a[href]";

/// All selectors the crawler queries pages with
#[derive(Debug)]
pub struct SiteSelectors {
    pub section_tabs: Selector,
    pub dataset_total: Selector,
    pub results_anchor: Selector,
    pub row_formats: Selector,
    pub row_category: Selector,
    pub row_detail_link: Selector,
    pub detail_title: Selector,
    pub label_marker: Selector,
    pub text_links: Selector,
}

impl SiteSelectors {
    /// Compiles the catalog selectors
    pub fn new() -> Result<Self, HarvestError> {
        Ok(Self {
            section_tabs: compile(SECTION_TABS)?,
            dataset_total: compile(DATASET_TOTAL)?,
            results_anchor: compile(RESULTS_ANCHOR)?,
            row_formats: compile(ROW_FORMATS)?,
            row_category: compile(ROW_CATEGORY)?,
            row_detail_link: compile(ROW_DETAIL_LINK)?,
            detail_title: compile(DETAIL_TITLE)?,
            label_marker: compile(LABEL_MARKER)?,
            text_links: compile(TEXT_LINKS)?,
        })
    }
}

fn compile(css: &str) -> Result<Selector, HarvestError> {
    Selector::parse(css).map_err(|e| HarvestError::Selector {
        selector: css.to_string(),
        message: e.to_string(),
    })
}
