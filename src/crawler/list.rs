//! Section list crawling
//!
//! A section is a paginated table of datasets. Pages are fetched strictly in
//! order, since each page's URL is only known from the previous one.

use crate::crawler::{Catalog, Fetcher};
use crate::record::RowSummary;
use crate::HarvestError;
use std::collections::HashSet;

/// Crawls all pages of one section
///
/// # Algorithm
///
/// 1. Fetch the current page
/// 2. Find the "next page" link in it (none, or exactly one)
/// 3. If the page carries the server's warning marker, fetch it again with
///    the suppression parameter and read rows from that copy; the copy's
///    pagination links are broken, so step 2 always uses the original
/// 4. Append the page's rows and continue with the next page, if any
///
/// # Returns
///
/// * `Ok(Vec<RowSummary>)` - Rows of every page, in crawl order
/// * `Err(HarvestError)` - A fetch failed, or the markup broke an assumption
pub async fn crawl_list(
    fetcher: &Fetcher,
    catalog: &Catalog,
    start_url: &str,
) -> Result<Vec<RowSummary>, HarvestError> {
    let mut rows = Vec::new();
    let mut visited = HashSet::new();
    let mut url = start_url.to_string();

    loop {
        visited.insert(url.clone());

        let page = fetcher.fetch(&url).await?;
        let next = next_page_url(catalog, &page.body, &url)?;

        let page_rows = if page.body.contains(&catalog.site.warning_marker) {
            tracing::info!(
                "'{}' in {}, fetching it again without the warning column",
                catalog.site.warning_marker,
                url
            );
            let suppressed = fetcher.fetch(&catalog.suppressed_url(&url)).await?;
            extract_rows(catalog, &suppressed.body, &url)?
        } else {
            extract_rows(catalog, &page.body, &url)?
        };

        tracing::debug!("{} rows on {}", page_rows.len(), url);
        rows.extend(page_rows);

        match next {
            Some(next) if visited.contains(&next) => {
                return Err(HarvestError::malformed(
                    url,
                    format!("pagination loops back to {}", next),
                ));
            }
            Some(next) => url = next,
            None => break,
        }
    }

    tracing::info!("Section {}: {} rows", start_url, rows.len());
    Ok(rows)
}

/// Finds the "next page" link of a list page
///
/// # Returns
///
/// * `Ok(Some(url))` - Exactly one next link
/// * `Ok(None)` - Last page
/// * `Err(HarvestError::MalformedMarkup)` - More than one next link
pub fn next_page_url(
    catalog: &Catalog,
    body: &str,
    url: &str,
) -> Result<Option<String>, HarvestError> {
    let page = catalog.parse(body);
    let mut links = page.links_with_text(
        &catalog.selectors.text_links,
        &catalog.site.next_label,
    );

    match links.len() {
        0 => Ok(None),
        1 => Ok(links.pop()),
        n => Err(HarvestError::malformed(
            url,
            format!("{} '{}' links", n, catalog.site.next_label),
        )),
    }
}

/// Extracts one [`RowSummary`] per data row of a list page
pub fn extract_rows(
    catalog: &Catalog,
    body: &str,
    list_url: &str,
) -> Result<Vec<RowSummary>, HarvestError> {
    let selectors = &catalog.selectors;
    let page = catalog.parse(body);
    let table_rows = page.table_rows_after(&selectors.results_anchor);

    let rows: Result<Vec<RowSummary>, HarvestError> = table_rows
        .iter()
        .enumerate()
        .map(|(index, row)| {
            let formats = row.texts(&selectors.row_formats);
            let detail_url = row.link(&selectors.row_detail_link).ok_or_else(|| {
                HarvestError::malformed(list_url, format!("row {} has no dataset link", index + 1))
            })?;

            Ok(RowSummary {
                formats: (!formats.is_empty()).then(|| formats.join(";")),
                category: row.text_at(&selectors.row_category),
                detail_url,
                list_url: list_url.to_string(),
            })
        })
        .collect();
    rows
}
