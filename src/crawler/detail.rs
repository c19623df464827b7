//! Dataset detail pages

use crate::crawler::{Catalog, Fetcher};
use crate::record::{derive_identifier, Metadata, Record, RowSummary};
use crate::HarvestError;

/// Fetches the detail page of a list row and extracts its [`Record`]
pub async fn fetch_detail(
    fetcher: &Fetcher,
    catalog: &Catalog,
    row: &RowSummary,
) -> Result<Record, HarvestError> {
    let page = fetcher.fetch(&row.detail_url).await?;
    let record = extract_record(catalog, &page.body, row)?;

    tracing::debug!(
        "{}: {} of {} labels present",
        row.detail_url,
        record.metadata.populated(),
        crate::record::MetadataField::COUNT
    );
    Ok(record)
}

/// Builds a record from a detail page body and the row that pointed at it
///
/// Labels missing from the page leave their slot empty; positions of the
/// other fields are unaffected.
pub fn extract_record(
    catalog: &Catalog,
    body: &str,
    row: &RowSummary,
) -> Result<Record, HarvestError> {
    let identifier = derive_identifier(&row.detail_url, catalog.identifier_mode)?;

    let page = catalog.parse(body);
    let title = page.text_at(&catalog.selectors.detail_title);

    let mut metadata = Metadata::default();
    for (field, label) in catalog.labels.table() {
        metadata.set(field, page.label_value(&catalog.selectors.label_marker, label));
    }

    Ok(Record {
        identifier,
        title,
        formats: row.formats.clone(),
        category: row.category.clone(),
        metadata,
        detail_url: row.detail_url.clone(),
        list_url: row.list_url.clone(),
    })
}
