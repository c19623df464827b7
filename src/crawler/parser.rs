//! HTML page extraction
//!
//! A [`Page`] wraps a parsed document and answers the few structural queries
//! the crawler needs: text at a position, label-adjacent text, link targets.
//! Link targets are always returned as absolute URLs resolved against the
//! site's base URL. Catalog pages sometimes carry an XML declaration in front
//! of the HTML; it is stripped before parsing.
//!
//! `scraper::Html` is not `Send`, so pages are parsed and queried inside
//! synchronous helpers and never held across an `.await`.

use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Declaration some catalog pages put in front of their HTML
const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// A parsed HTML page
pub struct Page<'b> {
    document: Html,
    base: &'b Url,
}

impl<'b> Page<'b> {
    /// Parses raw HTML
    ///
    /// Parsing never fails: malformed markup is recovered the way browsers
    /// do, and broken structural assumptions are reported by the callers.
    ///
    /// # Example
    ///
    /// ```
    /// use catalog_harvester::crawler::Page;
    /// use scraper::Selector;
    /// use url::Url;
    ///
    /// let base = Url::parse("http://www.data.gov.cy/").unwrap();
    /// let bold = Selector::parse("b").unwrap();
    /// let page = Page::parse(r#"<p><b>Fee:</b> Free</p>"#, &base);
    /// assert_eq!(page.label_value(&bold, "Fee:"), Some("Free".to_string()));
    /// ```
    pub fn parse(raw: &str, base: &'b Url) -> Self {
        let trimmed = raw.trim_start();
        let html = trimmed.strip_prefix(XML_DECLARATION).unwrap_or(raw);

        Self {
            document: Html::parse_document(html),
            base,
        }
    }

    /// Trimmed text of the first element matching `selector`, empty if none
    pub fn text_at(&self, selector: &Selector) -> String {
        self.document
            .select(selector)
            .next()
            .map(element_text)
            .unwrap_or_default()
    }

    /// Value following a label element
    ///
    /// Finds the first `marker` match (the catalog uses `<b>`) whose own
    /// text is exactly `label` and returns the text of its parent with the
    /// label removed.
    ///
    /// # Returns
    ///
    /// * `Some(String)` - Trimmed, non-empty value
    /// * `None` - No such label, or nothing next to it
    pub fn label_value(&self, marker: &Selector, label: &str) -> Option<String> {
        let label_element = self.document.select(marker).find(|element| {
            element
                .children()
                .filter_map(|child| child.value().as_text())
                .any(|text| &**text == label)
        })?;

        let parent = label_element.parent().and_then(ElementRef::wrap)?;
        let value = parent
            .text()
            .collect::<String>()
            .replace(label, "")
            .trim()
            .to_string();

        Some(value).filter(|v| !v.is_empty())
    }

    /// Absolute `href` targets of all elements matching `selector`
    pub fn links(&self, selector: &Selector) -> Vec<String> {
        self.document
            .select(selector)
            .filter_map(|element| element.value().attr("href"))
            .map(|href| resolve_link(href, self.base))
            .collect()
    }

    /// Raw values of `attr` on all elements matching `selector`
    pub fn attr_values(&self, selector: &Selector, attr: &str) -> Vec<String> {
        self.document
            .select(selector)
            .filter_map(|element| element.value().attr(attr))
            .map(str::to_string)
            .collect()
    }

    /// Absolute targets of `links` matches whose text contains `needle`
    pub fn links_with_text(&self, links: &Selector, needle: &str) -> Vec<String> {
        self.document
            .select(links)
            .filter(|element| element.text().collect::<String>().contains(needle))
            .filter_map(|element| element.value().attr("href"))
            .map(|href| resolve_link(href, self.base))
            .collect()
    }

    /// Text of the first element matching `selector` that contains `needle`
    pub fn first_text_containing(&self, selector: &Selector, needle: &str) -> Option<String> {
        self.document
            .select(selector)
            .map(|element| element.text().collect::<String>())
            .find(|text| text.contains(needle))
    }

    /// Data rows of the first table following the first `anchor` element
    ///
    /// The table's first row is a header and is skipped. Rows placed in an
    /// implied `<tbody>` by the HTML parser are included.
    pub fn table_rows_after(&self, anchor: &Selector) -> Vec<Fragment<'_>> {
        let Some(anchor) = self.document.select(anchor).next() else {
            return Vec::new();
        };

        let Some(table) = anchor
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .find(|sibling| sibling.value().name() == "table")
        else {
            return Vec::new();
        };

        let mut rows = Vec::new();
        for child in table.children().filter_map(ElementRef::wrap) {
            match child.value().name() {
                "tr" => rows.push(child),
                "thead" | "tbody" | "tfoot" => rows.extend(
                    child
                        .children()
                        .filter_map(ElementRef::wrap)
                        .filter(|row| row.value().name() == "tr"),
                ),
                _ => {}
            }
        }

        rows.into_iter()
            .skip(1)
            .map(|element| Fragment {
                element,
                base: self.base,
            })
            .collect()
    }
}

/// A part of a [`Page`], such as one table row
pub struct Fragment<'a> {
    element: ElementRef<'a>,
    base: &'a Url,
}

impl Fragment<'_> {
    /// Trimmed text of the first descendant matching `selector`, empty if none
    pub fn text_at(&self, selector: &Selector) -> String {
        self.element
            .select(selector)
            .next()
            .map(element_text)
            .unwrap_or_default()
    }

    /// Trimmed, non-empty texts of all descendants matching `selector`
    pub fn texts(&self, selector: &Selector) -> Vec<String> {
        self.element
            .select(selector)
            .map(element_text)
            .filter(|text| !text.is_empty())
            .collect()
    }

    /// Absolute target of the first descendant link matching `selector`
    pub fn link(&self, selector: &Selector) -> Option<String> {
        self.element
            .select(selector)
            .find_map(|element| element.value().attr("href"))
            .map(|href| resolve_link(href, self.base))
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Resolves an href against the base URL
///
/// Unresolvable hrefs are returned as written.
fn resolve_link(href: &str, base: &Url) -> String {
    let href = href.trim();
    base.join(href)
        .map(|absolute| absolute.to_string())
        .unwrap_or_else(|_| href.to_string())
}
