//! Dataset identifier derivation
//!
//! Detail pages live at `.../<uuid>`. The final path segment is parsed as a
//! UUID, its version and variant bits are normalized to a random (v4) UUID,
//! and it is rendered as 32 lowercase hex digits.

use crate::HarvestError;
use serde::Deserialize;
use url::Url;
use uuid::{Builder, Uuid, Variant, Version};

/// How to treat detail URLs whose last segment is not a UUID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierMode {
    /// Unparsable segments are a markup error for the record
    #[default]
    Strict,
    /// Unparsable segments yield a record without identifier
    Lenient,
    /// Identifiers are never derived
    Off,
}

/// Derives the identifier of the dataset at `detail_url`
///
/// # Returns
///
/// * `Ok(Some(String))` - 32 hex digit identifier
/// * `Ok(None)` - No identifier (mode `Off`, or `Lenient` with a bad segment)
/// * `Err(HarvestError::MalformedMarkup)` - `Strict` mode with a bad segment
pub fn derive_identifier(
    detail_url: &str,
    mode: IdentifierMode,
) -> Result<Option<String>, HarvestError> {
    if mode == IdentifierMode::Off {
        return Ok(None);
    }

    let segment = last_path_segment(detail_url);
    match Uuid::parse_str(&segment) {
        Ok(parsed) => {
            let normalized = Builder::from_bytes(*parsed.as_bytes())
                .with_variant(Variant::RFC4122)
                .with_version(Version::Random)
                .into_uuid();
            Ok(Some(normalized.simple().to_string()))
        }
        Err(e) => match mode {
            IdentifierMode::Lenient => {
                tracing::debug!("No identifier in {}: {}", detail_url, e);
                Ok(None)
            }
            _ => Err(HarvestError::malformed(
                detail_url,
                format!("'{}' is not a dataset identifier: {}", segment, e),
            )),
        },
    }
}

/// Returns the text after the last `/` of the URL path
fn last_path_segment(detail_url: &str) -> String {
    match Url::parse(detail_url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or("")
            .to_string(),
        Err(_) => detail_url
            .split(|c: char| c == '?' || c == '#')
            .next()
            .and_then(|path| path.rsplit('/').next())
            .unwrap_or("")
            .to_string(),
    }
}
