//! Record module for the data extracted from the catalog
//!
//! # Components
//!
//! - `RowSummary`: one row of a section list page
//! - `Record`: the full metadata of one dataset
//! - `MetadataField` / `Metadata`: the fixed, ordered schema of labeled fields
//! - `identifier`: dataset identifier derivation from detail URLs

mod identifier;

pub use identifier::{derive_identifier, IdentifierMode};

/// One line item of a section list page, pointing at a detail page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowSummary {
    /// Format tags joined with `;`, `None` when the row lists none
    pub formats: Option<String>,

    /// Catalog category shown in the row
    pub category: String,

    /// Absolute URL of the dataset's detail page
    pub detail_url: String,

    /// URL of the list page the row was found on
    pub list_url: String,
}

/// The labeled metadata fields of a detail page, in storage order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataField {
    Source,
    Fee,
    ProcessingLevel,
    DateAdded,
    License,
    UpdateFrequency,
    ReportingPeriod,
    GeographicCoverage,
    Contact,
    Email,
}

impl MetadataField {
    /// Number of metadata fields
    pub const COUNT: usize = 10;

    /// All fields in their fixed order
    pub const ALL: [MetadataField; Self::COUNT] = [
        Self::Source,
        Self::Fee,
        Self::ProcessingLevel,
        Self::DateAdded,
        Self::License,
        Self::UpdateFrequency,
        Self::ReportingPeriod,
        Self::GeographicCoverage,
        Self::Contact,
        Self::Email,
    ];

    /// Position of the field within a record
    pub fn index(self) -> usize {
        self as usize
    }

    /// Database column name
    pub fn column(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Fee => "fee",
            Self::ProcessingLevel => "degree_to_which_processed",
            Self::DateAdded => "date_first_added",
            Self::License => "license",
            Self::UpdateFrequency => "update_frequency",
            Self::ReportingPeriod => "reporting_period",
            Self::GeographicCoverage => "geographic_coverage",
            Self::Contact => "government_contact",
            Self::Email => "email",
        }
    }
}

/// Metadata values indexed by [`MetadataField`]
///
/// Absent labels are stored as `None` in their own slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata([Option<String>; MetadataField::COUNT]);

impl Metadata {
    pub fn get(&self, field: MetadataField) -> Option<&str> {
        self.0[field.index()].as_deref()
    }

    pub fn set(&mut self, field: MetadataField, value: Option<String>) {
        self.0[field.index()] = value;
    }

    /// Iterates `(field, value)` pairs in fixed order
    pub fn iter(&self) -> impl Iterator<Item = (MetadataField, Option<&str>)> + '_ {
        MetadataField::ALL
            .iter()
            .map(move |&field| (field, self.get(field)))
    }

    /// Number of fields with a value
    pub fn populated(&self) -> usize {
        self.0.iter().filter(|value| value.is_some()).count()
    }
}

/// The full metadata of one dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Identifier derived from the detail URL, if any
    pub identifier: Option<String>,
    pub title: String,
    pub formats: Option<String>,
    pub category: String,
    pub metadata: Metadata,
    /// Natural key of the record
    pub detail_url: String,
    pub list_url: String,
}
