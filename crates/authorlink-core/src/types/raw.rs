//! Raw ingest records.
//!
//! The shape produced by the Crossref author dump: one row per author
//! mention, keyed by `article_id`. Validation happens at this boundary so
//! that everything past it carries only well-formed data.

use serde::{Deserialize, Serialize};

/// One row of the `crossref_authors` input file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMentionRecord {
    /// Article the mention appears on; rows sharing an `article_id` form
    /// one publication.
    pub article_id: String,
    /// Author name as printed.
    #[serde(default)]
    pub original_name: String,
    /// Family name, when the source split it out.
    #[serde(default)]
    pub lastname: Option<String>,
    /// Given name, when the source split it out.
    #[serde(default)]
    pub firstname: Option<String>,
    /// ORCID as supplied (possibly a URL form, possibly invalid).
    #[serde(default)]
    pub orcid: Option<String>,
    /// Affiliation string, when present.
    #[serde(default)]
    pub affiliation: Option<String>,
    /// Journal title, when present.
    #[serde(default)]
    pub journal: Option<String>,
    /// Article title, when present.
    #[serde(default)]
    pub title: Option<String>,
    /// Publication year, when present.
    #[serde(default)]
    pub year: Option<i32>,
}

impl RawMentionRecord {
    /// The best available display name: `original_name`, or the joined
    /// given/family names when the source only provided the split form.
    pub fn display_name(&self) -> String {
        if !self.original_name.trim().is_empty() {
            return self.original_name.trim().to_string();
        }
        let given = self.firstname.as_deref().unwrap_or("").trim();
        let family = self.lastname.as_deref().unwrap_or("").trim();
        [given, family]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ")
    }
}
