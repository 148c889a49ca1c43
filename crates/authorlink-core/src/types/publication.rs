//! Publications and author mentions.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::normalize;

/// One surface occurrence of an author in one publication. Immutable once
/// ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorMention {
    /// Stable mention identifier (`<article_id>#<position>`), the key used
    /// by the evaluator and the results file.
    pub mention_id: String,
    /// Author name as printed on the publication.
    pub name: String,
    /// Validated ORCID, if present on the record.
    pub orcid: Option<String>,
    /// Institution strings attached to this mention.
    pub affiliations: BTreeSet<String>,
    /// 1-based author position on the publication.
    pub position: u32,
}

/// A deduplicated bibliographic record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Publication {
    /// Synthetic stable id (`pub_NNNNNN` in ingest order).
    pub publication_id: String,
    /// Normalized DOI (lowercase, URL prefix stripped), if known.
    pub doi: Option<String>,
    /// Title as received.
    pub title: String,
    /// Deterministic function of `title`: lowercased, punctuation-stripped,
    /// stop-words removed, whitespace collapsed.
    pub normalized_title: String,
    /// Publication year, if known.
    pub year: Option<i32>,
    /// Journal title, if known.
    pub journal: Option<String>,
    /// Author mentions in printed order.
    pub mentions: Vec<AuthorMention>,
}

impl Publication {
    /// Build a publication, normalizing the title and DOI.
    pub fn new(
        publication_id: String,
        doi: Option<&str>,
        title: &str,
        year: Option<i32>,
        journal: Option<String>,
        mentions: Vec<AuthorMention>,
    ) -> Self {
        Self {
            publication_id,
            doi: doi.and_then(normalize::normalize_doi),
            title: title.to_string(),
            normalized_title: normalize::normalize_title(title),
            year,
            journal,
            mentions,
        }
    }

    /// Names of all mentions other than the one at `position`, used as the
    /// co-author name set during comparison.
    pub fn co_mention_names(&self, position: u32) -> Vec<&str> {
        self.mentions
            .iter()
            .filter(|m| m.position != position)
            .map(|m| m.name.as_str())
            .collect()
    }
}
