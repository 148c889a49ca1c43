//! Article deduplication.
//!
//! Incoming publications pass a DOI check, an exact normalized-title check,
//! and a fuzzy title check (Damerau-Levenshtein ratio) before admission.
//! Admitted publications are never mutated; the second submission of the
//! same article changes nothing (P7).

use std::collections::BTreeMap;

use tracing::debug;

use crate::types::Publication;

/// Why a publication was judged a duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateReason {
    /// Same normalized DOI.
    Doi,
    /// Same normalized title.
    TitleExact,
    /// Normalized-title similarity at or above the threshold.
    TitleFuzzy,
}

/// Result of a dedup check.
#[derive(Debug, Clone, PartialEq)]
pub enum DedupOutcome {
    /// Not seen before; safe to admit.
    Admit,
    /// Duplicate of an already-admitted publication.
    Duplicate {
        /// The admitted publication this one duplicates.
        existing_id: String,
        /// Which check fired.
        reason: DuplicateReason,
        /// Title similarity, for the fuzzy case.
        similarity: Option<f64>,
    },
}

/// DOI + normalized-title dedup index over admitted publications.
#[derive(Debug)]
pub struct Deduplicator {
    title_threshold: f64,
    by_doi: BTreeMap<String, String>,
    by_normalized_title: BTreeMap<String, String>,
}

impl Deduplicator {
    /// Build with the given fuzzy-title threshold (default 0.95).
    pub fn new(title_threshold: f64) -> Self {
        Self {
            title_threshold,
            by_doi: BTreeMap::new(),
            by_normalized_title: BTreeMap::new(),
        }
    }

    /// Check a publication against the admitted set without mutating it.
    ///
    /// Order: DOI, exact title, fuzzy title. The fuzzy scan walks titles in
    /// sorted key order and returns the first hit, so results do not depend
    /// on insertion history.
    pub fn check(&self, publication: &Publication) -> DedupOutcome {
        if let Some(doi) = &publication.doi {
            if let Some(existing_id) = self.by_doi.get(doi) {
                debug!(doi = %doi, existing = %existing_id, "duplicate by DOI");
                return DedupOutcome::Duplicate {
                    existing_id: existing_id.clone(),
                    reason: DuplicateReason::Doi,
                    similarity: None,
                };
            }
        }

        let title = &publication.normalized_title;
        if !title.is_empty() {
            if let Some(existing_id) = self.by_normalized_title.get(title) {
                debug!(existing = %existing_id, "duplicate by exact title");
                return DedupOutcome::Duplicate {
                    existing_id: existing_id.clone(),
                    reason: DuplicateReason::TitleExact,
                    similarity: None,
                };
            }
            for (existing_title, existing_id) in &self.by_normalized_title {
                let similarity = strsim::normalized_damerau_levenshtein(title, existing_title);
                if similarity >= self.title_threshold {
                    debug!(
                        existing = %existing_id,
                        similarity,
                        "duplicate by fuzzy title"
                    );
                    return DedupOutcome::Duplicate {
                        existing_id: existing_id.clone(),
                        reason: DuplicateReason::TitleFuzzy,
                        similarity: Some(similarity),
                    };
                }
            }
        }

        DedupOutcome::Admit
    }

    /// Record an admitted publication in both maps. The title map is only
    /// populated for non-empty normalized titles.
    pub fn admit(&mut self, publication: &Publication) {
        if let Some(doi) = &publication.doi {
            self.by_doi
                .insert(doi.clone(), publication.publication_id.clone());
        }
        if !publication.normalized_title.is_empty() {
            self.by_normalized_title.insert(
                publication.normalized_title.clone(),
                publication.publication_id.clone(),
            );
        }
    }

    /// Number of admitted publications indexed by DOI.
    pub fn doi_count(&self) -> usize {
        self.by_doi.len()
    }

    /// Number of admitted publications indexed by title.
    pub fn title_count(&self) -> usize {
        self.by_normalized_title.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publication(id: &str, doi: Option<&str>, title: &str) -> Publication {
        Publication::new(id.to_string(), doi, title, None, None, vec![])
    }

    #[test]
    fn doi_dedup_is_case_insensitive() {
        let mut dedup = Deduplicator::new(0.95);
        let p1 = publication("pub_000001", Some("10.1038/x"), "First Title");
        assert_eq!(dedup.check(&p1), DedupOutcome::Admit);
        dedup.admit(&p1);

        let p2 = publication("pub_000002", Some("10.1038/X"), "Other Title");
        match dedup.check(&p2) {
            DedupOutcome::Duplicate {
                existing_id,
                reason,
                ..
            } => {
                assert_eq!(existing_id, "pub_000001");
                assert_eq!(reason, DuplicateReason::Doi);
            }
            other => panic!("expected duplicate, got {other:?}"),
        }
    }

    #[test]
    fn exact_title_dedup_ignores_stopwords_and_case() {
        let mut dedup = Deduplicator::new(0.95);
        let p1 = publication("pub_000001", None, "The Genome of the Sea Urchin");
        dedup.admit(&p1);

        let p2 = publication("pub_000002", Some("10.1/a"), "Genome of Sea Urchin");
        match dedup.check(&p2) {
            DedupOutcome::Duplicate { reason, .. } => {
                assert_eq!(reason, DuplicateReason::TitleExact)
            }
            other => panic!("expected duplicate, got {other:?}"),
        }
    }

    #[test]
    fn fuzzy_title_dedup_reports_similarity() {
        let mut dedup = Deduplicator::new(0.90);
        let p1 = publication("pub_000001", None, "Machine Learning in Bioinformatics");
        dedup.admit(&p1);

        let p2 = publication("pub_000002", None, "Machine Learning in Bioinformatic");
        match dedup.check(&p2) {
            DedupOutcome::Duplicate {
                reason, similarity, ..
            } => {
                assert_eq!(reason, DuplicateReason::TitleFuzzy);
                assert!(similarity.unwrap() >= 0.90);
            }
            other => panic!("expected duplicate, got {other:?}"),
        }
    }

    #[test]
    fn distinct_articles_admit() {
        let mut dedup = Deduplicator::new(0.95);
        dedup.admit(&publication("pub_000001", Some("10.1/a"), "Protein Folding"));
        let p = publication(
            "pub_000002",
            Some("10.1/b"),
            "Completely Different Research Topic",
        );
        assert_eq!(dedup.check(&p), DedupOutcome::Admit);
    }

    #[test]
    fn readmission_is_idempotent() {
        let mut dedup = Deduplicator::new(0.95);
        let p = publication("pub_000001", Some("10.1038/x"), "A Title");
        dedup.admit(&p);
        let (doi_count, title_count) = (dedup.doi_count(), dedup.title_count());

        // Second check must report the duplicate and leave indices unchanged.
        assert!(matches!(dedup.check(&p), DedupOutcome::Duplicate { .. }));
        assert_eq!(dedup.doi_count(), doi_count);
        assert_eq!(dedup.title_count(), title_count);
    }

    #[test]
    fn untitled_publication_only_indexes_doi() {
        let mut dedup = Deduplicator::new(0.95);
        let p = publication("pub_000001", Some("10.1/a"), "");
        dedup.admit(&p);
        assert_eq!(dedup.doi_count(), 1);
        assert_eq!(dedup.title_count(), 0);
    }
}
