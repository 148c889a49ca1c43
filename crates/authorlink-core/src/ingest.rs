//! Ingest boundary: raw mention rows -> validated publications.
//!
//! Rows sharing an `article_id` form one publication, in first-appearance
//! order. All data-quality filtering happens here so that everything past
//! this boundary is well-formed: a mention with an empty name is dropped
//! and counted; an invalid ORCID is stripped from its mention (the mention
//! survives) and counted. Downstream code never sees either defect.

use std::collections::BTreeMap;

use tracing::warn;

use crate::error::DataQualityError;
use crate::normalize;
use crate::types::{AuthorMention, Publication, RawMentionRecord};

/// One grouped, not-yet-validated publication.
#[derive(Debug, Clone)]
pub struct RawPublication {
    /// Source article id.
    pub article_id: String,
    /// Synthetic id assigned in ingest order (`pub_NNNNNN`).
    pub publication_id: String,
    /// DOI assigned from the dois work list, if any.
    pub doi: Option<String>,
    /// Member rows, in file order.
    pub rows: Vec<RawMentionRecord>,
}

/// Per-publication data-quality tallies, aggregated into the manifest.
#[derive(Debug, Default, Clone)]
pub struct QualityCounts {
    counts: BTreeMap<String, usize>,
}

impl QualityCounts {
    /// Record a data-quality defect: logged as a warning, tallied under its
    /// counter key. Non-fatal by policy.
    pub fn record(&mut self, defect: DataQualityError) {
        warn!(%defect, "data-quality defect");
        self.bump(defect.key());
    }

    /// Bump a named defect counter.
    pub fn bump(&mut self, key: &str) {
        *self.counts.entry(key.to_string()).or_insert(0) += 1;
    }

    /// Merge another tally into this one.
    pub fn merge(&mut self, other: &QualityCounts) {
        for (key, count) in &other.counts {
            *self.counts.entry(key.clone()).or_insert(0) += count;
        }
    }

    /// Total defects recorded.
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// The underlying counters.
    pub fn into_map(self) -> BTreeMap<String, usize> {
        self.counts
    }

    /// Count for one defect kind.
    pub fn get(&self, key: &str) -> usize {
        self.counts.get(key).copied().unwrap_or(0)
    }
}

/// Result of grouping the raw corpus.
#[derive(Debug)]
pub struct GroupedCorpus {
    /// Publications in ingest order, DOIs attached.
    pub publications: Vec<RawPublication>,
    /// Valid DOIs from the work list that matched no publication: the
    /// upstream fetch never produced an article for them.
    pub failed_dois: Vec<String>,
    /// Defects found in the dois work list.
    pub quality: QualityCounts,
}

/// Group raw rows into publications (first-appearance order of
/// `article_id`), apply the ingest `limit`, and assign DOIs positionally
/// from the work list.
pub fn group_records(
    records: Vec<RawMentionRecord>,
    dois: &[String],
    limit: Option<usize>,
) -> GroupedCorpus {
    let mut order: Vec<String> = Vec::new();
    let mut grouped: BTreeMap<String, Vec<RawMentionRecord>> = BTreeMap::new();
    for record in records {
        if !grouped.contains_key(&record.article_id) {
            order.push(record.article_id.clone());
        }
        grouped
            .entry(record.article_id.clone())
            .or_default()
            .push(record);
    }
    if let Some(limit) = limit {
        order.truncate(limit);
    }

    let mut quality = QualityCounts::default();
    let normalized_dois: Vec<String> = dois
        .iter()
        .filter(|d| !d.trim().is_empty())
        .filter_map(|d| match normalize::normalize_doi(d) {
            Some(doi) => Some(doi),
            None => {
                quality.record(DataQualityError::MalformedDoi(d.clone()));
                None
            }
        })
        .collect();

    let mut publications = Vec::with_capacity(order.len());
    for (idx, article_id) in order.iter().enumerate() {
        publications.push(RawPublication {
            article_id: article_id.clone(),
            publication_id: format!("pub_{:06}", idx + 1),
            doi: normalized_dois.get(idx).cloned(),
            rows: grouped.remove(article_id).unwrap_or_default(),
        });
    }
    let failed_dois = normalized_dois
        .get(publications.len()..)
        .unwrap_or_default()
        .to_vec();

    GroupedCorpus {
        publications,
        failed_dois,
        quality,
    }
}

/// A validated publication plus the defects found while building it.
#[derive(Debug)]
pub struct BuiltPublication {
    /// The validated publication.
    pub publication: Publication,
    /// Mentions dropped for data-quality defects.
    pub mentions_skipped: usize,
    /// Defect tallies.
    pub quality: QualityCounts,
}

/// Validate and build one publication. Pure; runs on the worker pool.
pub fn build_publication(raw: &RawPublication) -> BuiltPublication {
    let mut quality = QualityCounts::default();
    let mut mentions_skipped = 0usize;
    let mut mentions = Vec::with_capacity(raw.rows.len());

    let title = raw
        .rows
        .iter()
        .find_map(|r| r.title.as_deref())
        .unwrap_or("");
    let journal = raw.rows.iter().find_map(|r| r.journal.clone());
    let year = raw.rows.iter().find_map(|r| r.year);

    let mut position = 0u32;
    for row in &raw.rows {
        let name = row.display_name();
        if normalize::normalize_text(&name).is_empty() {
            quality.record(DataQualityError::EmptyName {
                article_id: raw.article_id.clone(),
            });
            mentions_skipped += 1;
            continue;
        }
        position += 1;

        let orcid = match row.orcid.as_deref().filter(|o| !o.trim().is_empty()) {
            Some(raw_orcid) => match normalize::normalize_orcid(raw_orcid) {
                Some(valid) => Some(valid),
                None => {
                    // Invalid ORCIDs never fail a decision; the identifier
                    // is dropped and the mention kept.
                    quality.record(DataQualityError::InvalidOrcid(raw_orcid.to_string()));
                    None
                }
            },
            None => None,
        };

        let affiliations = row
            .affiliation
            .iter()
            .filter(|a| !a.trim().is_empty())
            .map(|a| a.trim().to_string())
            .collect();

        mentions.push(AuthorMention {
            mention_id: format!("{}#{}", raw.article_id, position),
            name,
            orcid,
            affiliations,
            position,
        });
    }

    BuiltPublication {
        publication: Publication::new(
            raw.publication_id.clone(),
            raw.doi.as_deref(),
            title,
            year,
            journal,
            mentions,
        ),
        mentions_skipped,
        quality,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(article: &str, name: &str, orcid: Option<&str>) -> RawMentionRecord {
        RawMentionRecord {
            article_id: article.to_string(),
            original_name: name.to_string(),
            lastname: None,
            firstname: None,
            orcid: orcid.map(str::to_string),
            affiliation: None,
            journal: None,
            title: None,
            year: None,
        }
    }

    #[test]
    fn grouping_preserves_first_appearance_order() {
        let records = vec![
            row("B", "Alice", None),
            row("A", "Bob", None),
            row("B", "Carol", None),
        ];
        let corpus = group_records(records, &[], None);
        assert_eq!(corpus.publications.len(), 2);
        assert_eq!(corpus.publications[0].article_id, "B");
        assert_eq!(corpus.publications[0].rows.len(), 2);
        assert_eq!(corpus.publications[1].article_id, "A");
        assert_eq!(corpus.publications[0].publication_id, "pub_000001");
    }

    #[test]
    fn dois_assigned_positionally_with_leftovers_failed() {
        let records = vec![row("A", "Alice", None), row("B", "Bob", None)];
        let dois = vec![
            "https://doi.org/10.1/A".to_string(),
            "".to_string(),
            "10.2/b".to_string(),
            "10.3/c".to_string(),
        ];
        let corpus = group_records(records, &dois, None);
        assert_eq!(corpus.publications[0].doi.as_deref(), Some("10.1/a"));
        assert_eq!(corpus.publications[1].doi.as_deref(), Some("10.2/b"));
        assert_eq!(corpus.failed_dois, vec!["10.3/c"]);
    }

    #[test]
    fn limit_truncates_publications() {
        let records = vec![
            row("A", "Alice", None),
            row("B", "Bob", None),
            row("C", "Carol", None),
        ];
        let corpus = group_records(records, &[], Some(2));
        assert_eq!(corpus.publications.len(), 2);
    }

    #[test]
    fn empty_names_dropped_invalid_orcids_stripped() {
        let raw = RawPublication {
            article_id: "A1".into(),
            publication_id: "pub_000001".into(),
            doi: None,
            rows: vec![
                row("A1", "John Smith", Some("not-an-orcid")),
                row("A1", "   ", None),
                row("A1", "Maria Garcia", Some("0000-0001-2345-6789")),
            ],
        };
        let built = build_publication(&raw);
        assert_eq!(built.publication.mentions.len(), 2);
        assert_eq!(built.mentions_skipped, 1);
        assert_eq!(built.quality.get("empty_name"), 1);
        assert_eq!(built.quality.get("invalid_orcid"), 1);

        let first = &built.publication.mentions[0];
        assert_eq!(first.mention_id, "A1#1");
        assert!(first.orcid.is_none());
        let second = &built.publication.mentions[1];
        assert_eq!(second.orcid.as_deref(), Some("0000-0001-2345-6789"));
        assert_eq!(second.position, 2);
    }

    #[test]
    fn publication_metadata_from_first_row_carrying_it() {
        let mut r1 = row("A1", "John Smith", None);
        r1.journal = Some("Nature".into());
        let mut r2 = row("A1", "Maria Garcia", None);
        r2.title = Some("A Study".into());
        r2.year = Some(2023);
        let raw = RawPublication {
            article_id: "A1".into(),
            publication_id: "pub_000001".into(),
            doi: None,
            rows: vec![r1, r2],
        };
        let built = build_publication(&raw);
        assert_eq!(built.publication.journal.as_deref(), Some("Nature"));
        assert_eq!(built.publication.title, "A Study");
        assert_eq!(built.publication.year, Some(2023));
    }
}
