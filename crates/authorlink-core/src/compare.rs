//! Per-feature similarity comparators.
//!
//! Each comparator maps a (mention, candidate profile) pair to a
//! [`Comparison`]: a raw similarity in `[0, 1]` and a discrete bin. The bins
//! are the alphabet the Fellegi-Sunter MU table is indexed by; the raw
//! values feed the baseline backend. Comparators are pure and deterministic.

use std::collections::BTreeSet;

use crate::normalize;
use crate::types::AuthorProfile;

/// The five compared features, in trace order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    /// Author name similarity (Jaro-Winkler over normalized forms).
    Name,
    /// ORCID agreement.
    Orcid,
    /// Coauthor set overlap (Jaccard on surname+initial projections).
    Coauthor,
    /// Journal set overlap (Jaccard on normalized titles).
    Journal,
    /// Affiliation similarity (max pairwise Jaro-Winkler).
    Affiliation,
}

impl Feature {
    /// All features, in the order they appear in score breakdowns.
    pub const ALL: [Feature; 5] = [
        Feature::Name,
        Feature::Orcid,
        Feature::Coauthor,
        Feature::Journal,
        Feature::Affiliation,
    ];

    /// MU-table key / trace key for this feature.
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Name => "name",
            Feature::Orcid => "orcid",
            Feature::Coauthor => "coauthor",
            Feature::Journal => "journal",
            Feature::Affiliation => "affiliation",
        }
    }

    /// The bin alphabet for this feature. Every one of these must have an
    /// (m, u) entry in the MU table.
    pub fn bins(&self) -> &'static [&'static str] {
        match self {
            Feature::Name | Feature::Affiliation => {
                &["exact", "high", "medium", "low", "none"]
            }
            Feature::Orcid => &["match", "mismatch", "missing"],
            Feature::Coauthor | Feature::Journal => &["high", "medium", "low", "none"],
        }
    }
}

/// A comparator result: raw similarity plus its bin label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Comparison {
    /// Raw similarity in [0, 1].
    pub value: f64,
    /// Bin label from the feature's alphabet.
    pub bin: &'static str,
}

/// The mention side of a comparison, prepared once per mention.
#[derive(Debug, Clone)]
pub struct MentionView {
    /// Raw mention name.
    pub name: String,
    /// Validated ORCID, if any.
    pub orcid: Option<String>,
    /// Surname+initial projections of the co-mentioned author names.
    pub coauthor_keys: BTreeSet<String>,
    /// Normalized journal titles attached to the mention's publication.
    pub journals: BTreeSet<String>,
    /// Raw affiliation strings.
    pub affiliations: BTreeSet<String>,
}

/// The full comparison vector for one (mention, profile) pair.
#[derive(Debug, Clone)]
pub struct ComparisonVector {
    /// Name comparison.
    pub name: Comparison,
    /// ORCID comparison.
    pub orcid: Comparison,
    /// Coauthor comparison.
    pub coauthor: Comparison,
    /// Journal comparison.
    pub journal: Comparison,
    /// Affiliation comparison.
    pub affiliation: Comparison,
}

impl ComparisonVector {
    /// Iterate features with their comparisons, in canonical order.
    pub fn iter(&self) -> [(Feature, Comparison); 5] {
        [
            (Feature::Name, self.name),
            (Feature::Orcid, self.orcid),
            (Feature::Coauthor, self.coauthor),
            (Feature::Journal, self.journal),
            (Feature::Affiliation, self.affiliation),
        ]
    }
}

/// Compare a mention against a candidate profile on all five features.
///
/// `profile_coauthor_keys` is the candidate's coauthor set projected onto
/// surname+initial form; the ids stored on the profile are opaque, so the
/// caller resolves them through the index before comparison.
pub fn compare(
    mention: &MentionView,
    profile: &AuthorProfile,
    profile_coauthor_keys: &BTreeSet<String>,
) -> ComparisonVector {
    ComparisonVector {
        name: compare_name(&mention.name, profile),
        orcid: compare_orcid(mention.orcid.as_deref(), profile.orcid.as_deref()),
        coauthor: compare_coauthors(&mention.coauthor_keys, profile_coauthor_keys),
        journal: compare_journals(&mention.journals, &profile.journals),
        affiliation: compare_affiliations(&mention.affiliations, &profile.affiliations),
    }
}

/// Name similarity: Jaro-Winkler over normalized forms, maximized over the
/// candidate's alias set. Names differing only by initial expansion
/// (`j smith` vs `john smith`) are floored at the `high` bin.
pub fn compare_name(mention_name: &str, profile: &AuthorProfile) -> Comparison {
    let lhs = normalize::normalize_text(mention_name);
    if lhs.is_empty() {
        return Comparison {
            value: 0.0,
            bin: "none",
        };
    }

    let mut best: f64 = 0.0;
    let mut initial_match = false;
    for alias in profile.aliases.iter().chain(Some(&profile.canonical_name)) {
        let rhs = normalize::normalize_text(alias);
        if rhs.is_empty() {
            continue;
        }
        best = best.max(strsim::jaro_winkler(&lhs, &rhs));
        if normalize::initials_compatible(&lhs, &rhs) {
            initial_match = true;
        }
    }
    if initial_match {
        best = best.max(0.90);
    }
    Comparison {
        value: best,
        bin: bin_graded(best),
    }
}

/// ORCID agreement: both present and equal is `match` (1.0), both present
/// and different is `mismatch` (0.0), anything else carries no information
/// (`missing`, 0.5).
pub fn compare_orcid(mention: Option<&str>, profile: Option<&str>) -> Comparison {
    match (mention, profile) {
        (Some(a), Some(b)) if a == b => Comparison {
            value: 1.0,
            bin: "match",
        },
        (Some(_), Some(_)) => Comparison {
            value: 0.0,
            bin: "mismatch",
        },
        _ => Comparison {
            value: 0.5,
            bin: "missing",
        },
    }
}

/// Coauthor overlap: Jaccard between the mention's co-author projections and
/// the candidate's resolved coauthor projections.
fn compare_coauthors(
    mention_keys: &BTreeSet<String>,
    profile_keys: &BTreeSet<String>,
) -> Comparison {
    let value = jaccard(mention_keys, profile_keys);
    Comparison {
        value,
        bin: bin_overlap(value),
    }
}

/// Journal overlap: Jaccard over normalized journal title sets.
fn compare_journals(mention: &BTreeSet<String>, profile: &BTreeSet<String>) -> Comparison {
    let lhs: BTreeSet<String> = mention.iter().map(|j| normalize::normalize_text(j)).collect();
    let rhs: BTreeSet<String> = profile.iter().map(|j| normalize::normalize_text(j)).collect();
    let value = jaccard(&lhs, &rhs);
    Comparison {
        value,
        bin: bin_overlap(value),
    }
}

/// Affiliation similarity: max over pairwise Jaro-Winkler of normalized
/// institution strings.
fn compare_affiliations(mention: &BTreeSet<String>, profile: &BTreeSet<String>) -> Comparison {
    let mut best: f64 = 0.0;
    for a in mention {
        let na = normalize::normalize_text(a);
        if na.is_empty() {
            continue;
        }
        for b in profile {
            let nb = normalize::normalize_text(b);
            if nb.is_empty() {
                continue;
            }
            best = best.max(strsim::jaro_winkler(&na, &nb));
        }
    }
    Comparison {
        value: best,
        bin: bin_graded(best),
    }
}

/// Jaccard similarity of two string sets. Two empty sets share no evidence
/// and score 0.
fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

/// Bins for graded similarities (name, affiliation).
fn bin_graded(value: f64) -> &'static str {
    if value >= 0.98 {
        "exact"
    } else if value >= 0.90 {
        "high"
    } else if value >= 0.75 {
        "medium"
    } else if value >= 0.60 {
        "low"
    } else {
        "none"
    }
}

/// Bins for overlap similarities (coauthor, journal).
fn bin_overlap(value: f64) -> &'static str {
    if value >= 0.5 {
        "high"
    } else if value >= 0.2 {
        "medium"
    } else if value > 0.0 {
        "low"
    } else {
        "none"
    }
}
