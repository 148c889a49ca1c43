//! Three-way decision types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Outcome of comparing one mention against the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Confirmed match: score >= accept threshold, mention folds into the
    /// best candidate profile.
    Merge,
    /// Confirmed non-match: score <= reject threshold (or no candidates),
    /// a fresh profile is created.
    New,
    /// Neither: routed to the human-review queue, no mutation.
    Unknown,
}

impl Decision {
    /// Stable string form used in trace records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Merge => "merge",
            Decision::New => "new",
            Decision::Unknown => "unknown",
        }
    }
}

/// Per-feature score detail, identical in shape for both backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScore {
    /// Raw similarity in [0, 1].
    pub raw: f64,
    /// Discrete bin the raw value fell into.
    pub bin: String,
    /// Weighted contribution (baseline) or log2 likelihood ratio (FS).
    pub contribution: f64,
}

/// Full score breakdown for one (mention, candidate) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Total score: weighted sum (baseline) or summed LLR (FS).
    pub total: f64,
    /// Per-feature detail keyed by feature name; `BTreeMap` keeps the
    /// serialized order deterministic.
    pub components: BTreeMap<String, FeatureScore>,
}

impl ScoreBreakdown {
    /// A zero breakdown for decisions made without any candidate (empty
    /// block): no components, nothing was scored.
    pub fn empty() -> Self {
        Self {
            total: 0.0,
            components: BTreeMap::new(),
        }
    }
}

/// One staged decision for one mention, produced by the engine and consumed
/// by the trace writer and the results file.
#[derive(Debug, Clone)]
pub struct DecisionOutcome {
    /// The mention this decision is about.
    pub mention_id: String,
    /// Publication the mention belongs to.
    pub publication_id: String,
    /// 1-based position of the mention on the publication.
    pub position: u32,
    /// The three-way verdict.
    pub decision: Decision,
    /// Best candidate id (`None` when the block was empty).
    pub best_author_id: Option<String>,
    /// Profile the mention was committed to (`None` for UNKNOWN).
    pub assigned_author_id: Option<String>,
    /// Score against the best candidate; zero-valued breakdown when no
    /// candidates existed.
    pub breakdown: ScoreBreakdown,
    /// Number of candidates produced by blocking.
    pub candidate_count: usize,
    /// Blocking keys that produced the candidate set.
    pub blocking_keys: Vec<String>,
}
