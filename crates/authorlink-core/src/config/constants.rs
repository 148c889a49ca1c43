//! Centralized defaults and tuning constants.
//!
//! Every threshold and weight that was a scattered literal in earlier
//! prototypes lives here, so tests and the CLI agree on a single source of
//! truth.

/// Baseline feature weights. Must sum to 1.0 (validated at scorer
/// construction).
pub mod weights {
    /// Name similarity weight
    pub const NAME: f64 = 0.40;
    /// ORCID agreement weight
    pub const ORCID: f64 = 0.30;
    /// Coauthor overlap weight
    pub const COAUTHOR: f64 = 0.15;
    /// Journal overlap weight
    pub const JOURNAL: f64 = 0.10;
    /// Affiliation similarity weight
    pub const AFFILIATION: f64 = 0.05;
}

/// Three-way decision thresholds per scoring backend.
pub mod thresholds {
    /// Baseline MERGE threshold (weighted score is in [0, 1])
    pub const BASELINE_ACCEPT: f64 = 0.90;
    /// Baseline NEW threshold
    pub const BASELINE_REJECT: f64 = 0.20;
    /// Fellegi-Sunter MERGE threshold (log-likelihood ratio, unbounded)
    pub const FS_ACCEPT: f64 = 3.0;
    /// Fellegi-Sunter NEW threshold
    pub const FS_REJECT: f64 = -3.0;
}

/// Article deduplication.
pub mod dedup {
    /// Damerau-Levenshtein ratio at or above which two normalized titles
    /// are considered the same article.
    pub const TITLE_THRESHOLD: f64 = 0.95;
}

/// Fellegi-Sunter numerics.
pub mod fs {
    /// Stabilizing floor applied to both m and u before the log2 ratio, so
    /// a zero probability cannot produce an infinite weight.
    pub const EPSILON: f64 = 1e-9;
}

/// Evaluation defaults.
pub mod eval {
    /// Minimum mentions per ORCID for a gold cluster to survive filtering.
    pub const MIN_MENTIONS: usize = 2;
}

/// Pipeline defaults.
pub mod pipeline {
    /// Default fetch/parse worker pool size.
    pub const MAX_WORKERS: usize = 4;
    /// Bounded publication channel capacity per worker. Backpressure is
    /// applied once `MAX_WORKERS * CHANNEL_FACTOR` parsed publications are
    /// in flight.
    pub const CHANNEL_FACTOR: usize = 2;
}

/// Default RNG seed for a run.
pub const DEFAULT_SEED: u64 = 42;
