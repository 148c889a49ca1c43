//! Error types for authorlink-core.
//!
//! Failures are split into three domains with distinct handling policies:
//!
//! - [`ConfigError`]: invalid run configuration. Fatal; the CLI maps it to
//!   exit code 2.
//! - [`ContradictionError`]: the input data contradicts a core invariant
//!   (ORCID uniqueness, finite scores). Fatal; exit code 3.
//! - [`DataQualityError`]: a defect on an individual mention. Never fatal;
//!   the mention is dropped at the ingest boundary, counted, and reported in
//!   the run manifest.
//!
//! [`EngineError`] unifies the fatal domains plus I/O and serialization
//! failures for propagation with `?`.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the core.
pub type CoreResult<T> = Result<T, EngineError>;

/// Configuration errors. All fatal.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// MU table has no entry for a (feature, bin) pair the scorer can emit.
    #[error("MU table missing entry for feature '{feature}', bin '{bin}'")]
    MissingMuEntry {
        /// Feature name (name, orcid, coauthor, journal, affiliation)
        feature: String,
        /// Bin label within the feature
        bin: String,
    },

    /// MU table entry has a probability outside (0, 1].
    #[error("MU table entry for '{feature}'/'{bin}' has invalid probability {value}")]
    InvalidMuProbability {
        /// Feature name
        feature: String,
        /// Bin label
        bin: String,
        /// Offending value
        value: f64,
    },

    /// Scoring mode string not recognized.
    #[error("Unknown mode '{0}' (expected 'baseline' or 'fs')")]
    UnknownMode(String),

    /// Dual thresholds out of order.
    #[error("Invalid thresholds: reject ({reject}) must not exceed accept ({accept})")]
    InvalidThresholds {
        /// Accept (MERGE) threshold
        accept: f64,
        /// Reject (NEW) threshold
        reject: f64,
    },

    /// Title dedup threshold outside [0, 1].
    #[error("Title threshold {0} outside [0.0, 1.0]")]
    InvalidTitleThreshold(f64),

    /// Worker pool size must be at least 1.
    #[error("max_workers must be >= 1, got {0}")]
    InvalidMaxWorkers(usize),

    /// Baseline feature weights do not sum to 1.
    #[error("Feature weights must sum to 1.0, got {0}")]
    InvalidWeightSum(f64),

    /// A configured input file could not be read.
    #[error("Cannot read {path}: {reason}")]
    UnreadableFile {
        /// Path that failed
        path: PathBuf,
        /// Underlying I/O message
        reason: String,
    },

    /// A configured input file failed to parse.
    #[error("Parse error in {path}: {reason}")]
    ParseError {
        /// Path that failed
        path: PathBuf,
        /// Parser message
        reason: String,
    },
}

/// Data contradictions. Fatal: the run aborts after flushing the trace.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ContradictionError {
    /// A NEW decision would create a second profile with an ORCID that is
    /// already bound to an existing profile.
    #[error("ORCID {orcid} already bound to profile {existing_id}")]
    DuplicateOrcid {
        /// The colliding ORCID
        orcid: String,
        /// Profile that already holds it
        existing_id: String,
    },

    /// A profile id was inserted twice.
    #[error("Author id {0} already present in index")]
    DuplicateAuthorId(String),

    /// A comparator or scorer produced a non-finite value. Treated as a bug
    /// in the scoring path, never silently coerced.
    #[error("Non-finite score for feature '{feature}' ({value})")]
    NonFiniteScore {
        /// Feature that produced the value
        feature: String,
        /// The offending value, stringified (NaN / inf)
        value: String,
    },
}

/// Per-mention data-quality defects. Non-fatal: the mention is skipped and
/// counted, no profile or publication state changes.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DataQualityError {
    /// ORCID fails the `dddd-dddd-dddd-dddX` shape check.
    #[error("Invalid ORCID '{0}'")]
    InvalidOrcid(String),

    /// Mention name empty after normalization.
    #[error("Empty author name on article '{article_id}'")]
    EmptyName {
        /// Article the mention belongs to
        article_id: String,
    },

    /// DOI remains malformed after normalization.
    #[error("Malformed DOI '{0}'")]
    MalformedDoi(String),

    /// Required field missing on a raw record.
    #[error("Missing required field '{field}' on article '{article_id}'")]
    MissingField {
        /// Field name
        field: String,
        /// Article the record belongs to
        article_id: String,
    },
}

impl DataQualityError {
    /// Counter key under which this defect is tallied in the manifest's
    /// `data_quality` map.
    pub fn key(&self) -> &'static str {
        match self {
            DataQualityError::InvalidOrcid(_) => "invalid_orcid",
            DataQualityError::EmptyName { .. } => "empty_name",
            DataQualityError::MalformedDoi(_) => "malformed_doi",
            DataQualityError::MissingField { .. } => "missing_field",
        }
    }
}

/// Unified fatal error for the engine and pipeline.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration error (exit 2).
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Data contradiction (exit 3).
    #[error(transparent)]
    Contradiction(#[from] ContradictionError),

    /// I/O failure on the trace, manifest, or an output file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The run was cancelled from outside (exit 130).
    #[error("Run cancelled")]
    Cancelled,
}

impl EngineError {
    /// Whether this error represents a data contradiction (exit 3) rather
    /// than a configuration problem (exit 2).
    pub fn is_contradiction(&self) -> bool {
        matches!(self, EngineError::Contradiction(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_messages_carry_values() {
        let err = ConfigError::InvalidThresholds {
            accept: 0.2,
            reject: 0.9,
        };
        let msg = err.to_string();
        assert!(msg.contains("0.9"));
        assert!(msg.contains("0.2"));
    }

    #[test]
    fn engine_error_classification() {
        let contradiction: EngineError = ContradictionError::DuplicateOrcid {
            orcid: "0000-0001-2345-6789".into(),
            existing_id: "au_000001".into(),
        }
        .into();
        assert!(contradiction.is_contradiction());

        let config: EngineError = ConfigError::UnknownMode("bayes".into()).into();
        assert!(!config.is_contradiction());
    }
}
