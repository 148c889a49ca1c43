//! Run configuration.
//!
//! All recognized options are consolidated into a single immutable
//! [`RunConfig`] passed by value into the pipeline; defaults live in
//! [`constants`]. Validation happens once, at [`RunConfig::validate`], and
//! configuration problems are fatal (exit 2 at the CLI).

pub mod constants;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ConfigError;

/// Scoring backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Weighted sum of raw similarities, output in [0, 1].
    Baseline,
    /// Fellegi-Sunter log-likelihood ratio, output in R.
    #[serde(rename = "fs")]
    FellegiSunter,
}

impl Mode {
    /// Stable string form used in the trace and manifest.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Baseline => "baseline",
            Mode::FellegiSunter => "fs",
        }
    }

    /// Parse a CLI mode string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s {
            "baseline" => Ok(Mode::Baseline),
            "fs" => Ok(Mode::FellegiSunter),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }

    /// Default (accept, reject) thresholds for this backend.
    pub fn default_thresholds(&self) -> (f64, f64) {
        match self {
            Mode::Baseline => (
                constants::thresholds::BASELINE_ACCEPT,
                constants::thresholds::BASELINE_REJECT,
            ),
            Mode::FellegiSunter => (
                constants::thresholds::FS_ACCEPT,
                constants::thresholds::FS_REJECT,
            ),
        }
    }
}

/// Immutable configuration for one disambiguation run.
///
/// Constructed once by the driver, validated, then passed by value; no
/// module reads configuration from anywhere else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Scoring backend.
    pub mode: Mode,
    /// MERGE threshold: `score >= accept_threshold` merges.
    pub accept_threshold: f64,
    /// NEW threshold: `score <= reject_threshold` creates a profile.
    pub reject_threshold: f64,
    /// Title fuzzy-dedup threshold in [0, 1].
    pub title_threshold: f64,
    /// Seed for all in-run randomness (salt derivation).
    pub seed: u64,
    /// Fetch/parse worker pool size.
    pub max_workers: usize,
    /// Optional path to an external MU table (FS mode). `None` uses the
    /// built-in table.
    pub mu_table_path: Option<PathBuf>,
    /// Salt mixed into name redaction hashes. `None` derives one from the
    /// seed.
    pub redaction_salt: Option<String>,
    /// Optional cap on the number of publications ingested.
    pub limit: Option<usize>,
    /// Explicit run identifier. `None` derives one from the config hash and
    /// seed so reruns reproduce byte-identical traces.
    pub run_id: Option<String>,
    /// Output language tag for downstream report generators.
    pub language: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        let mode = Mode::Baseline;
        let (accept, reject) = mode.default_thresholds();
        Self {
            mode,
            accept_threshold: accept,
            reject_threshold: reject,
            title_threshold: constants::dedup::TITLE_THRESHOLD,
            seed: constants::DEFAULT_SEED,
            max_workers: constants::pipeline::MAX_WORKERS,
            mu_table_path: None,
            redaction_salt: None,
            limit: None,
            run_id: None,
            language: "en".to_string(),
        }
    }
}

impl RunConfig {
    /// A default configuration for the given backend, thresholds included.
    pub fn for_mode(mode: Mode) -> Self {
        let (accept, reject) = mode.default_thresholds();
        Self {
            mode,
            accept_threshold: accept,
            reject_threshold: reject,
            ..Self::default()
        }
    }

    /// Check threshold ordering and ranges. Called once before the run
    /// starts; any error here aborts with exit 2 and no trace output.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reject_threshold > self.accept_threshold {
            return Err(ConfigError::InvalidThresholds {
                accept: self.accept_threshold,
                reject: self.reject_threshold,
            });
        }
        if !(0.0..=1.0).contains(&self.title_threshold) {
            return Err(ConfigError::InvalidTitleThreshold(self.title_threshold));
        }
        if self.max_workers == 0 {
            return Err(ConfigError::InvalidMaxWorkers(self.max_workers));
        }
        Ok(())
    }

    /// SHA-256 over the canonical JSON form of this config. Recorded in the
    /// manifest and mixed into the derived run id.
    pub fn config_hash(&self) -> String {
        // serde_json on a struct serializes fields in declaration order,
        // which is stable for a fixed crate version.
        let canonical =
            serde_json::to_string(self).expect("RunConfig serialization cannot fail");
        let digest = Sha256::digest(canonical.as_bytes());
        hex_encode(&digest)
    }

    /// The run id: explicit if configured, otherwise derived from the config
    /// hash and seed so identical configurations reproduce identical runs.
    pub fn effective_run_id(&self) -> String {
        match &self.run_id {
            Some(id) => id.clone(),
            None => {
                let digest =
                    Sha256::digest(format!("{}:{}", self.config_hash(), self.seed).as_bytes());
                format!("run_{}", &hex_encode(&digest)[..12])
            }
        }
    }
}

/// Lowercase hex encoding of a byte slice.
pub(crate) fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        use std::fmt::Write;
        let _ = write!(out, "{b:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parsing() {
        assert_eq!(Mode::parse("baseline").unwrap(), Mode::Baseline);
        assert_eq!(Mode::parse("fs").unwrap(), Mode::FellegiSunter);
        assert!(matches!(
            Mode::parse("bayes"),
            Err(ConfigError::UnknownMode(_))
        ));
    }

    #[test]
    fn default_thresholds_per_mode() {
        let baseline = RunConfig::for_mode(Mode::Baseline);
        assert_eq!(baseline.accept_threshold, 0.90);
        assert_eq!(baseline.reject_threshold, 0.20);

        let fs = RunConfig::for_mode(Mode::FellegiSunter);
        assert_eq!(fs.accept_threshold, 3.0);
        assert_eq!(fs.reject_threshold, -3.0);
    }

    #[test]
    fn threshold_ordering_guard() {
        let mut config = RunConfig::default();
        config.accept_threshold = 0.20;
        config.reject_threshold = 0.90;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidThresholds { .. })
        ));
    }

    #[test]
    fn config_hash_is_stable_and_sensitive() {
        let a = RunConfig::default();
        let b = RunConfig::default();
        assert_eq!(a.config_hash(), b.config_hash());

        let mut c = RunConfig::default();
        c.seed = 43;
        assert_ne!(a.config_hash(), c.config_hash());
    }

    #[test]
    fn run_id_derivation() {
        let a = RunConfig::default();
        assert_eq!(a.effective_run_id(), a.effective_run_id());
        assert!(a.effective_run_id().starts_with("run_"));

        let mut named = RunConfig::default();
        named.run_id = Some("exp01".into());
        assert_eq!(named.effective_run_id(), "exp01");
    }
}
