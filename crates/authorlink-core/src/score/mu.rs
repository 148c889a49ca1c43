//! Fellegi-Sunter m/u parameter table.
//!
//! `m = P(bin | match)`, `u = P(bin | non-match)`. The table is loaded once
//! per run and must cover the full bin alphabet of every feature; a missing
//! entry is a fatal configuration error, never a silent skip.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::compare::Feature;
use crate::config::constants::fs::EPSILON;
use crate::error::ConfigError;

/// One (m, u) pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MuEntry {
    /// P(bin | match)
    pub m: f64,
    /// P(bin | non-match)
    pub u: f64,
}

/// The full table: feature -> bin -> (m, u).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MuTable {
    entries: BTreeMap<String, BTreeMap<String, MuEntry>>,
}

impl MuTable {
    /// Load a table from a JSON file of shape
    /// `{feature: {bin: {"m": .., "u": ..}}}` and validate coverage.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::UnreadableFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let table: MuTable =
            serde_json::from_str(&raw).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        table.validate()?;
        Ok(table)
    }

    /// The built-in table, estimated on the ORCID-anchored sample corpus.
    /// Used whenever no external table is configured.
    pub fn builtin() -> Self {
        let mut entries: BTreeMap<String, BTreeMap<String, MuEntry>> = BTreeMap::new();
        let mut put = |feature: &str, bin: &str, m: f64, u: f64| {
            entries
                .entry(feature.to_string())
                .or_default()
                .insert(bin.to_string(), MuEntry { m, u });
        };

        put("name", "exact", 0.55, 0.01);
        put("name", "high", 0.25, 0.03);
        put("name", "medium", 0.12, 0.08);
        put("name", "low", 0.05, 0.18);
        put("name", "none", 0.03, 0.70);

        put("orcid", "match", 0.60, 0.0005);
        put("orcid", "mismatch", 0.01, 0.30);
        put("orcid", "missing", 0.39, 0.6995);

        put("coauthor", "high", 0.35, 0.002);
        put("coauthor", "medium", 0.25, 0.01);
        put("coauthor", "low", 0.15, 0.04);
        put("coauthor", "none", 0.25, 0.948);

        put("journal", "high", 0.30, 0.01);
        put("journal", "medium", 0.25, 0.04);
        put("journal", "low", 0.15, 0.10);
        put("journal", "none", 0.30, 0.85);

        put("affiliation", "exact", 0.30, 0.005);
        put("affiliation", "high", 0.25, 0.015);
        put("affiliation", "medium", 0.20, 0.06);
        put("affiliation", "low", 0.10, 0.12);
        put("affiliation", "none", 0.15, 0.80);

        let table = Self { entries };
        debug_assert!(table.validate().is_ok());
        table
    }

    /// Verify that every feature's full bin alphabet is covered and that all
    /// probabilities are in (0, 1].
    pub fn validate(&self) -> Result<(), ConfigError> {
        for feature in Feature::ALL {
            for bin in feature.bins() {
                let entry = self
                    .entries
                    .get(feature.as_str())
                    .and_then(|bins| bins.get(*bin))
                    .ok_or_else(|| ConfigError::MissingMuEntry {
                        feature: feature.as_str().to_string(),
                        bin: bin.to_string(),
                    })?;
                for value in [entry.m, entry.u] {
                    if !(value > 0.0 && value <= 1.0) || !value.is_finite() {
                        return Err(ConfigError::InvalidMuProbability {
                            feature: feature.as_str().to_string(),
                            bin: bin.to_string(),
                            value,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// The log2 likelihood-ratio weight for a (feature, bin):
    /// `log2(max(m, eps) / max(u, eps))`.
    pub fn weight(&self, feature: Feature, bin: &str) -> Result<f64, ConfigError> {
        let entry = self
            .entries
            .get(feature.as_str())
            .and_then(|bins| bins.get(bin))
            .ok_or_else(|| ConfigError::MissingMuEntry {
                feature: feature.as_str().to_string(),
                bin: bin.to_string(),
            })?;
        Ok((entry.m.max(EPSILON) / entry.u.max(EPSILON)).log2())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn builtin_table_covers_all_bins() {
        assert!(MuTable::builtin().validate().is_ok());
    }

    #[test]
    fn agreement_weighs_positive_disagreement_negative() {
        let table = MuTable::builtin();
        assert!(table.weight(Feature::Orcid, "match").unwrap() > 0.0);
        assert!(table.weight(Feature::Orcid, "mismatch").unwrap() < 0.0);
        assert!(table.weight(Feature::Name, "exact").unwrap() > 0.0);
        assert!(table.weight(Feature::Name, "none").unwrap() < 0.0);
    }

    #[test]
    fn missing_entry_is_fatal() {
        let json = r#"{"name": {"exact": {"m": 0.5, "u": 0.01}}}"#;
        let table: MuTable = serde_json::from_str(json).unwrap();
        assert!(matches!(
            table.validate(),
            Err(ConfigError::MissingMuEntry { .. })
        ));
        assert!(matches!(
            table.weight(Feature::Orcid, "match"),
            Err(ConfigError::MissingMuEntry { .. })
        ));
    }

    #[test]
    fn out_of_range_probability_rejected() {
        let mut table = MuTable::builtin();
        table
            .entries
            .get_mut("name")
            .unwrap()
            .insert("exact".into(), MuEntry { m: 0.0, u: 0.01 });
        assert!(matches!(
            table.validate(),
            Err(ConfigError::InvalidMuProbability { .. })
        ));
    }

    #[test]
    fn loads_from_file() {
        let table = MuTable::builtin();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", serde_json::to_string(&table).unwrap()).unwrap();
        let loaded = MuTable::from_path(file.path()).unwrap();
        assert_eq!(
            loaded.weight(Feature::Name, "exact").unwrap(),
            table.weight(Feature::Name, "exact").unwrap()
        );
    }
}
