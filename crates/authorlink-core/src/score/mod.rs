//! Similarity scoring: the baseline and Fellegi-Sunter backends.
//!
//! Both backends consume the same [`ComparisonVector`](crate::compare::ComparisonVector)
//! and emit the same [`ScoreBreakdown`] shape, so the decision engine and
//! the trace are backend-agnostic. The backend is chosen once per run.

mod mu;

pub use mu::{MuEntry, MuTable};

use std::collections::BTreeMap;

use crate::compare::{ComparisonVector, Feature};
use crate::config::{constants::weights, Mode};
use crate::error::{ConfigError, ContradictionError};
use crate::types::{FeatureScore, ScoreBreakdown};

/// Baseline feature weights. Must sum to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    /// Name weight
    pub name: f64,
    /// ORCID weight
    pub orcid: f64,
    /// Coauthor weight
    pub coauthor: f64,
    /// Journal weight
    pub journal: f64,
    /// Affiliation weight
    pub affiliation: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            name: weights::NAME,
            orcid: weights::ORCID,
            coauthor: weights::COAUTHOR,
            journal: weights::JOURNAL,
            affiliation: weights::AFFILIATION,
        }
    }
}

impl Weights {
    /// Weight for a single feature.
    pub fn get(&self, feature: Feature) -> f64 {
        match feature {
            Feature::Name => self.name,
            Feature::Orcid => self.orcid,
            Feature::Coauthor => self.coauthor,
            Feature::Journal => self.journal,
            Feature::Affiliation => self.affiliation,
        }
    }

    /// Weights must sum to 1 (within float tolerance).
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sum = self.name + self.orcid + self.coauthor + self.journal + self.affiliation;
        if (sum - 1.0).abs() > 1e-6 {
            return Err(ConfigError::InvalidWeightSum(sum));
        }
        Ok(())
    }
}

/// The run's scorer. Holds whichever backend state the mode requires; the
/// MU table is always resident so both backends can be exercised on the
/// same comparisons (the decision engine picks one per run).
#[derive(Debug, Clone)]
pub struct Scorer {
    mode: Mode,
    weights: Weights,
    mu: MuTable,
}

impl Scorer {
    /// Build a scorer for `mode`. `mu` overrides the built-in table.
    pub fn new(mode: Mode, mu: Option<MuTable>) -> Result<Self, ConfigError> {
        let weights = Weights::default();
        weights.validate()?;
        let mu = match mu {
            Some(table) => {
                table.validate()?;
                table
            }
            None => MuTable::builtin(),
        };
        Ok(Self { mode, weights, mu })
    }

    /// The backend this scorer runs.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Score a comparison vector with the run's backend.
    ///
    /// A non-finite total or component is a contradiction: comparator output
    /// is bounded and the MU weights are floored, so NaN here means a bug,
    /// and it aborts the run rather than poisoning decisions.
    pub fn score(&self, vector: &ComparisonVector) -> Result<ScoreBreakdown, ContradictionError> {
        match self.mode {
            Mode::Baseline => self.score_baseline(vector),
            Mode::FellegiSunter => self.score_fellegi_sunter(vector),
        }
    }

    /// Weighted sum of raw similarities. Output in [0, 1]; a missing ORCID
    /// contributes its no-information value 0.5 x weight.
    fn score_baseline(
        &self,
        vector: &ComparisonVector,
    ) -> Result<ScoreBreakdown, ContradictionError> {
        let mut components = BTreeMap::new();
        let mut total = 0.0;
        for (feature, comparison) in vector.iter() {
            let contribution = comparison.value * self.weights.get(feature);
            check_finite(feature, contribution)?;
            total += contribution;
            components.insert(
                feature.as_str().to_string(),
                FeatureScore {
                    raw: comparison.value,
                    bin: comparison.bin.to_string(),
                    contribution,
                },
            );
        }
        check_finite(Feature::Name, total)?;
        Ok(ScoreBreakdown { total, components })
    }

    /// Summed log2 likelihood ratios from the MU table.
    fn score_fellegi_sunter(
        &self,
        vector: &ComparisonVector,
    ) -> Result<ScoreBreakdown, ContradictionError> {
        let mut components = BTreeMap::new();
        let mut total = 0.0;
        for (feature, comparison) in vector.iter() {
            // Coverage was validated at load time; a miss here means the
            // comparator emitted a bin outside its declared alphabet.
            let llr = self
                .mu
                .weight(feature, comparison.bin)
                .map_err(|_| ContradictionError::NonFiniteScore {
                    feature: feature.as_str().to_string(),
                    value: format!("unknown bin '{}'", comparison.bin),
                })?;
            check_finite(feature, llr)?;
            total += llr;
            components.insert(
                feature.as_str().to_string(),
                FeatureScore {
                    raw: comparison.value,
                    bin: comparison.bin.to_string(),
                    contribution: llr,
                },
            );
        }
        check_finite(Feature::Name, total)?;
        Ok(ScoreBreakdown { total, components })
    }
}

fn check_finite(feature: Feature, value: f64) -> Result<(), ContradictionError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ContradictionError::NonFiniteScore {
            feature: feature.as_str().to_string(),
            value: value.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::Comparison;

    fn vector(
        name: (f64, &'static str),
        orcid: (f64, &'static str),
        coauthor: (f64, &'static str),
        journal: (f64, &'static str),
        affiliation: (f64, &'static str),
    ) -> ComparisonVector {
        let c = |(value, bin): (f64, &'static str)| Comparison { value, bin };
        ComparisonVector {
            name: c(name),
            orcid: c(orcid),
            coauthor: c(coauthor),
            journal: c(journal),
            affiliation: c(affiliation),
        }
    }

    #[test]
    fn default_weights_sum_to_one() {
        assert!(Weights::default().validate().is_ok());
    }

    #[test]
    fn baseline_weighted_sum() {
        // ORCID match overriding name drift: name 0.90, orcid match, no
        // other evidence.
        let scorer = Scorer::new(Mode::Baseline, None).unwrap();
        let v = vector(
            (0.90, "high"),
            (1.0, "match"),
            (0.0, "none"),
            (0.0, "none"),
            (0.0, "none"),
        );
        let breakdown = scorer.score(&v).unwrap();
        // 0.40*0.90 + 0.30*1.0 = 0.66
        assert!((breakdown.total - 0.66).abs() < 1e-9);
        assert!((breakdown.components["name"].contribution - 0.36).abs() < 1e-9);
        assert!((breakdown.components["orcid"].contribution - 0.30).abs() < 1e-9);
    }

    #[test]
    fn baseline_missing_orcid_is_neutral() {
        let scorer = Scorer::new(Mode::Baseline, None).unwrap();
        let v = vector(
            (0.0, "none"),
            (0.5, "missing"),
            (0.0, "none"),
            (0.0, "none"),
            (0.0, "none"),
        );
        let breakdown = scorer.score(&v).unwrap();
        assert!((breakdown.total - 0.15).abs() < 1e-9);
    }

    #[test]
    fn fs_accumulates_llr_with_sign() {
        let scorer = Scorer::new(Mode::FellegiSunter, None).unwrap();
        let strong = vector(
            (0.99, "exact"),
            (1.0, "match"),
            (0.6, "high"),
            (0.6, "high"),
            (0.99, "exact"),
        );
        let strong_score = scorer.score(&strong).unwrap();
        assert!(strong_score.total > 10.0);

        let weak = vector(
            (0.1, "none"),
            (0.0, "mismatch"),
            (0.0, "none"),
            (0.0, "none"),
            (0.0, "none"),
        );
        let weak_score = scorer.score(&weak).unwrap();
        assert!(weak_score.total < -5.0);
    }

    #[test]
    fn both_backends_emit_identical_component_keys() {
        let v = vector(
            (0.9, "high"),
            (0.5, "missing"),
            (0.3, "medium"),
            (0.0, "none"),
            (0.7, "low"),
        );
        let baseline = Scorer::new(Mode::Baseline, None).unwrap().score(&v).unwrap();
        let fs = Scorer::new(Mode::FellegiSunter, None)
            .unwrap()
            .score(&v)
            .unwrap();
        let keys_a: Vec<&String> = baseline.components.keys().collect();
        let keys_b: Vec<&String> = fs.components.keys().collect();
        assert_eq!(keys_a, keys_b);
    }

    #[test]
    fn unknown_bin_is_a_contradiction() {
        let scorer = Scorer::new(Mode::FellegiSunter, None).unwrap();
        let v = vector(
            (0.9, "colossal"),
            (0.5, "missing"),
            (0.0, "none"),
            (0.0, "none"),
            (0.0, "none"),
        );
        assert!(matches!(
            scorer.score(&v),
            Err(ContradictionError::NonFiniteScore { .. })
        ));
    }
}
