//! ORCID gold-set construction and clustering metrics.
//!
//! The gold set is anchored on ORCIDs: every mention carrying a valid ORCID
//! is grouped by it, and groups below the minimum size are dropped. Metrics
//! compare a predicted `mention_id -> cluster` assignment against the gold
//! assignment on the intersection of the two mention sets; mentions present
//! on one side only are excluded and reported as warning counts.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::info;

use crate::config::constants::eval::MIN_MENTIONS;

/// Cluster assignment: mention id -> cluster id.
pub type Assignment = BTreeMap<String, String>;

/// Corpus statistics collected while building a gold set.
#[derive(Debug, Default, Clone, Serialize)]
pub struct GoldSetStats {
    /// Mentions seen in the corpus.
    pub total_mentions: usize,
    /// Mentions carrying a valid ORCID.
    pub mentions_with_orcid: usize,
    /// Distinct ORCIDs before filtering.
    pub unique_orcids: usize,
    /// Clusters surviving the min-mentions filter.
    pub clusters_kept: usize,
    /// Mentions inside surviving clusters.
    pub mentions_kept: usize,
    /// Largest surviving cluster.
    pub max_cluster_size: usize,
}

/// ORCID-anchored ground truth.
#[derive(Debug, Clone, Serialize)]
pub struct GoldSet {
    /// mention id -> ORCID (the gold cluster id).
    pub assignment: Assignment,
    /// Corpus statistics.
    pub stats: GoldSetStats,
}

impl GoldSet {
    /// Build from `(mention_id, orcid)` observations, keeping ORCIDs with at
    /// least `min_mentions` mentions. `None` ORCIDs count toward corpus
    /// statistics only.
    pub fn build<'a, I>(observations: I, min_mentions: usize) -> Self
    where
        I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
    {
        let mut clusters: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut stats = GoldSetStats::default();
        for (mention_id, orcid) in observations {
            stats.total_mentions += 1;
            if let Some(orcid) = orcid {
                stats.mentions_with_orcid += 1;
                clusters
                    .entry(orcid.to_string())
                    .or_default()
                    .push(mention_id.to_string());
            }
        }
        stats.unique_orcids = clusters.len();

        let mut assignment = Assignment::new();
        for (orcid, mentions) in clusters {
            if mentions.len() < min_mentions {
                continue;
            }
            stats.clusters_kept += 1;
            stats.mentions_kept += mentions.len();
            stats.max_cluster_size = stats.max_cluster_size.max(mentions.len());
            for mention_id in mentions {
                assignment.insert(mention_id, orcid.clone());
            }
        }
        info!(
            clusters = stats.clusters_kept,
            mentions = stats.mentions_kept,
            "gold set built"
        );
        Self { assignment, stats }
    }

    /// Build with the default minimum cluster size.
    pub fn build_default<'a, I>(observations: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
    {
        Self::build(observations, MIN_MENTIONS)
    }
}

/// Pairwise precision/recall/F1 over unordered mention pairs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PairwiseMetrics {
    /// Pairs co-clustered in both assignments.
    pub true_positives: usize,
    /// Pairs co-clustered only in the prediction.
    pub false_positives: usize,
    /// Pairs co-clustered only in the gold assignment.
    pub false_negatives: usize,
    /// TP / (TP + FP); 1.0 on an empty denominator.
    pub precision: f64,
    /// TP / (TP + FN); 1.0 on an empty denominator.
    pub recall: f64,
    /// Harmonic mean of precision and recall.
    pub f1: f64,
}

/// B³ precision/recall/F1, macro-averaged over mentions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BCubedMetrics {
    /// Mean per-mention precision.
    pub precision: f64,
    /// Mean per-mention recall.
    pub recall: f64,
    /// Harmonic mean.
    pub f1: f64,
}

/// Full evaluation output.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    /// Mentions the metrics were computed on.
    pub evaluated_mentions: usize,
    /// Predicted mentions absent from the gold set (excluded, warned).
    pub excluded_from_predicted: usize,
    /// Gold mentions absent from the prediction (excluded, warned).
    pub excluded_from_gold: usize,
    /// Pairwise metrics.
    pub pairwise: PairwiseMetrics,
    /// B³ metrics.
    pub b_cubed: BCubedMetrics,
}

/// Evaluate a predicted assignment against a gold assignment.
pub fn evaluate(predicted: &Assignment, gold: &Assignment) -> EvaluationReport {
    let shared: Vec<&String> = predicted
        .keys()
        .filter(|id| gold.contains_key(*id))
        .collect();
    let shared_set: BTreeSet<&String> = shared.iter().copied().collect();

    let excluded_from_predicted = predicted.len() - shared.len();
    let excluded_from_gold = gold.len() - shared.len();
    if excluded_from_predicted > 0 || excluded_from_gold > 0 {
        info!(
            excluded_from_predicted,
            excluded_from_gold, "mentions excluded from evaluation"
        );
    }

    let pairwise = pairwise_metrics(predicted, gold, &shared);
    let b_cubed = b_cubed_metrics(predicted, gold, &shared_set);

    EvaluationReport {
        evaluated_mentions: shared.len(),
        excluded_from_predicted,
        excluded_from_gold,
        pairwise,
        b_cubed,
    }
}

fn pairwise_metrics(
    predicted: &Assignment,
    gold: &Assignment,
    mentions: &[&String],
) -> PairwiseMetrics {
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut fn_ = 0usize;
    for i in 0..mentions.len() {
        for j in (i + 1)..mentions.len() {
            let same_predicted = predicted[mentions[i]] == predicted[mentions[j]];
            let same_gold = gold[mentions[i]] == gold[mentions[j]];
            match (same_predicted, same_gold) {
                (true, true) => tp += 1,
                (true, false) => fp += 1,
                (false, true) => fn_ += 1,
                (false, false) => {}
            }
        }
    }
    let precision = ratio_or_one(tp, tp + fp);
    let recall = ratio_or_one(tp, tp + fn_);
    PairwiseMetrics {
        true_positives: tp,
        false_positives: fp,
        false_negatives: fn_,
        precision,
        recall,
        f1: harmonic(precision, recall),
    }
}

fn b_cubed_metrics(
    predicted: &Assignment,
    gold: &Assignment,
    mentions: &BTreeSet<&String>,
) -> BCubedMetrics {
    if mentions.is_empty() {
        return BCubedMetrics {
            precision: 0.0,
            recall: 0.0,
            f1: 0.0,
        };
    }

    // Cluster memberships restricted to the shared mention set.
    let mut predicted_clusters: BTreeMap<&String, BTreeSet<&String>> = BTreeMap::new();
    let mut gold_clusters: BTreeMap<&String, BTreeSet<&String>> = BTreeMap::new();
    for mention in mentions {
        predicted_clusters
            .entry(&predicted[*mention])
            .or_default()
            .insert(mention);
        gold_clusters
            .entry(&gold[*mention])
            .or_default()
            .insert(mention);
    }

    let mut precision_sum = 0.0;
    let mut recall_sum = 0.0;
    for mention in mentions {
        let p_cluster = &predicted_clusters[&predicted[*mention]];
        let g_cluster = &gold_clusters[&gold[*mention]];
        let overlap = p_cluster.intersection(g_cluster).count() as f64;
        precision_sum += overlap / p_cluster.len() as f64;
        recall_sum += overlap / g_cluster.len() as f64;
    }
    let n = mentions.len() as f64;
    let precision = precision_sum / n;
    let recall = recall_sum / n;
    BCubedMetrics {
        precision,
        recall,
        f1: harmonic(precision, recall),
    }
}

fn ratio_or_one(num: usize, den: usize) -> f64 {
    if den == 0 {
        1.0
    } else {
        num as f64 / den as f64
    }
}

fn harmonic(p: f64, r: f64) -> f64 {
    if p + r == 0.0 {
        0.0
    } else {
        2.0 * p * r / (p + r)
    }
}
