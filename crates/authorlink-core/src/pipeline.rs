//! Run orchestration.
//!
//! One producer fans grouped publications out to a bounded worker pool for
//! validation and assembly; one decision lane consumes the built
//! publications, restores ingest order through a reorder buffer, and commits
//! decisions serially. The index and trace are owned by the decision lane —
//! no two tasks ever mutate shared state.
//!
//! The trace writer and manifest are acquired in this outermost scope and
//! flushed/written on every exit path: completion, config error,
//! contradiction, cancellation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::{hex_encode, Mode, RunConfig};
use crate::engine::{DecisionEngine, PublicationOutcome};
use crate::error::EngineError;
use crate::eval::{self, Assignment, EvaluationReport, GoldSet};
use crate::ingest::{self, BuiltPublication, QualityCounts, RawPublication};
use crate::score::{MuTable, Scorer};
use crate::trace::{
    InputCounts, RunManifest, RunStatus, TraceThresholds, TraceWriter,
};
use crate::types::RawMentionRecord;

/// Where the run writes its streams and manifest.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    /// Decision trace stream.
    pub trace: PathBuf,
    /// Review queue stream (UNKNOWN decisions).
    pub review: PathBuf,
    /// Run manifest.
    pub manifest: PathBuf,
}

impl OutputPaths {
    /// Conventional file names under one directory.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            trace: dir.join("trace.jsonl"),
            review: dir.join("review.jsonl"),
            manifest: dir.join("run_manifest.json"),
        }
    }
}

/// Everything a completed (or cancelled) run produced.
#[derive(Debug)]
pub struct RunArtifacts {
    /// The manifest, as written to disk.
    pub manifest: RunManifest,
    /// Final cluster assignment: mention id -> author id (MERGE and NEW
    /// decisions only; UNKNOWN mentions stay unassigned).
    pub assignments: Assignment,
    /// Evaluator output, when the corpus yielded a usable gold set.
    pub evaluation: Option<EvaluationReport>,
}

/// Run the full pipeline over a raw corpus.
///
/// On a fatal error the trace is flushed and an `aborted` manifest is
/// written before the error propagates; on cancellation the in-flight
/// publication completes and the manifest carries `cancelled: true`.
pub async fn run(
    config: RunConfig,
    records: Vec<RawMentionRecord>,
    dois: Vec<String>,
    outputs: OutputPaths,
    cancel: Arc<AtomicBool>,
) -> Result<RunArtifacts, EngineError> {
    // Configuration problems abort before any output file exists.
    config.validate()?;
    let mu = match (&config.mode, &config.mu_table_path) {
        (Mode::FellegiSunter, Some(path)) => Some(MuTable::from_path(path)?),
        _ => None,
    };
    let scorer = Scorer::new(config.mode, mu)?;

    let run_id = config.effective_run_id();
    let salt = effective_salt(&config);
    let thresholds = TraceThresholds {
        accept: config.accept_threshold,
        reject: config.reject_threshold,
    };
    info!(run_id = %run_id, mode = config.mode.as_str(), "run starting");

    let mut trace = TraceWriter::create(
        &outputs.trace,
        &outputs.review,
        run_id.clone(),
        config.mode.as_str().to_string(),
        salt,
        thresholds,
    )?;
    let mut engine = DecisionEngine::new(&config, scorer, trace.clock().base());

    let corpus = ingest::group_records(records, &dois, config.limit);
    let mut quality = QualityCounts::default();
    quality.merge(&corpus.quality);
    let failed_dois = corpus.failed_dois.clone();
    let total_publications = corpus.publications.len();

    let lane = decision_lane(
        &config,
        corpus.publications,
        &mut engine,
        &mut trace,
        &mut quality,
        cancel,
    )
    .await;

    // Every exit path below flushes the trace and writes a manifest.
    let (status, reason, lane_state) = match lane {
        Ok(state) if state.cancelled => (RunStatus::Cancelled, None, state),
        Ok(state) => (RunStatus::Completed, None, state),
        Err((state, err)) => {
            warn!(error = %err, "run aborted");
            let reason = err.to_string();
            let manifest = build_manifest(
                &config,
                &run_id,
                RunStatus::Aborted,
                Some(reason),
                total_publications,
                &engine,
                &state,
                quality,
                failed_dois,
                thresholds,
            );
            trace.flush()?;
            manifest.write(&outputs.manifest)?;
            return Err(err);
        }
    };

    trace.flush()?;
    let manifest = build_manifest(
        &config,
        &run_id,
        status,
        reason,
        total_publications,
        &engine,
        &lane_state,
        quality,
        failed_dois,
        thresholds,
    );
    manifest.write(&outputs.manifest)?;

    // Join final assignments against the ORCID gold set, when one exists.
    let gold = GoldSet::build_default(
        lane_state
            .gold_observations
            .iter()
            .map(|(id, orcid)| (id.as_str(), orcid.as_deref())),
    );
    let evaluation = if gold.assignment.is_empty() {
        None
    } else {
        Some(eval::evaluate(&lane_state.assignments, &gold.assignment))
    };

    info!(
        merges = manifest.decisions.merge,
        new = manifest.decisions.new,
        unknown = manifest.decisions.unknown,
        "run finished"
    );
    Ok(RunArtifacts {
        manifest,
        assignments: lane_state.assignments,
        evaluation,
    })
}

/// Mutable state accumulated on the decision lane.
#[derive(Debug, Default)]
struct LaneState {
    assignments: Assignment,
    gold_observations: Vec<(String, Option<String>)>,
    mentions_total: usize,
    mentions_skipped: usize,
    publications_seen: usize,
    cancelled: bool,
}

/// Fan publications out to the worker pool and commit results serially in
/// ingest order.
async fn decision_lane(
    config: &RunConfig,
    publications: Vec<RawPublication>,
    engine: &mut DecisionEngine,
    trace: &mut TraceWriter,
    quality: &mut QualityCounts,
    cancel: Arc<AtomicBool>,
) -> Result<LaneState, (LaneState, EngineError)> {
    use crate::config::constants::pipeline::CHANNEL_FACTOR;

    let total = publications.len();
    let workers = config.max_workers.max(1);
    let capacity = (workers * CHANNEL_FACTOR).max(1);
    let (built_tx, mut built_rx) = mpsc::channel::<(usize, BuiltPublication)>(capacity);

    // Round-robin work distribution keeps each worker on a private channel
    // (no shared receiver, no locking); the reorder buffer downstream
    // restores ingest order regardless of completion order.
    let mut work_txs = Vec::with_capacity(workers);
    for _ in 0..workers {
        let (work_tx, mut work_rx) = mpsc::channel::<(usize, RawPublication)>(CHANNEL_FACTOR.max(1));
        let built_tx = built_tx.clone();
        tokio::spawn(async move {
            while let Some((idx, raw)) = work_rx.recv().await {
                let built = ingest::build_publication(&raw);
                if built_tx.send((idx, built)).await.is_err() {
                    break;
                }
            }
        });
        work_txs.push(work_tx);
    }
    drop(built_tx);

    tokio::spawn(async move {
        for (idx, raw) in publications.into_iter().enumerate() {
            let target = &work_txs[idx % work_txs.len()];
            if target.send((idx, raw)).await.is_err() {
                break;
            }
        }
    });

    let mut state = LaneState::default();
    let mut reorder: BTreeMap<usize, BuiltPublication> = BTreeMap::new();
    let mut next_index = 0usize;

    while next_index < total {
        // Pull until the next publication in ingest order is available.
        while !reorder.contains_key(&next_index) {
            match built_rx.recv().await {
                Some((idx, built)) => {
                    reorder.insert(idx, built);
                }
                None => {
                    // Workers gone with publications outstanding: only
                    // possible after cancellation dropped the producers.
                    state.cancelled = true;
                    return Ok(state);
                }
            }
        }
        let built = reorder
            .remove(&next_index)
            .expect("reorder buffer holds next_index");
        next_index += 1;

        // Cancellation is polled before each publication is handed to the
        // lane; the in-flight one completes, nothing is half-committed.
        if cancel.load(Ordering::SeqCst) {
            info!("cancellation observed, stopping intake");
            state.cancelled = true;
            return Ok(state);
        }

        state.publications_seen += 1;
        state.mentions_skipped += built.mentions_skipped;
        quality.merge(&built.quality);

        let publication = built.publication;
        match engine.submit(&publication) {
            Ok(PublicationOutcome::Admitted(decisions)) => {
                state.mentions_total += publication.mentions.len();
                for mention in &publication.mentions {
                    state
                        .gold_observations
                        .push((mention.mention_id.clone(), mention.orcid.clone()));
                }
                for outcome in &decisions {
                    let mention = &publication.mentions[(outcome.position - 1) as usize];
                    if let Err(err) = trace.append(outcome, &mention.name) {
                        return Err((state, err));
                    }
                    if let Some(author_id) = &outcome.assigned_author_id {
                        state
                            .assignments
                            .insert(outcome.mention_id.clone(), author_id.clone());
                    }
                }
            }
            Ok(PublicationOutcome::Duplicate { existing_id, .. }) => {
                debug!(
                    publication_id = %publication.publication_id,
                    existing = %existing_id,
                    "duplicate skipped"
                );
            }
            Err(err) => return Err((state, err)),
        }
    }

    Ok(state)
}

/// The redaction salt: configured value, or 16 bytes drawn from a ChaCha8
/// stream seeded with the run seed.
fn effective_salt(config: &RunConfig) -> String {
    match &config.redaction_salt {
        Some(salt) => salt.clone(),
        None => {
            let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
            let mut bytes = [0u8; 16];
            rng.fill_bytes(&mut bytes);
            hex_encode(&bytes)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn build_manifest(
    config: &RunConfig,
    run_id: &str,
    status: RunStatus,
    reason: Option<String>,
    total_publications: usize,
    engine: &DecisionEngine,
    state: &LaneState,
    quality: QualityCounts,
    failed_dois: Vec<String>,
    thresholds: TraceThresholds,
) -> RunManifest {
    RunManifest {
        run_id: run_id.to_string(),
        cancelled: status == RunStatus::Cancelled,
        status,
        reason,
        config_hash: config.config_hash(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        seed: config.seed,
        mode: config.mode.as_str().to_string(),
        thresholds,
        inputs: InputCounts {
            publications_submitted: total_publications,
            publications_admitted: state
                .publications_seen
                .saturating_sub(engine.duplicate_count()),
            duplicates: engine.duplicate_count(),
            mentions_total: state.mentions_total,
            mentions_skipped: state.mentions_skipped,
        },
        decisions: engine.counts(),
        data_quality: quality.into_map(),
        failed_dois,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn salt_is_seed_deterministic() {
        let config = RunConfig::default();
        assert_eq!(effective_salt(&config), effective_salt(&config));

        let mut other = RunConfig::default();
        other.seed = 7;
        assert_ne!(effective_salt(&config), effective_salt(&other));

        let mut fixed = RunConfig::default();
        fixed.redaction_salt = Some("pepper".into());
        assert_eq!(effective_salt(&fixed), "pepper");
    }
}
