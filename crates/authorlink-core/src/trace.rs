//! Decision trace log, review queue, and run manifest.
//!
//! Every committed decision emits exactly one JSONL record; UNKNOWN
//! decisions are additionally appended to the review stream. Records are
//! privacy-preserving: no plaintext name, DOI, title, or institution ever
//! appears — names are reduced to a salted hash prefix plus a structural
//! summary, and publications are referenced only by their synthetic ids.
//!
//! The whole stream is byte-reproducible: timestamps come from a logical
//! clock derived from the run id, sequence numbers are assigned at commit,
//! and every serialized map is ordered.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::config::hex_encode;
use crate::engine::DecisionCounts;
use crate::error::CoreResult;
use crate::normalize::{self, NameStructure};
use crate::types::{Decision, DecisionOutcome};

/// Hash a name with the run's redaction salt; first 12 hex chars.
pub fn redact_name(name: &str, salt: &str) -> String {
    let digest = Sha256::digest(format!("{name}{salt}").as_bytes());
    hex_encode(&digest)[..12].to_string()
}

/// Deterministic logical clock: the base instant is derived from the run id,
/// and each sequence number maps to base + seq seconds. Wall-clock time
/// never reaches the trace, which is what makes reruns byte-identical.
#[derive(Debug, Clone, Copy)]
pub struct LogicalClock {
    base: DateTime<Utc>,
}

impl LogicalClock {
    /// Derive the clock for a run id.
    pub fn for_run(run_id: &str) -> Self {
        let digest = Sha256::digest(run_id.as_bytes());
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&digest[..8]);
        // Keep the base within a sane range (years ~2001..2103).
        let secs = 1_000_000_000 + (u64::from_be_bytes(raw) % 3_200_000_000) as i64;
        Self {
            base: DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now),
        }
    }

    /// The instant for a sequence number.
    pub fn at(&self, seq: u64) -> DateTime<Utc> {
        self.base + chrono::Duration::seconds(seq as i64)
    }

    /// The clock's base instant (used to stamp profiles).
    pub fn base(&self) -> DateTime<Utc> {
        self.base
    }
}

/// Thresholds as recorded in every trace record.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TraceThresholds {
    /// MERGE threshold
    pub accept: f64,
    /// NEW threshold
    pub reject: f64,
}

/// Per-feature entry in a trace record.
#[derive(Debug, Clone, Serialize)]
struct TraceComponent {
    raw: f64,
    bin: String,
    contribution: f64,
}

/// One JSONL trace record. Field order is the serialized order.
#[derive(Debug, Serialize)]
struct TraceRecord<'a> {
    run_id: &'a str,
    seq: u64,
    timestamp: String,
    decision: &'static str,
    /// Absent when blocking produced no candidates (nothing was scored).
    score_total: Option<f64>,
    score_components: BTreeMap<String, TraceComponent>,
    thresholds: TraceThresholds,
    best_author_id: Option<&'a str>,
    mention_name_redacted: String,
    mention_name_structure: NameStructure,
    publication_id: &'a str,
    candidate_count: usize,
    blocking_key_count: usize,
    mode: &'a str,
    deterministic_hash: String,
}

/// Round to 6 decimal places, the precision recorded in the trace.
fn round6(x: f64) -> f64 {
    (x * 1e6).round() / 1e6
}

/// SHA-256 over the canonically serialized decision inputs; first 16 hex.
///
/// Canonical form: a sorted-key JSON object of the decision, best candidate,
/// mode, publication id, mention position, rounded components, rounded
/// total, and rounded thresholds.
fn deterministic_hash(
    outcome: &DecisionOutcome,
    score_total: Option<f64>,
    components: &BTreeMap<String, TraceComponent>,
    thresholds: TraceThresholds,
    mode: &str,
) -> String {
    #[derive(Serialize)]
    struct HashInput<'a> {
        best_author_id: Option<&'a str>,
        decision: &'static str,
        mode: &'a str,
        position: u32,
        publication_id: &'a str,
        score_components: BTreeMap<&'a str, (f64, &'a str)>,
        score_total: Option<f64>,
        thresholds: (f64, f64),
    }
    let input = HashInput {
        best_author_id: outcome.best_author_id.as_deref(),
        decision: outcome.decision.as_str(),
        mode,
        position: outcome.position,
        publication_id: &outcome.publication_id,
        score_components: components
            .iter()
            .map(|(k, v)| (k.as_str(), (round6(v.contribution), v.bin.as_str())))
            .collect(),
        score_total,
        thresholds: (round6(thresholds.accept), round6(thresholds.reject)),
    };
    let canonical = serde_json::to_string(&input).expect("hash input serialization cannot fail");
    let digest = Sha256::digest(canonical.as_bytes());
    hex_encode(&digest)[..16].to_string()
}

/// Append-only writer for the trace and review streams.
pub struct TraceWriter {
    run_id: String,
    mode: String,
    salt: String,
    thresholds: TraceThresholds,
    clock: LogicalClock,
    seq: u64,
    trace: BufWriter<File>,
    review: BufWriter<File>,
    trace_path: PathBuf,
    review_path: PathBuf,
}

impl TraceWriter {
    /// Create (truncate) both streams.
    pub fn create(
        trace_path: &Path,
        review_path: &Path,
        run_id: String,
        mode: String,
        salt: String,
        thresholds: TraceThresholds,
    ) -> CoreResult<Self> {
        let clock = LogicalClock::for_run(&run_id);
        Ok(Self {
            run_id,
            mode,
            salt,
            thresholds,
            clock,
            seq: 0,
            trace: BufWriter::new(File::create(trace_path)?),
            review: BufWriter::new(File::create(review_path)?),
            trace_path: trace_path.to_path_buf(),
            review_path: review_path.to_path_buf(),
        })
    }

    /// The run's logical clock.
    pub fn clock(&self) -> LogicalClock {
        self.clock
    }

    /// Number of records written so far.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Append one decision. Returns the record's sequence number.
    ///
    /// `mention_name` is the plaintext name; it is redacted here and never
    /// written.
    pub fn append(&mut self, outcome: &DecisionOutcome, mention_name: &str) -> CoreResult<u64> {
        let seq = self.seq;
        self.seq += 1;

        let scored = outcome.candidate_count > 0;
        let score_total = scored.then(|| round6(outcome.breakdown.total));
        let components: BTreeMap<String, TraceComponent> = outcome
            .breakdown
            .components
            .iter()
            .map(|(k, v)| {
                (
                    k.clone(),
                    TraceComponent {
                        raw: round6(v.raw),
                        bin: v.bin.clone(),
                        contribution: round6(v.contribution),
                    },
                )
            })
            .collect();
        let hash = deterministic_hash(outcome, score_total, &components, self.thresholds, &self.mode);

        let record = TraceRecord {
            run_id: &self.run_id,
            seq,
            timestamp: self.clock.at(seq).to_rfc3339(),
            decision: outcome.decision.as_str(),
            score_total,
            score_components: components,
            thresholds: self.thresholds,
            best_author_id: outcome.best_author_id.as_deref(),
            mention_name_redacted: redact_name(mention_name, &self.salt),
            mention_name_structure: normalize::name_structure(mention_name),
            publication_id: &outcome.publication_id,
            candidate_count: outcome.candidate_count,
            blocking_key_count: outcome.blocking_keys.len(),
            mode: &self.mode,
            deterministic_hash: hash,
        };

        let line = serde_json::to_string(&record)?;
        writeln!(self.trace, "{line}")?;
        if outcome.decision == Decision::Unknown {
            writeln!(self.review, "{line}")?;
        }
        Ok(seq)
    }

    /// Flush both streams. Called on every exit path, success or not.
    pub fn flush(&mut self) -> CoreResult<()> {
        self.trace.flush()?;
        self.review.flush()?;
        Ok(())
    }

    /// Paths of the two streams (for reporting).
    pub fn paths(&self) -> (&Path, &Path) {
        (&self.trace_path, &self.review_path)
    }
}

impl Drop for TraceWriter {
    fn drop(&mut self) {
        if self.flush().is_err() {
            warn!("trace flush on drop failed");
        }
    }
}

/// Input-side tallies for the manifest.
#[derive(Debug, Default, Clone, Serialize)]
pub struct InputCounts {
    /// Publications handed to the decision lane.
    pub publications_submitted: usize,
    /// Publications that passed dedup.
    pub publications_admitted: usize,
    /// Publications rejected as duplicates.
    pub duplicates: usize,
    /// Mentions on admitted publications.
    pub mentions_total: usize,
    /// Mentions dropped at the ingest boundary for data-quality defects.
    pub mentions_skipped: usize,
}

/// Terminal state of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Ran to completion.
    Completed,
    /// Aborted on a fatal error after flushing the trace.
    Aborted,
    /// Cancelled from outside; the in-flight publication was completed.
    Cancelled,
}

/// `run_manifest.json` contents.
#[derive(Debug, Clone, Serialize)]
pub struct RunManifest {
    /// Run identifier.
    pub run_id: String,
    /// Terminal state.
    pub status: RunStatus,
    /// Cancellation marker (redundant with status, kept for consumers that
    /// only check a boolean).
    pub cancelled: bool,
    /// Abort reason, when status is `Aborted`.
    pub reason: Option<String>,
    /// SHA-256 of the canonical config JSON.
    pub config_hash: String,
    /// Crate version that produced the run.
    pub version: String,
    /// RNG seed.
    pub seed: u64,
    /// Scoring backend name.
    pub mode: String,
    /// Thresholds in force.
    pub thresholds: TraceThresholds,
    /// Input tallies.
    pub inputs: InputCounts,
    /// Decision tallies.
    pub decisions: DecisionCounts,
    /// Per-defect data-quality counts (invalid_orcid, empty_name, ...).
    pub data_quality: BTreeMap<String, usize>,
    /// DOIs whose upstream fetch failed; attributed to the fetcher, never
    /// the decision lane.
    pub failed_dois: Vec<String>,
}

impl RunManifest {
    /// Write the manifest as pretty JSON.
    pub fn write(&self, path: &Path) -> CoreResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
