//! authorlink — incremental author name disambiguation driver.
//!
//! Reads a Crossref author dump (and optionally a DOI work list), streams
//! the assembled publications through the disambiguation pipeline, and
//! writes the decision trace, review queue, results, and run manifest.
//!
//! Exit codes: 0 success, 2 configuration error, 3 data contradiction,
//! 130 cancelled.

mod error;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use authorlink_core::config::{constants, Mode, RunConfig};
use authorlink_core::error::ConfigError;
use authorlink_core::eval::EvaluationReport;
use authorlink_core::pipeline::{self, OutputPaths};
use authorlink_core::types::RawMentionRecord;
use authorlink_core::EngineError;

use error::CliExitCode;

/// Incremental author name disambiguation over Crossref records.
#[derive(Parser, Debug)]
#[command(name = "authorlink")]
#[command(version)]
#[command(about = "Three-way author disambiguation with a deterministic, redacted decision trace")]
struct Cli {
    /// JSON array of raw author mention records.
    #[arg(long, value_name = "PATH")]
    crossref_authors: PathBuf,

    /// JSON array of DOI strings (empty strings are filtered).
    #[arg(long, value_name = "PATH")]
    dois: Option<PathBuf>,

    /// External m/u parameter table for FS mode.
    #[arg(long, value_name = "PATH")]
    mu_table: Option<PathBuf>,

    /// Scoring backend.
    #[arg(long, default_value = "baseline", value_parser = ["baseline", "fs"])]
    mode: String,

    /// MERGE threshold (defaults: baseline 0.90, fs +3.0).
    #[arg(long, value_name = "FLOAT")]
    accept_threshold: Option<f64>,

    /// NEW threshold (defaults: baseline 0.20, fs -3.0).
    #[arg(long, value_name = "FLOAT")]
    reject_threshold: Option<f64>,

    /// Fuzzy title dedup threshold.
    #[arg(long, value_name = "FLOAT", default_value_t = constants::dedup::TITLE_THRESHOLD)]
    title_threshold: f64,

    /// Seed for all in-run randomness.
    #[arg(long, default_value_t = constants::DEFAULT_SEED)]
    seed: u64,

    /// Explicit run identifier (derived from config and seed when absent).
    #[arg(long, value_name = "ID")]
    run_id: Option<String>,

    /// Cap on the number of publications ingested.
    #[arg(long, value_name = "N")]
    limit: Option<usize>,

    /// Fetch/parse worker pool size.
    #[arg(long, value_name = "N", default_value_t = constants::pipeline::MAX_WORKERS)]
    max_workers: usize,

    /// Decision trace output path.
    #[arg(long, value_name = "PATH", default_value = "trace.jsonl")]
    trace_jsonl: PathBuf,

    /// Review queue output path.
    #[arg(long, value_name = "PATH", default_value = "review.jsonl")]
    review_jsonl: PathBuf,

    /// Results output path (assignments + summary).
    #[arg(long, short, value_name = "PATH", default_value = "results.json")]
    output: PathBuf,

    /// Verbose logging (info level).
    #[arg(long, short)]
    verbose: bool,

    /// Debug logging (debug level, overrides --verbose).
    #[arg(long)]
    debug: bool,
}

/// `results.json` contents.
#[derive(Debug, Serialize)]
struct Results {
    run_id: String,
    assignments: BTreeMap<String, String>,
    summary: Summary,
    #[serde(skip_serializing_if = "Option::is_none")]
    evaluation: Option<EvaluationReport>,
}

#[derive(Debug, Serialize)]
struct Summary {
    publications: usize,
    duplicates: usize,
    mentions: usize,
    mentions_skipped: usize,
    merge: usize,
    new: usize,
    unknown: usize,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    std::process::exit(run(cli).await.code());
}

async fn run(cli: Cli) -> CliExitCode {
    let config = RunConfig {
        mode: match Mode::parse(&cli.mode) {
            Ok(mode) => mode,
            Err(err) => {
                error!("{err}");
                return CliExitCode::Config;
            }
        },
        ..RunConfig::default()
    };
    let (default_accept, default_reject) = config.mode.default_thresholds();
    let config = RunConfig {
        accept_threshold: cli.accept_threshold.unwrap_or(default_accept),
        reject_threshold: cli.reject_threshold.unwrap_or(default_reject),
        title_threshold: cli.title_threshold,
        seed: cli.seed,
        max_workers: cli.max_workers,
        mu_table_path: cli.mu_table.clone(),
        redaction_salt: None,
        limit: cli.limit,
        run_id: cli.run_id.clone(),
        ..config
    };

    let records = match load_records(&cli.crossref_authors) {
        Ok(records) => records,
        Err(err) => {
            error!("{err}");
            return CliExitCode::Config;
        }
    };
    let dois = match &cli.dois {
        Some(path) => match load_dois(path) {
            Ok(dois) => dois,
            Err(err) => {
                error!("{err}");
                return CliExitCode::Config;
            }
        },
        None => Vec::new(),
    };
    info!(
        records = records.len(),
        dois = dois.len(),
        "inputs loaded"
    );

    // Ctrl-C flips the cancellation flag; the pipeline polls it before each
    // publication and finishes the in-flight one.
    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, cancelling");
                cancel.store(true, Ordering::SeqCst);
            }
        });
    }

    let outputs = OutputPaths {
        trace: cli.trace_jsonl.clone(),
        review: cli.review_jsonl.clone(),
        manifest: manifest_path(&cli.output),
    };

    match pipeline::run(config, records, dois, outputs, cancel.clone()).await {
        Ok(artifacts) => {
            let results = Results {
                run_id: artifacts.manifest.run_id.clone(),
                assignments: artifacts.assignments,
                summary: Summary {
                    publications: artifacts.manifest.inputs.publications_submitted,
                    duplicates: artifacts.manifest.inputs.duplicates,
                    mentions: artifacts.manifest.inputs.mentions_total,
                    mentions_skipped: artifacts.manifest.inputs.mentions_skipped,
                    merge: artifacts.manifest.decisions.merge,
                    new: artifacts.manifest.decisions.new,
                    unknown: artifacts.manifest.decisions.unknown,
                },
                evaluation: artifacts.evaluation,
            };
            if let Err(err) = write_results(&cli.output, &results) {
                error!("{err}");
                return CliExitCode::Config;
            }
            if artifacts.manifest.cancelled {
                CliExitCode::Cancelled
            } else {
                CliExitCode::Success
            }
        }
        Err(err) => {
            error!("{err}");
            CliExitCode::from(&err)
        }
    }
}

/// The manifest lives next to the results file.
fn manifest_path(output: &Path) -> PathBuf {
    match output.parent() {
        Some(dir) if dir != Path::new("") => dir.join("run_manifest.json"),
        _ => PathBuf::from("run_manifest.json"),
    }
}

fn load_records(path: &Path) -> Result<Vec<RawMentionRecord>, EngineError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::UnreadableFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
    })?;
    let records: Vec<RawMentionRecord> =
        serde_json::from_str(&raw).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    Ok(records)
}

fn load_dois(path: &Path) -> Result<Vec<String>, EngineError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::UnreadableFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
    })?;
    let dois: Vec<String> = serde_json::from_str(&raw).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(dois.into_iter().filter(|d| !d.trim().is_empty()).collect())
}

fn write_results(path: &Path, results: &Results) -> Result<(), EngineError> {
    let json = serde_json::to_string_pretty(results)?;
    std::fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_lands_next_to_results() {
        assert_eq!(
            manifest_path(Path::new("out/results.json")),
            PathBuf::from("out/run_manifest.json")
        );
        assert_eq!(
            manifest_path(Path::new("results.json")),
            PathBuf::from("run_manifest.json")
        );
    }

    #[test]
    fn cli_defaults() {
        let cli = Cli::parse_from(["authorlink", "--crossref-authors", "authors.json"]);
        assert_eq!(cli.mode, "baseline");
        assert_eq!(cli.seed, 42);
        assert_eq!(cli.title_threshold, 0.95);
        assert!(cli.accept_threshold.is_none());
        assert_eq!(cli.trace_jsonl, PathBuf::from("trace.jsonl"));
    }

    #[test]
    fn doi_filtering_drops_empty_strings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dois.json");
        std::fs::write(&path, r#"["10.1/a", "", "10.2/b", ""]"#).unwrap();
        let dois = load_dois(&path).unwrap();
        assert_eq!(dois, vec!["10.1/a", "10.2/b"]);
    }
}
