//! End-to-end pipeline properties: determinism, redaction, atomicity, and
//! dedup idempotence, exercised through the public `pipeline::run` entry
//! point exactly the way the CLI drives it.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use authorlink_core::config::{Mode, RunConfig};
use authorlink_core::pipeline::{run, OutputPaths};
use authorlink_core::types::RawMentionRecord;
use authorlink_core::EngineError;

fn record(
    article: &str,
    name: &str,
    orcid: Option<&str>,
    affiliation: Option<&str>,
    journal: Option<&str>,
    title: Option<&str>,
) -> RawMentionRecord {
    RawMentionRecord {
        article_id: article.to_string(),
        original_name: name.to_string(),
        lastname: None,
        firstname: None,
        orcid: orcid.map(str::to_string),
        affiliation: affiliation.map(str::to_string),
        journal: journal.map(str::to_string),
        title: title.map(str::to_string),
        year: Some(2023),
    }
}

fn sample_corpus() -> Vec<RawMentionRecord> {
    vec![
        record(
            "A1",
            "John A. Smith",
            Some("0000-0001-2345-6789"),
            Some("Stanford University"),
            Some("Nature"),
            Some("Machine Learning in Bioinformatics"),
        ),
        record("A1", "Maria Garcia", None, Some("MIT"), None, None),
        record(
            "A2",
            "J. Smith",
            Some("0000-0001-2345-6789"),
            Some("Stanford Univ"),
            Some("Science"),
            Some("Advanced ML Applications in Biology"),
        ),
        record("A2", "David Chen", None, Some("Google Research"), None, None),
        record(
            "A3",
            "Li Wei",
            Some("0000-0002-9999-9999"),
            Some("Tsinghua University"),
            Some("IEEE Transactions"),
            Some("Computer Vision Algorithms"),
        ),
        record(
            "A4",
            "J. Smith",
            Some("0000-0001-2345-6789"),
            None,
            Some("Cell"),
            Some("A Third Smith Paper"),
        ),
    ]
}

async fn run_to_dir(
    dir: &Path,
    config: RunConfig,
    records: Vec<RawMentionRecord>,
    dois: Vec<String>,
) -> Result<authorlink_core::RunArtifacts, EngineError> {
    run(
        config,
        records,
        dois,
        OutputPaths::in_dir(dir),
        Arc::new(AtomicBool::new(false)),
    )
    .await
}

#[tokio::test]
async fn two_runs_produce_byte_identical_traces() {
    let mut config = RunConfig::for_mode(Mode::Baseline);
    config.accept_threshold = 0.60;
    config.max_workers = 3;

    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    run_to_dir(dir_a.path(), config.clone(), sample_corpus(), vec![])
        .await
        .unwrap();
    run_to_dir(dir_b.path(), config, sample_corpus(), vec![])
        .await
        .unwrap();

    let trace_a = std::fs::read(dir_a.path().join("trace.jsonl")).unwrap();
    let trace_b = std::fs::read(dir_b.path().join("trace.jsonl")).unwrap();
    assert!(!trace_a.is_empty());
    assert_eq!(trace_a, trace_b);

    let review_a = std::fs::read(dir_a.path().join("review.jsonl")).unwrap();
    let review_b = std::fs::read(dir_b.path().join("review.jsonl")).unwrap();
    assert_eq!(review_a, review_b);
}

#[tokio::test]
async fn fs_mode_is_also_deterministic() {
    let config = RunConfig::for_mode(Mode::FellegiSunter);
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    run_to_dir(dir_a.path(), config.clone(), sample_corpus(), vec![])
        .await
        .unwrap();
    run_to_dir(dir_b.path(), config, sample_corpus(), vec![])
        .await
        .unwrap();
    assert_eq!(
        std::fs::read(dir_a.path().join("trace.jsonl")).unwrap(),
        std::fs::read(dir_b.path().join("trace.jsonl")).unwrap()
    );
}

#[tokio::test]
async fn trace_contains_no_plaintext_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let config = RunConfig::for_mode(Mode::Baseline);
    run_to_dir(
        dir.path(),
        config,
        sample_corpus(),
        vec!["10.1038/nature12373".to_string()],
    )
    .await
    .unwrap();

    let trace = std::fs::read_to_string(dir.path().join("trace.jsonl")).unwrap();
    for sensitive in [
        "John A. Smith",
        "Maria Garcia",
        "David Chen",
        "Li Wei",
        "J. Smith",
        "Stanford University",
        "Tsinghua University",
        "MIT",
        "Machine Learning in Bioinformatics",
        "Computer Vision Algorithms",
        "10.1038/nature12373",
    ] {
        assert!(
            !trace.contains(sensitive),
            "trace leaked plaintext: {sensitive}"
        );
    }
}

#[tokio::test]
async fn decisions_per_publication_are_all_or_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = RunConfig::for_mode(Mode::Baseline);
    run_to_dir(dir.path(), config, sample_corpus(), vec![])
        .await
        .unwrap();

    // Mentions per publication in the sample corpus: A1 has 2, A2 has 2,
    // A3 has 1, A4 has 1. Count trace records per publication id.
    let trace = std::fs::read_to_string(dir.path().join("trace.jsonl")).unwrap();
    let mut per_publication = std::collections::BTreeMap::new();
    for line in trace.lines() {
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        let id = value["publication_id"].as_str().unwrap().to_string();
        *per_publication.entry(id).or_insert(0usize) += 1;
    }
    let expected: std::collections::BTreeMap<String, usize> = [
        ("pub_000001".to_string(), 2),
        ("pub_000002".to_string(), 2),
        ("pub_000003".to_string(), 1),
        ("pub_000004".to_string(), 1),
    ]
    .into();
    assert_eq!(per_publication, expected);
}

#[tokio::test]
async fn scores_respect_thresholds() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = RunConfig::for_mode(Mode::Baseline);
    config.accept_threshold = 0.60;
    run_to_dir(dir.path(), config, sample_corpus(), vec![])
        .await
        .unwrap();

    let trace = std::fs::read_to_string(dir.path().join("trace.jsonl")).unwrap();
    for line in trace.lines() {
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        let Some(score) = value["score_total"].as_f64() else {
            // Unscored records (empty block) are NEW by definition.
            assert_eq!(value["decision"], "new");
            continue;
        };
        match value["decision"].as_str().unwrap() {
            "merge" => assert!(score >= 0.60),
            "new" => assert!(score <= 0.20),
            "unknown" => assert!(score > 0.20 && score < 0.60),
            other => panic!("unexpected decision {other}"),
        }
    }
}

#[tokio::test]
async fn duplicate_doi_is_idempotent() {
    // A1 and A2 get the same DOI; the second submission must emit no
    // decisions and leave the profile count unchanged.
    let records = vec![
        record("A1", "John Smith", None, None, Some("Nature"), Some("Paper One")),
        record("A1", "Maria Garcia", None, None, None, None),
        record("A2", "Alice Wonder", None, None, None, Some("Unrelated Paper")),
        record("A2", "Bob Builder", None, None, None, None),
        record("A2", "Carol Danvers", None, None, None, None),
    ];
    let dois = vec!["10.1038/x".to_string(), "10.1038/X".to_string()];

    let dir = tempfile::tempdir().unwrap();
    let config = RunConfig::for_mode(Mode::Baseline);
    let artifacts = run_to_dir(dir.path(), config, records, dois).await.unwrap();

    assert_eq!(artifacts.manifest.inputs.duplicates, 1);
    // Only A1's two mentions were decided.
    assert_eq!(artifacts.manifest.decisions.new, 2);
    assert_eq!(
        artifacts.manifest.inputs.publications_admitted,
        artifacts.manifest.inputs.publications_submitted - 1
    );

    let trace = std::fs::read_to_string(dir.path().join("trace.jsonl")).unwrap();
    assert_eq!(trace.lines().count(), 2);
}

#[tokio::test]
async fn threshold_ordering_aborts_before_any_output() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = RunConfig::for_mode(Mode::Baseline);
    config.accept_threshold = 0.20;
    config.reject_threshold = 0.90;

    let err = run_to_dir(dir.path(), config, sample_corpus(), vec![])
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Config(_)));
    // Config validation fires before the trace stream is even created.
    assert!(!dir.path().join("trace.jsonl").exists());
}

#[tokio::test]
async fn cancellation_writes_cancelled_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let config = RunConfig::for_mode(Mode::Baseline);
    let cancel = Arc::new(AtomicBool::new(false));
    cancel.store(true, Ordering::SeqCst);

    let artifacts = run(
        config,
        sample_corpus(),
        vec![],
        OutputPaths::in_dir(dir.path()),
        cancel,
    )
    .await
    .unwrap();

    assert!(artifacts.manifest.cancelled);
    let manifest = std::fs::read_to_string(dir.path().join("run_manifest.json")).unwrap();
    assert!(manifest.contains("\"cancelled\": true"));
}

#[tokio::test]
async fn manifest_counts_reconcile() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = RunConfig::for_mode(Mode::Baseline);
    config.accept_threshold = 0.60;
    let artifacts = run_to_dir(dir.path(), config, sample_corpus(), vec![])
        .await
        .unwrap();

    let m = &artifacts.manifest;
    assert_eq!(m.inputs.publications_submitted, 4);
    assert_eq!(
        m.decisions.merge + m.decisions.new + m.decisions.unknown,
        m.inputs.mentions_total
    );
    // "J. Smith" with the shared ORCID merges into the John A. Smith
    // profile twice (A2 and A4).
    assert!(m.decisions.merge >= 2);
    assert_eq!(m.status, authorlink_core::trace::RunStatus::Completed);
}
