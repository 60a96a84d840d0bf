//! End-to-end gate pipeline scenarios against in-memory collaborators.

use covgate_core::fakes::{MemoryBaselineSource, MemoryObjectStore, RecordingStatusSink};
use covgate_core::{
    cancel_channel, GateConfig, GateError, GateOutcome, GatePipeline, StatusState, StoreConfig,
};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

const BADGE_URL: &str = "https://objects.example.com/bo-reports/coverage/badge.svg";

fn badge(percentage: &str) -> String {
    format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg"><title>coverage: {percentage}%</title></svg>"#
    )
}

/// Report dir with a badge plus any extra files.
fn report_dir(percentage: &str, extra_files: &[&str]) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("badge.svg"), badge(percentage)).unwrap();
    for file in extra_files {
        let path = dir.path().join(file);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"<html></html>").unwrap();
    }
    dir
}

fn config(report_dir: &TempDir, current_ref: &str) -> GateConfig {
    GateConfig {
        review_api_base: "https://api.github.com".into(),
        review_token: "token".into(),
        owner: "bo-editor".into(),
        repo: "bo".into(),
        commit_sha: "abc123".into(),
        run_id: "987".into(),
        pull_number: Some(42),
        current_ref: current_ref.into(),
        baseline_ref: "main".into(),
        baseline_badge_url: BADGE_URL.into(),
        report_dir: report_dir.path().to_path_buf(),
        badge_file: "badge.svg".into(),
        remote_prefix: "coverage".into(),
        store: StoreConfig {
            endpoint: "https://objects.example.com".into(),
            bucket: "bo-reports".into(),
            access_key: "AK".into(),
            secret_key: "SK".into(),
            region: "eu-west-1".into(),
        },
        http_timeout: Duration::from_secs(30),
        max_attempts: 3,
        tolerance: 0.0,
    }
}

#[tokio::test]
async fn improvement_on_feature_branch_posts_one_success_status() {
    let dir = report_dir("82.3", &[]);
    let config = config(&dir, "feature/selection-undo");

    let baseline = MemoryBaselineSource::new();
    baseline.insert(BADGE_URL, badge("80.0").as_bytes());
    let sink = RecordingStatusSink::new();
    let store = MemoryObjectStore::new();

    let pipeline = GatePipeline::new(&config, &baseline, &sink, &store);
    let (_tx, mut cancel) = cancel_channel();
    let outcome = pipeline.run(&mut cancel).await.unwrap();

    let verdict = match outcome {
        GateOutcome::Compared { verdict } => verdict,
        other => panic!("expected compare outcome, got {other:?}"),
    };
    assert!((verdict.delta - 2.3).abs() < 1e-9);

    let posted = sink.posted();
    assert_eq!(posted.len(), 1);
    let (sha, payload) = &posted[0];
    assert_eq!(sha, "abc123");
    assert_eq!(payload.state, StatusState::Success);
    assert_eq!(payload.description, "80% -> 82.3%");
    assert_eq!(payload.context, "ci/coverage");
    assert!(payload.target_url.contains("pr-42"));
    assert!(payload.target_url.contains("987"));
}

#[tokio::test]
async fn regression_is_informational_and_still_posts_success() {
    let dir = report_dir("75", &[]);
    let config = config(&dir, "feature/drop-tests");

    let baseline = MemoryBaselineSource::new();
    baseline.insert(BADGE_URL, badge("80").as_bytes());
    let sink = RecordingStatusSink::new();
    let store = MemoryObjectStore::new();

    let pipeline = GatePipeline::new(&config, &baseline, &sink, &store);
    let (_tx, mut cancel) = cancel_channel();
    pipeline.run(&mut cancel).await.unwrap();

    let posted = sink.posted();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].1.state, StatusState::Success);
    assert_eq!(posted[0].1.description, "80% -> 75%");
}

#[tokio::test]
async fn publish_on_main_uploads_local_and_deletes_stale() {
    // 3 local files (badge + 2), remote has 1 overlapping and 1 stale.
    let dir = report_dir("82.3", &["index.html", "src/main.rs.html"]);
    let config = config(&dir, "main");

    let baseline = MemoryBaselineSource::new();
    let sink = RecordingStatusSink::new();
    let store = MemoryObjectStore::new();
    store.insert("coverage/index.html", b"old");
    store.insert("coverage/stale.html", b"orphaned");

    let pipeline = GatePipeline::new(&config, &baseline, &sink, &store);
    let (_tx, mut cancel) = cancel_channel();
    let outcome = pipeline.run(&mut cancel).await.unwrap();

    let summary = match outcome {
        GateOutcome::Published { summary } => summary,
        other => panic!("expected publish outcome, got {other:?}"),
    };
    assert_eq!(summary.uploaded, 3);
    assert_eq!(summary.deleted, 1);

    let keys = store.keys();
    assert_eq!(
        keys,
        vec![
            "coverage/badge.svg".to_string(),
            "coverage/index.html".to_string(),
            "coverage/src/main.rs.html".to_string(),
        ]
    );
    // Publish path never posts a status.
    assert!(sink.posted().is_empty());
}

#[tokio::test]
async fn missing_baseline_fails_run_without_a_delta_status() {
    let dir = report_dir("82.3", &[]);
    let config = config(&dir, "feature/typo");

    // Nothing published at the badge URL: fetch returns NotFound.
    let baseline = MemoryBaselineSource::new();
    let sink = RecordingStatusSink::new();
    let store = MemoryObjectStore::new();

    let pipeline = GatePipeline::new(&config, &baseline, &sink, &store);
    let (_tx, mut cancel) = cancel_channel();
    let err = pipeline.run(&mut cancel).await.unwrap_err();
    assert!(matches!(err, GateError::NotFound(_)));

    // Only the best-effort error status, never a computed delta.
    let posted = sink.posted();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].1.state, StatusState::Error);
    assert!(!posted[0].1.description.contains("->"));
}

#[tokio::test]
async fn transient_baseline_failures_are_retried_within_budget() {
    let dir = report_dir("82.3", &[]);
    let config = config(&dir, "feature/flaky-network");

    let baseline = MemoryBaselineSource::new();
    baseline.fail_next(GateError::Transient("502 Bad Gateway".into()));
    baseline.fail_next(GateError::Transient("502 Bad Gateway".into()));
    baseline.insert(BADGE_URL, badge("80").as_bytes());
    let sink = RecordingStatusSink::new();
    let store = MemoryObjectStore::new();

    let pipeline = GatePipeline::new(&config, &baseline, &sink, &store);
    let (_tx, mut cancel) = cancel_channel();
    // Two transient failures then success fits inside max_attempts = 3.
    let outcome = pipeline.run(&mut cancel).await.unwrap();
    assert!(matches!(outcome, GateOutcome::Compared { .. }));
    assert_eq!(sink.posted().len(), 1);
}

#[tokio::test]
async fn flaky_upload_recovers_but_exhausted_key_fails_publish() {
    let dir = report_dir("82.3", &["index.html"]);
    let config = config(&dir, "main");

    let baseline = MemoryBaselineSource::new();
    let sink = RecordingStatusSink::new();
    let store = MemoryObjectStore::new();
    // badge recovers on retry; index.html never succeeds
    store.fail_times("coverage/badge.svg", 1);
    store.fail_times("coverage/index.html", 10);

    let pipeline = GatePipeline::new(&config, &baseline, &sink, &store);
    let (_tx, mut cancel) = cancel_channel();
    let err = pipeline.run(&mut cancel).await.unwrap_err();

    match err {
        GateError::PartialPublish { failed_keys } => {
            assert_eq!(failed_keys, vec!["coverage/index.html".to_string()]);
        }
        other => panic!("expected partial publish, got {other}"),
    }
    // The recovered upload stuck; no rollback.
    assert!(store.keys().contains(&"coverage/badge.svg".to_string()));
}

#[tokio::test]
async fn missing_config_fails_before_any_side_effect() {
    let dir = report_dir("82.3", &[]);
    let mut config = config(&dir, "feature/x");
    config.review_token = String::new();

    let baseline = MemoryBaselineSource::new();
    let sink = RecordingStatusSink::new();
    let store = MemoryObjectStore::new();

    let pipeline = GatePipeline::new(&config, &baseline, &sink, &store);
    let (_tx, mut cancel) = cancel_channel();
    let err = pipeline.run(&mut cancel).await.unwrap_err();

    assert!(matches!(err, GateError::Config(_)));
    assert!(sink.posted().is_empty());
    assert!(store.keys().is_empty());
}

#[tokio::test]
async fn cancellation_aborts_promptly() {
    let dir = report_dir("82.3", &[]);
    let config = config(&dir, "feature/cancelled");

    let baseline = MemoryBaselineSource::new();
    baseline.insert(BADGE_URL, badge("80").as_bytes());
    let sink = RecordingStatusSink::new();
    let store = MemoryObjectStore::new();

    let pipeline = GatePipeline::new(&config, &baseline, &sink, &store);
    let (tx, mut cancel) = cancel_channel();
    tx.send(true).unwrap();

    let err = pipeline.run(&mut cancel).await.unwrap_err();
    assert!(matches!(err, GateError::Cancelled));
    assert!(sink.posted().is_empty());
}
