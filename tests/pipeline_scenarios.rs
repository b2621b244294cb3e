//! End-to-end scenarios over the orchestrator with fake collaborators

mod common;

use common::*;
use std::sync::Arc;
use tempfile::tempdir;
use welfare_fraud_pipeline::metrics::stage;
use welfare_fraud_pipeline::registry::RegistryCheck;
use welfare_fraud_pipeline::store::{ApplicationStore, InMemoryApplicationStore};
use welfare_fraud_pipeline::types::{JobOutcome, SignalKind, VerificationJob};

fn report(outcome: JobOutcome) -> welfare_fraud_pipeline::types::JobReport {
    match outcome {
        JobOutcome::Success(report) => report,
        JobOutcome::Error { message, .. } => panic!("job failed: {message}"),
    }
}

#[tokio::test]
async fn test_large_income_mismatch_is_flagged() {
    let dir = tempdir().unwrap();
    let store = Arc::new(InMemoryApplicationStore::new());
    store.upsert(submission("A", 45000.0, "ACC-A")).unwrap();
    let doc = document(dir.path(), "a.txt", "Annual income: Rs 4,50,000 only");

    let pipeline = orchestrator(store.clone(), clear_registry());
    let report = report(pipeline.process(VerificationJob::new("A", doc)).await);

    assert_eq!(report.extracted_income, 450000.0);
    assert!(report.signals.contains(&SignalKind::IncomeMismatch));
    assert!(report.anomaly_probability > 0.8);
    // 40 (mismatch) + 83 (anomaly) is capped
    assert_eq!(report.fraud_score, 100);

    let stored = store.get("A").unwrap().unwrap();
    assert_eq!(stored.fraud_score, 100);
    assert_eq!(
        stored.justification[0],
        "OCR income mismatch (stated: 45000, extracted: 450000)"
    );
    assert_eq!(
        stored.justification[1],
        "Anomaly model flagged composite risk (confidence: 0.83)"
    );
}

#[tokio::test]
async fn test_small_gap_and_over_reporting_do_not_mismatch() {
    let dir = tempdir().unwrap();
    let store = Arc::new(InMemoryApplicationStore::new());
    store.upsert(submission("close", 45000.0, "ACC-1")).unwrap();
    store.upsert(submission("over", 90000.0, "ACC-2")).unwrap();
    let close = document(dir.path(), "close.txt", "Income 55000");
    let over = document(dir.path(), "over.txt", "Income 20000");

    let pipeline = orchestrator(store.clone(), clear_registry());
    let close = report(pipeline.process(VerificationJob::new("close", close)).await);
    let over = report(pipeline.process(VerificationJob::new("over", over)).await);

    assert!(!close.signals.contains(&SignalKind::IncomeMismatch));
    assert!(!over.signals.contains(&SignalKind::IncomeMismatch));
    assert!(store.get("close").unwrap().unwrap().justification.is_empty());
}

#[tokio::test]
async fn test_shared_account_ring_and_control_group() {
    let store = Arc::new(InMemoryApplicationStore::new());
    for i in 0..50 {
        store
            .upsert(submission(&format!("ring-{i:02}"), 30000.0, "SHARED-ACC"))
            .unwrap();
    }
    for i in 0..10 {
        store
            .upsert(submission(&format!("control-{i}"), 30000.0, &format!("UNIQUE-{i}")))
            .unwrap();
    }

    let pipeline = orchestrator(store.clone(), clear_registry());

    for i in 0..50 {
        let id = format!("ring-{i:02}");
        let report = report(
            pipeline
                .process(VerificationJob::new(id.clone(), "/no/such/document.png"))
                .await,
        );
        assert_eq!(report.rings_flagged_count, 50, "{id}");
        assert!(report.signals.contains(&SignalKind::FraudRing), "{id}");

        let stored = store.get(&id).unwrap().unwrap();
        // 30 (ring) + round(sigmoid(-4 + 1.2 * ln 51) * 100) = 30 + 67
        assert_eq!(stored.fraud_score, 97);
        assert_eq!(
            stored.justification[0],
            "Fraud ring: shares a financial account with 2 or more other applications"
        );
    }

    for i in 0..10 {
        let id = format!("control-{i}");
        let report = report(
            pipeline
                .process(VerificationJob::new(id.clone(), "/no/such/document.png"))
                .await,
        );
        assert_eq!(report.rings_flagged_count, 0);
        assert!(!report.signals.contains(&SignalKind::FraudRing));

        let stored = store.get(&id).unwrap().unwrap();
        assert_eq!(stored.fraud_score, 2);
        assert!(stored.justification.is_empty());
    }
}

#[tokio::test]
async fn test_pair_sharing_an_account_is_below_ring_threshold() {
    let store = Arc::new(InMemoryApplicationStore::new());
    store.upsert(submission("x", 30000.0, "PAIR")).unwrap();
    store.upsert(submission("y", 30000.0, "PAIR")).unwrap();

    let pipeline = orchestrator(store.clone(), clear_registry());
    let report = report(pipeline.process(VerificationJob::new("x", "/missing")).await);

    assert_eq!(report.rings_flagged_count, 0);
    assert!(!report.signals.contains(&SignalKind::FraudRing));
}

#[tokio::test(start_paused = true)]
async fn test_registry_timeout_does_not_affect_score() {
    let baseline_store = Arc::new(InMemoryApplicationStore::new());
    let slow_store = Arc::new(InMemoryApplicationStore::new());
    for store in [&baseline_store, &slow_store] {
        store.upsert(submission("A", 45000.0, "ACC-A")).unwrap();
    }

    let baseline = orchestrator(baseline_store.clone(), clear_registry());
    let slow = orchestrator(slow_store.clone(), Arc::new(HangingRegistry));

    let expected = report(baseline.process(VerificationJob::new("A", "/missing")).await);
    let started = tokio::time::Instant::now();
    let timed_out = report(slow.process(VerificationJob::new("A", "/missing")).await);

    assert!(started.elapsed() >= std::time::Duration::from_secs(5));
    assert!(started.elapsed() < std::time::Duration::from_secs(3600));
    assert_eq!(timed_out.fraud_score, expected.fraud_score);
    assert!(!timed_out.signals.contains(&SignalKind::RegistryAsset));
    assert_eq!(
        slow.metrics().get_degraded_stages().get(stage::REGISTRY),
        Some(&1)
    );
    assert_eq!(
        slow_store.get("A").unwrap().unwrap().justification,
        baseline_store.get("A").unwrap().unwrap().justification
    );
}

#[tokio::test]
async fn test_registry_failure_is_absorbed() {
    let store = Arc::new(InMemoryApplicationStore::new());
    store.upsert(submission("A", 45000.0, "ACC-A")).unwrap();
    let registry = Arc::new(FixedRegistry(RegistryCheck::Failed {
        cause: "connection refused".to_string(),
    }));

    let pipeline = orchestrator(store.clone(), registry);
    let outcome = pipeline.process(VerificationJob::new("A", "/missing")).await;

    assert!(outcome.is_success());
    assert_eq!(store.get("A").unwrap().unwrap().fraud_score, 2);
}

#[tokio::test]
async fn test_rerun_accrues_score_without_duplicate_reasons() {
    let dir = tempdir().unwrap();
    let store = Arc::new(InMemoryApplicationStore::new());
    store.upsert(submission("A", 45000.0, "ACC-A")).unwrap();
    let doc = document(dir.path(), "a.txt", "Total income 60,000");

    let pipeline = orchestrator(store.clone(), clear_registry());

    // 40 (mismatch) + round(sigmoid(-4 + 1.5 * ln 2.5) * 100) = 40 + 7 per run
    let first = report(pipeline.process(VerificationJob::new("A", &doc)).await);
    assert_eq!(first.fraud_score, 47);
    let after_first = store.get("A").unwrap().unwrap().justification;

    let second = report(pipeline.process(VerificationJob::new("A", &doc)).await);
    assert_eq!(second.fraud_score, 94);
    assert_eq!(store.get("A").unwrap().unwrap().justification, after_first);
    assert_eq!(after_first.len(), 1);

    let third = report(pipeline.process(VerificationJob::new("A", &doc)).await);
    assert_eq!(third.fraud_score, 100);
}

#[tokio::test]
async fn test_redelivered_job_is_not_applied_twice() {
    let dir = tempdir().unwrap();
    let store = Arc::new(InMemoryApplicationStore::new());
    store.upsert(submission("A", 45000.0, "ACC-A")).unwrap();
    let doc = document(dir.path(), "a.txt", "Total income 60,000");
    let job = VerificationJob::new("A", doc);

    let pipeline = orchestrator(store.clone(), clear_registry());
    let first = report(pipeline.process(job.clone()).await);
    let again = report(pipeline.process(job).await);

    assert!(!first.redelivered);
    assert!(again.redelivered);
    assert_eq!(again.fraud_score, 47);
    assert_eq!(store.get("A").unwrap().unwrap().fraud_score, 47);
}

#[tokio::test]
async fn test_missing_applicant_reports_error_without_writes() {
    let store = Arc::new(InMemoryApplicationStore::new());
    store.upsert(submission("present", 45000.0, "ACC")).unwrap();
    let before = store.get("present").unwrap();

    let pipeline = orchestrator(store.clone(), clear_registry());
    let outcome = pipeline.process(VerificationJob::new("absent", "/missing")).await;

    match outcome {
        JobOutcome::Error {
            applicant_id,
            message,
            ..
        } => {
            assert_eq!(applicant_id, "absent");
            assert!(message.contains("absent"));
        }
        other => panic!("expected error outcome, got {other:?}"),
    }
    assert_eq!(store.len(), 1);
    assert_eq!(store.get("present").unwrap(), before);
    assert!(store.get("absent").unwrap().is_none());
}

#[tokio::test]
async fn test_ring_scan_failure_degrades() {
    let inner = InMemoryApplicationStore::new();
    for i in 0..3 {
        inner.upsert(submission(&format!("r{i}"), 30000.0, "SHARED")).unwrap();
    }
    let mut flaky = FlakyStore::new(inner);
    flaky.fail_scan = true;
    let store = Arc::new(flaky);

    let pipeline = orchestrator(store.clone(), clear_registry());
    let report = report(pipeline.process(VerificationJob::new("r0", "/missing")).await);

    assert_eq!(report.rings_flagged_count, 0);
    assert_eq!(report.fraud_score, 2);
    assert_eq!(
        pipeline.metrics().get_degraded_stages().get(stage::RING_SCAN),
        Some(&1)
    );
}

#[tokio::test]
async fn test_persistence_failure_is_terminal() {
    let inner = InMemoryApplicationStore::new();
    inner.upsert(submission("A", 45000.0, "ACC")).unwrap();
    let mut flaky = FlakyStore::new(inner);
    flaky.fail_merge = true;
    let store = Arc::new(flaky);

    let pipeline = orchestrator(store.clone(), clear_registry());
    let outcome = pipeline.process(VerificationJob::new("A", "/missing")).await;

    match outcome {
        JobOutcome::Error { message, .. } => assert!(message.contains("failed to persist score")),
        other => panic!("expected error outcome, got {other:?}"),
    }
    assert_eq!(store.inner.get("A").unwrap().unwrap().fraud_score, 0);
}

#[tokio::test]
async fn test_lookup_failure_is_terminal() {
    let inner = InMemoryApplicationStore::new();
    inner.upsert(submission("A", 45000.0, "ACC")).unwrap();
    let mut flaky = FlakyStore::new(inner);
    flaky.fail_get = true;

    let pipeline = orchestrator(Arc::new(flaky), clear_registry());
    let outcome = pipeline.process(VerificationJob::new("A", "/missing")).await;

    assert!(!outcome.is_success());
    assert_eq!(pipeline.metrics().jobs_failed.load(std::sync::atomic::Ordering::Relaxed), 1);
}

#[tokio::test]
async fn test_out_of_range_income_degrades_extraction() {
    let dir = tempdir().unwrap();
    let store = Arc::new(InMemoryApplicationStore::new());
    store.upsert(submission("A", 45000.0, "ACC-A")).unwrap();
    let huge = document(dir.path(), "huge.txt", &"9".repeat(400));
    let large = document(dir.path(), "large.txt", &"9".repeat(300));

    let pipeline = orchestrator(store.clone(), clear_registry());
    let outcome = pipeline.process(VerificationJob::new("A", huge)).await;
    let json = serde_json::to_value(&outcome).unwrap();
    let degraded = report(outcome);

    assert_eq!(degraded.extracted_income, 0.0);
    assert_eq!(json["extracted_income"], serde_json::json!(0.0));
    assert!(!degraded.signals.contains(&SignalKind::IncomeMismatch));
    assert_eq!(
        pipeline.metrics().get_degraded_stages().get(stage::OCR),
        Some(&1)
    );

    // a finite but enormous figure still scores as the largest mismatch
    let flagged = report(pipeline.process(VerificationJob::new("A", large)).await);
    assert!(flagged.signals.contains(&SignalKind::IncomeMismatch));
    assert!(flagged.anomaly_probability > 0.99);
}
