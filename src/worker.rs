//! Bounded worker pool draining a stream of job payloads

use crate::pipeline::Orchestrator;
use crate::types::{JobOutcome, VerificationJob};
use anyhow::Result;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// Destination for terminal job outcomes
#[async_trait]
pub trait OutcomeSink: Send + Sync {
    async fn publish(&self, outcome: &JobOutcome) -> Result<()>;
}

/// Counts for one drained stream
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSummary {
    pub received: u64,
    pub dispatched: u64,
    pub malformed: u64,
}

/// Run every payload from `payloads` through the orchestrator with at most
/// `workers` jobs in flight. Returns once the stream ends and every spawned
/// job has published its outcome.
pub async fn run<S, P>(
    mut payloads: S,
    orchestrator: Arc<Orchestrator>,
    sink: Arc<dyn OutcomeSink>,
    workers: usize,
) -> WorkerSummary
where
    S: Stream<Item = P> + Unpin,
    P: AsRef<[u8]>,
{
    let workers = workers.max(1);
    let semaphore = Arc::new(Semaphore::new(workers));
    let processed_count = Arc::new(AtomicU64::new(0));
    let mut summary = WorkerSummary::default();

    while let Some(payload) = payloads.next().await {
        summary.received += 1;

        let job = match serde_json::from_slice::<VerificationJob>(payload.as_ref()) {
            Ok(job) => job,
            Err(e) => {
                summary.malformed += 1;
                orchestrator.metrics().record_malformed();
                warn!(error = %e, "Failed to deserialize verification job");
                continue;
            }
        };

        // Limits concurrent jobs; the pool never closes the semaphore
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                error!(error = %e, "Worker pool closed, dropping job");
                break;
            }
        };
        summary.dispatched += 1;

        let orchestrator = orchestrator.clone();
        let sink = sink.clone();
        let processed_count = processed_count.clone();

        tokio::spawn(async move {
            let outcome = orchestrator.process(job).await;

            if let Err(e) = sink.publish(&outcome).await {
                error!(
                    job_id = %outcome.job_id(),
                    applicant_id = %outcome.applicant_id(),
                    error = %e,
                    "Failed to publish job outcome"
                );
            } else {
                debug!(
                    job_id = %outcome.job_id(),
                    success = outcome.is_success(),
                    "Job outcome published"
                );
            }

            let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;

            // Log progress every 100 jobs
            if count % 100 == 0 {
                let metrics = orchestrator.metrics();
                let processing_stats = metrics.get_processing_stats();
                info!(
                    processed = count,
                    throughput = format!("{:.1} jobs/s", metrics.get_throughput()),
                    avg_latency_us = processing_stats.mean_us,
                    "Processing milestone"
                );
            }

            drop(permit);
        });
    }

    // Wait for in-flight jobs by reclaiming every permit
    let total = u32::try_from(workers).unwrap_or(u32::MAX);
    if let Err(e) = semaphore.acquire_many(total).await {
        error!(error = %e, "Failed to drain worker pool");
    }

    info!(
        received = summary.received,
        dispatched = summary.dispatched,
        malformed = summary.malformed,
        "Job stream drained"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::extractor::{RecognitionError, TextRecognizer};
    use crate::metrics::PipelineMetrics;
    use crate::registry::{RegistryCheck, RegistryClient};
    use crate::store::{ApplicationStore, InMemoryApplicationStore};
    use crate::types::ApplicationSubmission;
    use std::path::Path;
    use std::sync::Mutex;

    struct NoText;

    #[async_trait]
    impl TextRecognizer for NoText {
        async fn recognize(&self, _path: &Path) -> Result<String, RecognitionError> {
            Ok(String::new())
        }
    }

    struct Clear;

    #[async_trait]
    impl RegistryClient for Clear {
        async fn check(&self, _applicant_id: &str) -> RegistryCheck {
            RegistryCheck::Clear {
                detail: "No luxury vehicles found".to_string(),
            }
        }
    }

    #[derive(Default)]
    struct Collect(Mutex<Vec<JobOutcome>>);

    #[async_trait]
    impl OutcomeSink for Collect {
        async fn publish(&self, outcome: &JobOutcome) -> Result<()> {
            self.0.lock().unwrap().push(outcome.clone());
            Ok(())
        }
    }

    struct Refuse;

    #[async_trait]
    impl OutcomeSink for Refuse {
        async fn publish(&self, _outcome: &JobOutcome) -> Result<()> {
            anyhow::bail!("outcome subject unavailable")
        }
    }

    fn orchestrator() -> Arc<Orchestrator> {
        let store = Arc::new(InMemoryApplicationStore::new());
        for id in ["a", "b"] {
            store
                .upsert(ApplicationSubmission {
                    applicant_id: id.to_string(),
                    name: format!("Applicant {id}"),
                    stated_income: 50000.0,
                    financial_account: format!("ACC-{id}"),
                    asset_registration: String::new(),
                })
                .unwrap();
        }
        Arc::new(
            Orchestrator::new(
                &AppConfig::default(),
                store,
                Arc::new(NoText),
                Arc::new(Clear),
                Arc::new(PipelineMetrics::new()),
            )
            .unwrap(),
        )
    }

    fn payload(applicant_id: &str) -> Vec<u8> {
        serde_json::to_vec(&VerificationJob::new(applicant_id, "/nonexistent.png")).unwrap()
    }

    #[tokio::test]
    async fn test_every_job_gets_an_outcome() {
        let orchestrator = orchestrator();
        let sink = Arc::new(Collect::default());
        let payloads = vec![payload("a"), payload("b"), payload("missing")];

        let summary = run(
            futures::stream::iter(payloads),
            orchestrator.clone(),
            sink.clone(),
            2,
        )
        .await;

        assert_eq!(summary.received, 3);
        assert_eq!(summary.dispatched, 3);
        let outcomes = sink.0.lock().unwrap();
        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes.iter().filter(|o| o.is_success()).count(), 2);
        assert_eq!(orchestrator.metrics().jobs_processed(), 3);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_counted_and_skipped() {
        let orchestrator = orchestrator();
        let sink = Arc::new(Collect::default());
        let payloads = vec![b"not json".to_vec(), payload("a"), b"{}".to_vec()];

        let summary = run(
            futures::stream::iter(payloads),
            orchestrator.clone(),
            sink.clone(),
            1,
        )
        .await;

        assert_eq!(summary.malformed, 2);
        assert_eq!(summary.dispatched, 1);
        assert_eq!(sink.0.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_publish_failure_does_not_stop_the_pool() {
        let orchestrator = orchestrator();
        let payloads = vec![payload("a"), payload("b")];

        let summary = run(
            futures::stream::iter(payloads),
            orchestrator.clone(),
            Arc::new(Refuse),
            4,
        )
        .await;

        assert_eq!(summary.dispatched, 2);
        assert_eq!(orchestrator.metrics().jobs_processed(), 2);
    }
}
