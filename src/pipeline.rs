//! Pipeline orchestrator: runs every detection stage for one verification job
//! and commits the fused score.
//!
//! Stage policy:
//! - applicant lookup and the final merge are the only terminal failures
//! - OCR, registry, and ring scan failures degrade to "no signal"
//! - the registry call is bounded by a hard timeout regardless of client

use crate::config::AppConfig;
use crate::detection::{AnomalyFeatures, AnomalyScorer, IncomeMismatchRule, ModelError, RingDetector};
use crate::error::{PipelineError, StoreError};
use crate::extractor::{DocumentTextExtractor, TextRecognizer};
use crate::metrics::{stage, PipelineMetrics};
use crate::registry::{RegistryCheck, RegistryClient};
use crate::store::ApplicationStore;
use crate::types::{JobOutcome, JobReport, Signal, SignalKind, VerificationJob};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Sequences the detection stages for one job at a time
pub struct Orchestrator {
    store: Arc<dyn ApplicationStore>,
    extractor: DocumentTextExtractor,
    registry: Arc<dyn RegistryClient>,
    registry_timeout: Duration,
    mismatch: IncomeMismatchRule,
    registry_contribution: u32,
    ring_detector: RingDetector,
    ring_contribution: u32,
    scorer: AnomalyScorer,
    anomaly_reason_threshold: u32,
    metrics: Arc<PipelineMetrics>,
}

impl Orchestrator {
    /// Wire the orchestrator from configuration and its collaborators
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn ApplicationStore>,
        recognizer: Arc<dyn TextRecognizer>,
        registry: Arc<dyn RegistryClient>,
        metrics: Arc<PipelineMetrics>,
    ) -> Result<Self, ModelError> {
        let detection = &config.detection;
        let scorer = AnomalyScorer::new(&config.anomaly)?;

        info!(
            feature_version = scorer.feature_version(),
            ring_threshold = detection.ring_threshold,
            ring_attributes = ?detection.ring_attributes,
            registry_timeout_ms = config.registry.timeout_ms,
            "Orchestrator initialized"
        );

        Ok(Self {
            store,
            extractor: DocumentTextExtractor::new(recognizer),
            registry,
            registry_timeout: config.registry.timeout(),
            mismatch: IncomeMismatchRule::new(
                detection.mismatch_threshold,
                detection.mismatch_contribution,
            ),
            registry_contribution: detection.registry_contribution,
            ring_detector: RingDetector::new(
                detection.ring_attributes.iter().copied(),
                detection.ring_threshold,
            ),
            ring_contribution: detection.ring_contribution,
            scorer,
            anomaly_reason_threshold: detection.anomaly_reason_threshold,
            metrics,
        })
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    /// Process one job to a terminal outcome. Never fails and never panics on
    /// collaborator errors; every error is reported in the returned outcome.
    pub async fn process(&self, job: VerificationJob) -> JobOutcome {
        let start = Instant::now();

        match self.run(&job).await {
            Ok(report) => {
                let elapsed = start.elapsed();
                self.metrics.record_success(
                    elapsed,
                    report.fraud_score,
                    &report.signals,
                    report.redelivered,
                );
                info!(
                    job_id = %report.job_id,
                    applicant_id = %report.applicant_id,
                    fraud_score = report.fraud_score,
                    extracted_income = report.extracted_income,
                    anomaly_probability = report.anomaly_probability,
                    rings_flagged_count = report.rings_flagged_count,
                    redelivered = report.redelivered,
                    processing_time_us = elapsed.as_micros(),
                    "Verification job completed"
                );
                JobOutcome::Success(report)
            }
            Err(e) => {
                self.metrics.record_failure(start.elapsed());
                error!(
                    job_id = %job.job_id,
                    applicant_id = %job.applicant_id,
                    error = %e,
                    "Verification job failed"
                );
                JobOutcome::Error {
                    job_id: job.job_id,
                    applicant_id: job.applicant_id,
                    message: e.to_string(),
                }
            }
        }
    }

    async fn run(&self, job: &VerificationJob) -> Result<JobReport, PipelineError> {
        // 1. Applicant lookup
        let applicant_id = job.applicant_id.clone();
        let application = self
            .on_store(move |store| store.get(&applicant_id))
            .await
            .map_err(PipelineError::Lookup)?
            .ok_or_else(|| PipelineError::ApplicantNotFound(job.applicant_id.clone()))?;

        let mut signals: Vec<Signal> = Vec::with_capacity(4);

        // 2. Document extraction
        let extraction = self.extractor.extract(&job.document_path).await;
        if extraction.is_degraded() {
            self.metrics.record_degraded(stage::OCR);
        }

        // 3. Income mismatch
        if let Some(signal) = self
            .mismatch
            .evaluate(application.stated_income, extraction.income)
        {
            signals.push(signal);
        }

        // 4. Registry cross-check
        if let Some(signal) = self.cross_check_registry(&job.applicant_id).await {
            signals.push(signal);
        }

        // 5. Ring detection
        let (rings_flagged_count, ring_signal) = self.detect_ring(&job.applicant_id).await;
        signals.extend(ring_signal);

        // 6. Anomaly score
        let features = AnomalyFeatures::new(
            application.stated_income,
            extraction.income,
            rings_flagged_count,
        );
        let anomaly_probability = self.scorer.score(&features);
        let anomaly = self.anomaly_signal(anomaly_probability);
        if !anomaly.is_noop() {
            signals.push(anomaly);
        }

        for signal in &signals {
            debug!(
                job_id = %job.job_id,
                signal = %signal.kind,
                contribution = signal.contribution,
                reason = signal.reason.as_deref().unwrap_or(""),
                "Signal produced"
            );
        }
        let fired: Vec<SignalKind> = signals.iter().map(|signal| signal.kind).collect();

        // 7. Fusion and persistence
        let applicant_id = job.applicant_id.clone();
        let job_id = job.job_id.clone();
        let merged = self
            .on_store(move |store| store.merge_score(&applicant_id, &job_id, &signals))
            .await
            .map_err(PipelineError::Persistence)?;

        if merged.was_redelivery() {
            warn!(
                job_id = %job.job_id,
                applicant_id = %job.applicant_id,
                "Job was already merged; skipped duplicate delivery"
            );
        }

        Ok(JobReport {
            job_id: job.job_id.clone(),
            applicant_id: job.applicant_id.clone(),
            extracted_income: extraction.income,
            anomaly_probability,
            rings_flagged_count,
            fraud_score: merged.application().fraud_score,
            signals: fired,
            redelivered: merged.was_redelivery(),
        })
    }

    /// Registry lookup bounded by the configured timeout; fail-open
    async fn cross_check_registry(&self, applicant_id: &str) -> Option<Signal> {
        let check = tokio::time::timeout(self.registry_timeout, self.registry.check(applicant_id))
            .await
            .unwrap_or(RegistryCheck::TimedOut);

        match check {
            RegistryCheck::Flagged { detail } => Some(Signal::new(
                SignalKind::RegistryAsset,
                self.registry_contribution,
                detail,
            )),
            RegistryCheck::Clear { .. } => None,
            RegistryCheck::TimedOut => {
                warn!(
                    applicant_id = %applicant_id,
                    timeout_ms = self.registry_timeout.as_millis(),
                    "Registry cross-check timed out, continuing without it"
                );
                self.metrics.record_degraded(stage::REGISTRY);
                None
            }
            RegistryCheck::Failed { cause } => {
                warn!(
                    applicant_id = %applicant_id,
                    error = %cause,
                    "Registry cross-check failed, continuing without it"
                );
                self.metrics.record_degraded(stage::REGISTRY);
                None
            }
        }
    }

    /// Fresh full-store ring scan; returns the applicant's ring size and signal
    async fn detect_ring(&self, applicant_id: &str) -> (usize, Option<Signal>) {
        let records = match self.on_store(|store| store.scan_link_records()).await {
            Ok(records) => records,
            Err(e) => {
                warn!(
                    applicant_id = %applicant_id,
                    error = %e,
                    "Ring scan failed, continuing without it"
                );
                self.metrics.record_degraded(stage::RING_SCAN);
                return (0, None);
            }
        };

        let report = self.ring_detector.detect(&records);
        let count = report.flag_count_for(applicant_id);
        if count == 0 {
            return (0, None);
        }

        let signal = Signal::new(SignalKind::FraudRing, self.ring_contribution, self.ring_reason());
        (count, Some(signal))
    }

    /// Ring reason text. Independent of the ring's current size so a growing
    /// ring keeps a single justification entry; the size goes in the report.
    fn ring_reason(&self) -> String {
        format!(
            "Fraud ring: shares a {} with {} or more other applications",
            self.ring_detector.describe_attributes(),
            self.ring_detector.threshold().saturating_sub(1)
        )
    }

    fn anomaly_signal(&self, probability: f64) -> Signal {
        let contribution = AnomalyScorer::contribution(probability);
        if contribution > self.anomaly_reason_threshold {
            Signal::new(
                SignalKind::Anomaly,
                contribution,
                format!(
                    "Anomaly model flagged composite risk (confidence: {:.2})",
                    probability
                ),
            )
        } else {
            Signal::silent(SignalKind::Anomaly, contribution)
        }
    }

    /// Run a blocking store operation off the async workers
    async fn on_store<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&dyn ApplicationStore) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || op(store.as_ref()))
            .await
            .map_err(|e| StoreError::Backend(format!("store task failed: {e}")))?
    }
}
