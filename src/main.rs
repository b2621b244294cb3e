//! Welfare Fraud Pipeline - Main Entry Point
//!
//! Consumes verification jobs from NATS, scores each applicant, and publishes
//! the job outcomes. Jobs run in parallel on a bounded worker pool.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use welfare_fraud_pipeline::{
    config::AppConfig,
    consumer::JobConsumer,
    extractor::TesseractRecognizer,
    metrics::{MetricsReporter, PipelineMetrics},
    pipeline::Orchestrator,
    producer::OutcomePublisher,
    registry::HttpRegistryClient,
    store::{AppliedJobPruner, ApplicationStore, SqliteApplicationStore},
    telemetry, worker,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;

    // Initialize logging
    telemetry::init(&config.logging)?;

    info!("Starting Welfare Fraud Pipeline");
    info!(
        mismatch_threshold = config.detection.mismatch_threshold,
        ring_threshold = config.detection.ring_threshold,
        flag_threshold = config.detection.flag_threshold,
        "Configuration loaded successfully"
    );

    // Initialize metrics
    let metrics = Arc::new(PipelineMetrics::new());

    // Open the application store
    let store: Arc<dyn ApplicationStore> = Arc::new(
        SqliteApplicationStore::open(&config.store.path, config.store.busy_timeout())
            .with_context(|| format!("Failed to open application store at {}", config.store.path))?,
    );
    info!(path = %config.store.path, "Application store opened");

    // Initialize detection collaborators
    let recognizer = Arc::new(TesseractRecognizer::new(
        config.ocr.tesseract_cmd.clone(),
        config.ocr.timeout(),
    ));
    let registry = Arc::new(
        HttpRegistryClient::new(&config.registry.base_url, config.registry.timeout())
            .context("Failed to build registry client")?,
    );
    info!(endpoint = %registry.endpoint(), "Registry client initialized");

    let orchestrator = Arc::new(Orchestrator::new(
        &config,
        store.clone(),
        recognizer,
        registry,
        metrics.clone(),
    )?);

    // Connect to NATS
    let client = async_nats::connect(&config.nats.url)
        .await
        .with_context(|| format!("Failed to connect to NATS at {}", config.nats.url))?;
    info!("Connected to NATS at {}", config.nats.url);

    // Initialize consumer and producer
    let consumer = JobConsumer::new(client.clone(), &config.nats.job_subject);
    let publisher = Arc::new(OutcomePublisher::new(
        client.clone(),
        &config.nats.outcome_subject,
    ));

    // Start metrics reporter
    let reporter = MetricsReporter::new(metrics.clone(), config.pipeline.report_interval_secs)
        .with_store(store.clone(), config.detection.flag_threshold);
    tokio::spawn(reporter.clone().start());

    // Expire old redelivery markers
    if let Some(retention) = config.store.applied_job_retention() {
        let pruner = AppliedJobPruner::new(store.clone(), retention, Duration::from_secs(3600));
        tokio::spawn(pruner.start());
        info!(
            retention_hours = config.store.applied_job_retention_hours,
            "Applied job pruning enabled"
        );
    }

    info!(
        workers = config.pipeline.workers,
        job_subject = %consumer.subject(),
        outcome_subject = %publisher.subject(),
        "Starting verification job processing"
    );

    let payloads = consumer.payloads().await?;
    worker::run(payloads, orchestrator, publisher, config.pipeline.workers).await;

    // Print final summary
    info!("Pipeline shutting down...");
    let summary = reporter.store_summary().await;
    metrics.print_summary(summary.as_ref());

    Ok(())
}
