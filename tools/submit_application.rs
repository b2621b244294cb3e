//! Application Submission Tool
//!
//! Records a welfare application in the store and enqueues its verification
//! job on NATS. Returns as soon as the job is published.
//!
//! Usage:
//!   submit_application <store_path> <nats_url> <subject> <aadhaar_id> <name>
//!                      <stated_income> <bank_account> <vehicle_reg> <document_path>

use anyhow::{bail, Context, Result};
use std::time::Duration;
use tracing::{info, warn};
use welfare_fraud_pipeline::store::{ApplicationStore, SqliteApplicationStore};
use welfare_fraud_pipeline::types::{ApplicationSubmission, VerificationJob};

const USAGE: &str = "usage: submit_application <store_path> <nats_url> <subject> <aadhaar_id> <name> <stated_income> <bank_account> <vehicle_reg> <document_path>";

fn required<'a>(args: &'a [String], index: usize, name: &str) -> Result<&'a str> {
    match args.get(index) {
        Some(value) if !value.trim().is_empty() => Ok(value.as_str()),
        _ => bail!("missing argument <{name}>\n{USAGE}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("submit_application=info".parse()?),
        )
        .init();

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let store_path = args.get(1).map(|s| s.as_str()).unwrap_or("welfare_db.sqlite");
    let nats_url = args.get(2).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args
        .get(3)
        .map(|s| s.as_str())
        .unwrap_or("welfare.verification.jobs");

    let submission = ApplicationSubmission {
        applicant_id: required(&args, 4, "aadhaar_id")?.to_string(),
        name: required(&args, 5, "name")?.to_string(),
        stated_income: required(&args, 6, "stated_income")?
            .parse()
            .context("stated_income must be a number")?,
        financial_account: args.get(7).cloned().unwrap_or_default(),
        asset_registration: args.get(8).cloned().unwrap_or_default(),
    };
    let document_path = required(&args, 9, "document_path")?;

    // Record the application
    let store = SqliteApplicationStore::open(store_path, Duration::from_secs(10))
        .with_context(|| format!("Failed to open application store at {store_path}"))?;
    let application = store.upsert(submission)?;
    info!(
        applicant_id = %application.applicant_id,
        stated_income = application.stated_income,
        fraud_score = application.fraud_score,
        "Application recorded"
    );

    let job = VerificationJob::new(application.applicant_id.clone(), document_path);
    let payload = serde_json::to_vec(&job)?;

    // Enqueue the verification job
    let client = match async_nats::connect(nats_url).await {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS; job was not enqueued");
            info!("Job payload:\n{}", serde_json::to_string_pretty(&job)?);
            return Err(e.into());
        }
    };

    client.publish(subject.to_string(), payload.into()).await?;
    client.flush().await?;

    info!(
        job_id = %job.job_id,
        applicant_id = %job.applicant_id,
        subject = %subject,
        "Verification job enqueued"
    );

    Ok(())
}
