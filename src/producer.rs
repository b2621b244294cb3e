//! NATS publisher for terminal job outcomes

use crate::types::JobOutcome;
use crate::worker::OutcomeSink;
use anyhow::Result;
use async_nats::Client;
use async_trait::async_trait;
use tracing::debug;

/// Publishes every [`JobOutcome`] as JSON on the outcome subject
#[derive(Clone)]
pub struct OutcomePublisher {
    client: Client,
    subject: String,
}

impl OutcomePublisher {
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

#[async_trait]
impl OutcomeSink for OutcomePublisher {
    async fn publish(&self, outcome: &JobOutcome) -> Result<()> {
        let payload = serde_json::to_vec(outcome)?;

        self.client
            .publish(self.subject.clone(), payload.into())
            .await?;

        debug!(
            job_id = %outcome.job_id(),
            applicant_id = %outcome.applicant_id(),
            success = outcome.is_success(),
            "Published job outcome"
        );

        Ok(())
    }
}
