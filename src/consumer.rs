//! NATS consumer for incoming verification jobs

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::{Stream, StreamExt};
use tracing::info;

/// Receives verification jobs from the job subject
pub struct JobConsumer {
    client: Client,
    subject: String,
}

impl JobConsumer {
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Subscribe to the job subject
    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subscriber = self.client.subscribe(self.subject.clone()).await?;
        info!(subject = %self.subject, "Subscribed to verification job subject");
        Ok(subscriber)
    }

    /// Subscribe and yield raw message payloads, ready for the worker pool
    pub async fn payloads(&self) -> Result<impl Stream<Item = Vec<u8>> + Unpin> {
        let subscriber = self.subscribe().await?;
        Ok(subscriber.map(|message| message.payload.to_vec()))
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}
