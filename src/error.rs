//! Error types shared by the store and the pipeline orchestrator.

use thiserror::Error;

/// Failure raised by an [`ApplicationStore`](crate::store::ApplicationStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("application {0} not found")]
    NotFound(String),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("stored justification could not be decoded: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("store lock poisoned")]
    Poisoned,
    #[error("store unavailable: {0}")]
    Backend(String),
}

/// Terminal job failures. Everything else degrades to "no signal".
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("applicant not found: {0}")]
    ApplicantNotFound(String),
    #[error("failed to load applicant: {0}")]
    Lookup(#[source] StoreError),
    #[error("failed to persist score: {0}")]
    Persistence(#[source] StoreError),
}
