//! Welfare Fraud Pipeline Library
//!
//! Asynchronous fraud scoring for welfare scheme applications: document
//! income extraction, registry cross-checks, fraud-ring detection and an
//! anomaly model, fused into a bounded per-applicant risk score.

pub mod config;
pub mod consumer;
pub mod detection;
pub mod error;
pub mod extractor;
pub mod fusion;
pub mod metrics;
pub mod pipeline;
pub mod producer;
pub mod registry;
pub mod store;
pub mod telemetry;
pub mod types;
pub mod worker;

pub use config::AppConfig;
pub use consumer::JobConsumer;
pub use error::{PipelineError, StoreError};
pub use pipeline::Orchestrator;
pub use producer::OutcomePublisher;
pub use store::{ApplicationStore, InMemoryApplicationStore, SqliteApplicationStore};
pub use types::{Application, ApplicationSubmission, JobOutcome, Signal, SignalKind, VerificationJob};
