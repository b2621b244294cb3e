//! Data model for the welfare fraud-scoring pipeline

pub mod application;
pub mod job;
pub mod signal;

pub use application::{Application, ApplicationSubmission};
pub use job::{JobOutcome, JobReport, VerificationJob};
pub use signal::{Signal, SignalKind};
