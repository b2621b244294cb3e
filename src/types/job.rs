//! Verification jobs and their terminal outcomes

use crate::types::signal::SignalKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn new_job_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// One queued request to verify an application against its income document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationJob {
    /// Delivery-independent job identifier; redeliveries reuse it
    #[serde(default = "new_job_id")]
    pub job_id: String,

    /// Identity of the stored application
    #[serde(alias = "aadhaar_id")]
    pub applicant_id: String,

    /// Scanned income certificate on local disk
    #[serde(alias = "image_path")]
    pub document_path: PathBuf,
}

impl VerificationJob {
    pub fn new(applicant_id: impl Into<String>, document_path: impl Into<PathBuf>) -> Self {
        Self {
            job_id: new_job_id(),
            applicant_id: applicant_id.into(),
            document_path: document_path.into(),
        }
    }
}

/// Computed signals of a successful job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobReport {
    pub job_id: String,
    pub applicant_id: String,
    pub extracted_income: f64,
    pub anomaly_probability: f64,
    pub rings_flagged_count: usize,
    /// Score committed to the store after fusion
    pub fraud_score: u8,
    /// Stages that contributed to the score in this run
    pub signals: Vec<SignalKind>,
    /// True when the job id had already been merged and nothing was written
    #[serde(default)]
    pub redelivered: bool,
}

/// Terminal result of one job, published to the reporting layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum JobOutcome {
    Success(JobReport),
    Error {
        job_id: String,
        applicant_id: String,
        message: String,
    },
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Success(_))
    }

    pub fn job_id(&self) -> &str {
        match self {
            JobOutcome::Success(report) => &report.job_id,
            JobOutcome::Error { job_id, .. } => job_id,
        }
    }

    pub fn applicant_id(&self) -> &str {
        match self {
            JobOutcome::Success(report) => &report.applicant_id,
            JobOutcome::Error { applicant_id, .. } => applicant_id,
        }
    }
}
