//! Welfare scheme application records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound of the persisted fraud score.
pub const MAX_FRAUD_SCORE: u8 = 100;

/// A stored welfare application and its current fraud assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    /// National identity number; unique and immutable once created
    #[serde(alias = "aadhaar_id")]
    pub applicant_id: String,

    /// Declared applicant name
    pub name: String,

    /// Income stated by the applicant (attacker-controlled)
    pub stated_income: f64,

    /// Bank account the benefit is paid into
    #[serde(alias = "bank_account")]
    pub financial_account: String,

    /// Registration number of a declared high-value asset (vehicle plate)
    #[serde(alias = "rto_vehicle_reg_number")]
    pub asset_registration: String,

    /// Fraud score in 0..=100, never decreases
    #[serde(alias = "fraud_probability_score")]
    pub fraud_score: u8,

    /// Deduplicated reasons, oldest first
    #[serde(default)]
    pub justification: Vec<String>,

    /// Last time the record was written
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Application {
    /// Create a fresh, unscored application from a submission
    pub fn from_submission(submission: ApplicationSubmission) -> Self {
        Self {
            applicant_id: submission.applicant_id,
            name: submission.name,
            stated_income: submission.stated_income,
            financial_account: submission.financial_account,
            asset_registration: submission.asset_registration,
            fraud_score: 0,
            justification: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Overwrite the declared fields, keeping the score and justification
    pub fn apply_submission(&mut self, submission: ApplicationSubmission) {
        self.name = submission.name;
        self.stated_income = submission.stated_income;
        self.financial_account = submission.financial_account;
        self.asset_registration = submission.asset_registration;
        self.updated_at = Utc::now();
    }

    /// Whether the score is above the given review threshold
    pub fn is_flagged(&self, threshold: u8) -> bool {
        self.fraud_score > threshold
    }
}

/// Applicant-provided fields accepted by the submission interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationSubmission {
    #[serde(alias = "aadhaar_id")]
    pub applicant_id: String,
    pub name: String,
    pub stated_income: f64,
    #[serde(alias = "bank_account")]
    pub financial_account: String,
    #[serde(alias = "rto_vehicle_reg_number")]
    pub asset_registration: String,
}
