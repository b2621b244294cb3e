//! Anomaly scoring over engineered application features.
//!
//! A fixed-parameter logistic model maps the income gap and ring membership to a
//! fraud probability. Both feature terms have non-negative weights, so the output
//! never decreases as the income gap or the ring size grows.

use crate::config::AnomalyConfig;
use thiserror::Error;

/// Version of the [`AnomalyFeatures`] layout the model was fitted against
pub const FEATURE_VERSION: u32 = 1;

/// Model input, one value per engineered feature
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnomalyFeatures {
    pub stated_income: f64,
    pub extracted_income: f64,
    pub ring_flag_count: usize,
}

impl AnomalyFeatures {
    pub fn new(stated_income: f64, extracted_income: f64, ring_flag_count: usize) -> Self {
        Self {
            stated_income,
            extracted_income,
            ring_flag_count,
        }
    }

    /// Under-reported income; zero when extraction failed or nothing was hidden
    pub fn income_gap(&self) -> f64 {
        let stated = finite_or_zero(self.stated_income);
        let extracted = finite_or_zero(self.extracted_income);
        if extracted <= 0.0 {
            return 0.0;
        }
        (extracted - stated).max(0.0)
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Invalid model parameters
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("{name} must be a finite, non-negative number (got {value})")]
    InvalidWeight { name: &'static str, value: f64 },
    #[error("mismatch_scale must be positive (got {0})")]
    InvalidScale(f64),
    #[error("bias must be finite (got {0})")]
    InvalidBias(f64),
}

/// Deterministic fraud-probability model
#[derive(Debug, Clone)]
pub struct AnomalyScorer {
    bias: f64,
    mismatch_weight: f64,
    mismatch_scale: f64,
    ring_weight: f64,
}

impl AnomalyScorer {
    /// Build a scorer, rejecting parameters that would break monotonicity
    pub fn new(config: &AnomalyConfig) -> Result<Self, ModelError> {
        if !config.bias.is_finite() {
            return Err(ModelError::InvalidBias(config.bias));
        }
        for (name, value) in [
            ("mismatch_weight", config.mismatch_weight),
            ("ring_weight", config.ring_weight),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ModelError::InvalidWeight { name, value });
            }
        }
        if !config.mismatch_scale.is_finite() || config.mismatch_scale <= 0.0 {
            return Err(ModelError::InvalidScale(config.mismatch_scale));
        }

        Ok(Self {
            bias: config.bias,
            mismatch_weight: config.mismatch_weight,
            mismatch_scale: config.mismatch_scale,
            ring_weight: config.ring_weight,
        })
    }

    pub fn feature_version(&self) -> u32 {
        FEATURE_VERSION
    }

    /// Fraud probability in [0, 1]
    pub fn score(&self, features: &AnomalyFeatures) -> f64 {
        let gap_term = (features.income_gap() / self.mismatch_scale).ln_1p();
        let ring_term = (features.ring_flag_count as f64).ln_1p();

        let logit = self.bias + self.mismatch_weight * gap_term + self.ring_weight * ring_term;
        sigmoid(logit).clamp(0.0, 1.0)
    }

    /// Probability expressed as a 0..=100 score contribution
    pub fn contribution(probability: f64) -> u32 {
        (probability.clamp(0.0, 1.0) * 100.0).round() as u32
    }
}

impl Default for AnomalyScorer {
    fn default() -> Self {
        let config = AnomalyConfig::default();
        Self {
            bias: config.bias,
            mismatch_weight: config.mismatch_weight,
            mismatch_scale: config.mismatch_scale,
            ring_weight: config.ring_weight,
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
