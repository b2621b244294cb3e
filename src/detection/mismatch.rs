//! Income cross-check between the stated and the document-extracted income

use crate::types::signal::{Signal, SignalKind};

/// Flags applicants whose certificate shows much more income than they declared
#[derive(Debug, Clone)]
pub struct IncomeMismatchRule {
    /// Absolute gap (extracted - stated) that must be exceeded
    threshold: f64,
    contribution: u32,
}

impl IncomeMismatchRule {
    pub fn new(threshold: f64, contribution: u32) -> Self {
        Self {
            threshold,
            contribution,
        }
    }

    /// Signal when extraction succeeded and under-reporting exceeds the threshold
    pub fn evaluate(&self, stated_income: f64, extracted_income: f64) -> Option<Signal> {
        if extracted_income <= 0.0 || !extracted_income.is_finite() {
            return None;
        }

        if extracted_income - stated_income > self.threshold {
            Some(Signal::new(
                SignalKind::IncomeMismatch,
                self.contribution,
                format!(
                    "OCR income mismatch (stated: {}, extracted: {})",
                    stated_income, extracted_income
                ),
            ))
        } else {
            None
        }
    }
}

impl Default for IncomeMismatchRule {
    fn default() -> Self {
        Self::new(10_000.0, 40)
    }
}
