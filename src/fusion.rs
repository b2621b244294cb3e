//! Score fusion: merges a run's signals into the stored score and justification.
//!
//! Scores accumulate across runs. Re-running the pipeline for an unchanged
//! applicant adds that run's contributions again (bounded at 100), while the
//! justification stays free of duplicates. Redelivery of the *same* job is
//! filtered out by the store using the job id before this function runs.

use crate::types::application::MAX_FRAUD_SCORE;
use crate::types::signal::Signal;

/// Result of merging one run's signals
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fused {
    pub score: u8,
    pub justification: Vec<String>,
    /// Sum of this run's contributions before clamping
    pub added: u32,
}

/// Merge `signals` into an existing (score, justification) pair.
///
/// `score = min(100, current + Σ contribution)`; reasons are appended in signal
/// order, skipping any exact string already present.
pub fn fuse(current_score: u8, current_justification: &[String], signals: &[Signal]) -> Fused {
    let added = signals
        .iter()
        .fold(0u32, |acc, signal| acc.saturating_add(signal.contribution));

    let score = u32::from(current_score)
        .saturating_add(added)
        .min(u32::from(MAX_FRAUD_SCORE)) as u8;

    let mut justification: Vec<String> =
        Vec::with_capacity(current_justification.len() + signals.len());
    for reason in current_justification {
        push_unique(&mut justification, reason);
    }
    for reason in signals.iter().filter_map(|signal| signal.reason.as_deref()) {
        push_unique(&mut justification, reason);
    }

    Fused {
        score,
        justification,
        added,
    }
}

fn push_unique(justification: &mut Vec<String>, reason: &str) {
    if reason.is_empty() || justification.iter().any(|existing| existing == reason) {
        return;
    }
    justification.push(reason.to_string());
}
