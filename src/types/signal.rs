//! Detection signals produced by the pipeline stages

use serde::{Deserialize, Serialize};
use std::fmt;

/// Detection stage that produced a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    IncomeMismatch,
    RegistryAsset,
    FraudRing,
    Anomaly,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::IncomeMismatch => "income_mismatch",
            SignalKind::RegistryAsset => "registry_asset",
            SignalKind::FraudRing => "fraud_ring",
            SignalKind::Anomaly => "anomaly",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Score contribution of one stage plus an optional human-readable reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub kind: SignalKind,
    pub contribution: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Signal {
    /// Signal with a reason to record in the justification
    pub fn new(kind: SignalKind, contribution: u32, reason: impl Into<String>) -> Self {
        Self {
            kind,
            contribution,
            reason: Some(reason.into()),
        }
    }

    /// Signal that only moves the score
    pub fn silent(kind: SignalKind, contribution: u32) -> Self {
        Self {
            kind,
            contribution,
            reason: None,
        }
    }

    /// A zero contribution without a reason changes nothing
    pub fn is_noop(&self) -> bool {
        self.contribution == 0 && self.reason.is_none()
    }
}
