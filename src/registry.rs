//! Cross-check against the external high-value asset registry.
//!
//! Every outcome, including transport failures and timeouts, is a
//! [`RegistryCheck`] value; the orchestrator decides what each one means for
//! the score.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Outcome of one registry lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryCheck {
    /// A high-value asset is registered to the applicant
    Flagged { detail: String },
    /// The registry answered with nothing of concern
    Clear { detail: String },
    /// No answer within the deadline
    TimedOut,
    /// Transport error or unusable response
    Failed { cause: String },
}

impl RegistryCheck {
    /// Flag and detail as seen by callers that only care about the verdict;
    /// failures read as "no asset / unknown".
    pub fn verdict(&self) -> (bool, &str) {
        match self {
            RegistryCheck::Flagged { detail } => (true, detail.as_str()),
            RegistryCheck::Clear { detail } => (false, detail.as_str()),
            RegistryCheck::TimedOut | RegistryCheck::Failed { .. } => (false, "unknown"),
        }
    }

    /// The registry could not be consulted
    pub fn is_degraded(&self) -> bool {
        matches!(self, RegistryCheck::TimedOut | RegistryCheck::Failed { .. })
    }
}

/// Client for the asset registry
#[async_trait]
pub trait RegistryClient: Send + Sync {
    async fn check(&self, applicant_id: &str) -> RegistryCheck;
}

#[derive(Debug, Deserialize)]
struct RegistryResponse {
    has_luxury_vehicle: bool,
    #[serde(default)]
    vehicle_details: String,
}

/// HTTP client for the registry's `rto-check` endpoint
#[derive(Clone)]
pub struct HttpRegistryClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRegistryClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/mock-api/rto-check", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn check(&self, applicant_id: &str) -> RegistryCheck {
        let response = match self
            .client
            .get(&self.endpoint)
            .query(&[("aadhaar_id", applicant_id)])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return RegistryCheck::TimedOut,
            Err(e) => {
                return RegistryCheck::Failed {
                    cause: e.to_string(),
                }
            }
        };

        let status = response.status();
        if !status.is_success() {
            return RegistryCheck::Failed {
                cause: format!("registry returned {status}"),
            };
        }

        match response.json::<RegistryResponse>().await {
            Ok(body) => {
                debug!(
                    applicant_id = %applicant_id,
                    flagged = body.has_luxury_vehicle,
                    "Registry cross-check answered"
                );
                if body.has_luxury_vehicle {
                    RegistryCheck::Flagged {
                        detail: body.vehicle_details,
                    }
                } else {
                    RegistryCheck::Clear {
                        detail: body.vehicle_details,
                    }
                }
            }
            Err(e) if e.is_timeout() => RegistryCheck::TimedOut,
            Err(e) => RegistryCheck::Failed {
                cause: format!("invalid registry response: {e}"),
            },
        }
    }
}
