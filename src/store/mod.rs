//! Application store abstraction.
//!
//! Workers never share in-process collections; all shared state goes through an
//! [`ApplicationStore`], which provides an atomic per-applicant score merge and a
//! tolerant full scan for ring detection.

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryApplicationStore;
pub use sqlite::SqliteApplicationStore;

use crate::detection::LinkRecord;
use crate::error::StoreError;
use crate::types::{Application, ApplicationSubmission, Signal};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Benefit amount withheld for each flagged application, used in summaries
pub const BENEFIT_PER_APPLICATION: f64 = 1_500.0;

/// Result of a score merge
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    /// Signals were fused and committed
    Applied(Application),
    /// The job id was merged before; the stored record is returned unchanged
    AlreadyApplied(Application),
}

impl MergeOutcome {
    pub fn application(&self) -> &Application {
        match self {
            MergeOutcome::Applied(app) | MergeOutcome::AlreadyApplied(app) => app,
        }
    }

    pub fn into_application(self) -> Application {
        match self {
            MergeOutcome::Applied(app) | MergeOutcome::AlreadyApplied(app) => app,
        }
    }

    pub fn was_redelivery(&self) -> bool {
        matches!(self, MergeOutcome::AlreadyApplied(_))
    }
}

/// Aggregate view of the store for reporting
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StoreSummary {
    pub total_applications: u64,
    /// Score above the flag threshold
    pub flagged_applications: u64,
    pub cleared_applications: u64,
    pub funds_saved: f64,
}

impl StoreSummary {
    pub fn new(total_applications: u64, flagged_applications: u64) -> Self {
        Self {
            total_applications,
            flagged_applications,
            cleared_applications: total_applications.saturating_sub(flagged_applications),
            funds_saved: flagged_applications as f64 * BENEFIT_PER_APPLICATION,
        }
    }
}

/// Durable record of applications and their fraud assessment
pub trait ApplicationStore: Send + Sync {
    /// Fetch one application by identity
    fn get(&self, applicant_id: &str) -> Result<Option<Application>, StoreError>;

    /// Create an application, or refresh the declared fields of an existing one
    fn upsert(&self, submission: ApplicationSubmission) -> Result<Application, StoreError>;

    /// Atomically fuse `signals` into the stored score and justification.
    ///
    /// Serialized per applicant. A `job_id` that was already merged for this
    /// applicant is not applied again.
    fn merge_score(
        &self,
        applicant_id: &str,
        job_id: &str,
        signals: &[Signal],
    ) -> Result<MergeOutcome, StoreError>;

    /// Identity and linking attributes of every stored application
    fn scan_link_records(&self) -> Result<Vec<LinkRecord>, StoreError>;

    /// Totals split at `flag_threshold`
    fn summary(&self, flag_threshold: u8) -> Result<StoreSummary, StoreError>;

    /// Forget merged job ids recorded before `applied_before`. A job
    /// redelivered after its entry is pruned is merged again.
    fn prune_applied_jobs(&self, applied_before: DateTime<Utc>) -> Result<usize, StoreError>;
}

/// Periodically forgets merged job ids older than the retention window
pub struct AppliedJobPruner {
    store: Arc<dyn ApplicationStore>,
    retention: Duration,
    interval: Duration,
}

impl AppliedJobPruner {
    pub fn new(store: Arc<dyn ApplicationStore>, retention: Duration, interval: Duration) -> Self {
        Self {
            store,
            retention,
            interval,
        }
    }

    /// Prune once; returns the number of job ids removed
    pub async fn prune_once(&self) -> Result<usize, StoreError> {
        let retention = chrono::Duration::from_std(self.retention)
            .map_err(|e| StoreError::Backend(format!("invalid retention: {e}")))?;
        let cutoff = Utc::now() - retention;
        let store = Arc::clone(&self.store);

        tokio::task::spawn_blocking(move || store.prune_applied_jobs(cutoff))
            .await
            .map_err(|e| StoreError::Backend(format!("prune task failed: {e}")))?
    }

    /// Start the periodic pruning task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(self.interval.max(Duration::from_secs(1)));
        loop {
            interval.tick().await;
            match self.prune_once().await {
                Ok(0) => {}
                Ok(removed) => info!(removed = removed, "Pruned expired applied job ids"),
                Err(e) => warn!(error = %e, "Failed to prune applied job ids"),
            }
        }
    }
}
