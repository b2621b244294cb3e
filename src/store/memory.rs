//! In-process store used by tests and dry runs

use crate::detection::LinkRecord;
use crate::error::StoreError;
use crate::fusion;
use crate::store::{ApplicationStore, MergeOutcome, StoreSummary};
use crate::types::{Application, ApplicationSubmission, Signal};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

#[derive(Debug, Default)]
struct MemoryState {
    records: BTreeMap<String, Application>,
    /// (applicant, job) -> time of the merge
    applied_jobs: HashMap<(String, String), DateTime<Utc>>,
}

/// [`ApplicationStore`] backed by a lock-guarded map
#[derive(Debug, Default)]
pub struct InMemoryApplicationStore {
    state: RwLock<MemoryState>,
}

impl InMemoryApplicationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully-formed record, replacing any existing one
    pub fn insert(&self, application: Application) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;
        state
            .records
            .insert(application.applicant_id.clone(), application);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.state.read().map(|s| s.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ApplicationStore for InMemoryApplicationStore {
    fn get(&self, applicant_id: &str) -> Result<Option<Application>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.records.get(applicant_id).cloned())
    }

    fn upsert(&self, submission: ApplicationSubmission) -> Result<Application, StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;
        let record = match state.records.get_mut(&submission.applicant_id) {
            Some(existing) => {
                existing.apply_submission(submission);
                existing.clone()
            }
            None => {
                let created = Application::from_submission(submission);
                state
                    .records
                    .insert(created.applicant_id.clone(), created.clone());
                created
            }
        };
        Ok(record)
    }

    fn merge_score(
        &self,
        applicant_id: &str,
        job_id: &str,
        signals: &[Signal],
    ) -> Result<MergeOutcome, StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;
        let MemoryState {
            records,
            applied_jobs,
        } = &mut *state;

        let record = records
            .get_mut(applicant_id)
            .ok_or_else(|| StoreError::NotFound(applicant_id.to_string()))?;

        let key = (applicant_id.to_string(), job_id.to_string());
        if applied_jobs.contains_key(&key) {
            return Ok(MergeOutcome::AlreadyApplied(record.clone()));
        }
        applied_jobs.insert(key, Utc::now());

        let fused = fusion::fuse(record.fraud_score, &record.justification, signals);
        record.fraud_score = fused.score;
        record.justification = fused.justification;
        record.updated_at = Utc::now();

        Ok(MergeOutcome::Applied(record.clone()))
    }

    fn scan_link_records(&self) -> Result<Vec<LinkRecord>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state
            .records
            .values()
            .map(|app| LinkRecord {
                applicant_id: app.applicant_id.clone(),
                financial_account: app.financial_account.clone(),
                asset_registration: app.asset_registration.clone(),
            })
            .collect())
    }

    fn summary(&self, flag_threshold: u8) -> Result<StoreSummary, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        let total = state.records.len() as u64;
        let flagged = state
            .records
            .values()
            .filter(|app| app.is_flagged(flag_threshold))
            .count() as u64;
        Ok(StoreSummary::new(total, flagged))
    }

    fn prune_applied_jobs(&self, applied_before: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;
        let before = state.applied_jobs.len();
        state
            .applied_jobs
            .retain(|_, applied_at| *applied_at >= applied_before);
        Ok(before - state.applied_jobs.len())
    }
}
