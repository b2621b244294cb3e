//! Shared fakes and fixtures for the integration tests
#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use welfare_fraud_pipeline::config::AppConfig;
use welfare_fraud_pipeline::detection::LinkRecord;
use welfare_fraud_pipeline::error::StoreError;
use welfare_fraud_pipeline::extractor::{RecognitionError, TextRecognizer};
use welfare_fraud_pipeline::metrics::PipelineMetrics;
use welfare_fraud_pipeline::registry::{RegistryCheck, RegistryClient};
use welfare_fraud_pipeline::store::{
    ApplicationStore, InMemoryApplicationStore, MergeOutcome, StoreSummary,
};
use welfare_fraud_pipeline::types::{Application, ApplicationSubmission, JobOutcome, Signal};
use welfare_fraud_pipeline::worker::OutcomeSink;
use welfare_fraud_pipeline::Orchestrator;

/// Recognizer that "reads" the document by returning its text content
pub struct FileText;

#[async_trait]
impl TextRecognizer for FileText {
    async fn recognize(&self, path: &Path) -> Result<String, RecognitionError> {
        Ok(tokio::fs::read_to_string(path).await?)
    }
}

/// Registry that always answers the same way
pub struct FixedRegistry(pub RegistryCheck);

#[async_trait]
impl RegistryClient for FixedRegistry {
    async fn check(&self, _applicant_id: &str) -> RegistryCheck {
        self.0.clone()
    }
}

pub fn clear_registry() -> Arc<FixedRegistry> {
    Arc::new(FixedRegistry(RegistryCheck::Clear {
        detail: "No luxury vehicles found".to_string(),
    }))
}

/// Registry that never answers within any reasonable timeout
pub struct HangingRegistry;

#[async_trait]
impl RegistryClient for HangingRegistry {
    async fn check(&self, _applicant_id: &str) -> RegistryCheck {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        RegistryCheck::Flagged {
            detail: "answer arrived too late".to_string(),
        }
    }
}

/// Store wrapper that can fail selected operations
pub struct FlakyStore {
    pub inner: InMemoryApplicationStore,
    pub fail_scan: bool,
    pub fail_merge: bool,
    pub fail_get: bool,
}

impl FlakyStore {
    pub fn new(inner: InMemoryApplicationStore) -> Self {
        Self {
            inner,
            fail_scan: false,
            fail_merge: false,
            fail_get: false,
        }
    }
}

impl ApplicationStore for FlakyStore {
    fn get(&self, applicant_id: &str) -> Result<Option<Application>, StoreError> {
        if self.fail_get {
            return Err(StoreError::Backend("database is locked".to_string()));
        }
        self.inner.get(applicant_id)
    }

    fn upsert(&self, submission: ApplicationSubmission) -> Result<Application, StoreError> {
        self.inner.upsert(submission)
    }

    fn merge_score(
        &self,
        applicant_id: &str,
        job_id: &str,
        signals: &[Signal],
    ) -> Result<MergeOutcome, StoreError> {
        if self.fail_merge {
            return Err(StoreError::Backend("disk I/O error".to_string()));
        }
        self.inner.merge_score(applicant_id, job_id, signals)
    }

    fn scan_link_records(&self) -> Result<Vec<LinkRecord>, StoreError> {
        if self.fail_scan {
            return Err(StoreError::Backend("scan interrupted".to_string()));
        }
        self.inner.scan_link_records()
    }

    fn summary(&self, flag_threshold: u8) -> Result<StoreSummary, StoreError> {
        self.inner.summary(flag_threshold)
    }

    fn prune_applied_jobs(&self, applied_before: DateTime<Utc>) -> Result<usize, StoreError> {
        self.inner.prune_applied_jobs(applied_before)
    }
}

/// Sink that keeps every published outcome
#[derive(Default)]
pub struct CollectingSink(pub Mutex<Vec<JobOutcome>>);

impl CollectingSink {
    pub fn outcomes(&self) -> Vec<JobOutcome> {
        self.0.lock().unwrap().clone()
    }
}

#[async_trait]
impl OutcomeSink for CollectingSink {
    async fn publish(&self, outcome: &JobOutcome) -> Result<()> {
        self.0.lock().unwrap().push(outcome.clone());
        Ok(())
    }
}

pub fn submission(applicant_id: &str, stated_income: f64, account: &str) -> ApplicationSubmission {
    ApplicationSubmission {
        applicant_id: applicant_id.to_string(),
        name: format!("Applicant {applicant_id}"),
        stated_income,
        financial_account: account.to_string(),
        asset_registration: String::new(),
    }
}

/// Write an income certificate whose recognized text is `text`
pub fn document(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, text).unwrap();
    path
}

pub fn orchestrator(
    store: Arc<dyn ApplicationStore>,
    registry: Arc<dyn RegistryClient>,
) -> Orchestrator {
    Orchestrator::new(
        &AppConfig::default(),
        store,
        Arc::new(FileText),
        registry,
        Arc::new(PipelineMetrics::new()),
    )
    .unwrap()
}
