//! Configuration management for the welfare fraud-scoring pipeline

use crate::detection::LinkAttribute;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub store: StoreConfig,
    pub registry: RegistryConfig,
    pub ocr: OcrConfig,
    pub detection: DetectionConfig,
    pub anomaly: AnomalyConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject carrying verification jobs
    pub job_subject: String,
    /// Subject receiving job outcomes
    pub outcome_subject: String,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            job_subject: "welfare.verification.jobs".to_string(),
            outcome_subject: "welfare.verification.outcomes".to_string(),
        }
    }
}

/// Application store configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database file
    pub path: String,
    /// How long a writer waits on a locked database
    pub busy_timeout_ms: u64,
    /// How long merged job ids are kept for redelivery detection; 0 keeps them forever
    pub applied_job_retention_hours: u64,
}

impl StoreConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn applied_job_retention(&self) -> Option<Duration> {
        (self.applied_job_retention_hours > 0)
            .then(|| Duration::from_secs(self.applied_job_retention_hours * 3600))
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "welfare_db.sqlite".to_string(),
            busy_timeout_ms: 10_000,
            applied_job_retention_hours: 720,
        }
    }
}

/// External asset registry configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub base_url: String,
    /// Hard bound on one cross-check round trip
    pub timeout_ms: u64,
}

impl RegistryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            timeout_ms: 5_000,
        }
    }
}

/// Document OCR configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Tesseract executable
    pub tesseract_cmd: String,
    pub timeout_ms: u64,
}

impl OcrConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tesseract_cmd: "tesseract".to_string(),
            timeout_ms: 30_000,
        }
    }
}

/// Detection thresholds and score contributions
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Extracted minus stated income that triggers the mismatch signal
    pub mismatch_threshold: f64,
    pub mismatch_contribution: u32,
    /// Contribution when the registry reports a high-value asset
    pub registry_contribution: u32,
    /// Minimum component size that counts as a ring
    pub ring_threshold: usize,
    pub ring_contribution: u32,
    /// Attributes that link applications into rings
    pub ring_attributes: Vec<LinkAttribute>,
    /// Anomaly contributions above this also record a reason
    pub anomaly_reason_threshold: u32,
    /// Scores above this count as flagged in summaries
    pub flag_threshold: u8,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            mismatch_threshold: 10_000.0,
            mismatch_contribution: 40,
            registry_contribution: 60,
            ring_threshold: 3,
            ring_contribution: 30,
            ring_attributes: vec![LinkAttribute::FinancialAccount],
            anomaly_reason_threshold: 40,
            flag_threshold: 60,
        }
    }
}

/// Fixed parameters of the anomaly model
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    pub bias: f64,
    pub mismatch_weight: f64,
    /// Income gap that counts as one unit of mismatch
    pub mismatch_scale: f64,
    pub ring_weight: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            bias: -4.0,
            mismatch_weight: 1.5,
            mismatch_scale: 10_000.0,
            ring_weight: 1.2,
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum jobs processed concurrently
    pub workers: usize,
    /// Seconds between metrics summaries
    pub report_interval_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            report_interval_secs: 30,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    pub level: String,
    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path, with `WELFARE__*` overrides
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(Environment::with_prefix("WELFARE").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}
