//! Job throughput, degradation, and score statistics for the pipeline.

use crate::store::{ApplicationStore, StoreSummary};
use crate::types::SignalKind;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Pipeline stage names used when recording degradations
pub mod stage {
    pub const OCR: &str = "ocr";
    pub const REGISTRY: &str = "registry";
    pub const RING_SCAN: &str = "ring_scan";
}

/// Metrics collector shared by all workers
pub struct PipelineMetrics {
    pub jobs_succeeded: AtomicU64,
    pub jobs_failed: AtomicU64,
    /// Payloads that could not be decoded into a job
    pub malformed_payloads: AtomicU64,
    /// Jobs whose id had already been merged
    pub redeliveries: AtomicU64,
    degraded_stages: RwLock<HashMap<&'static str, u64>>,
    signals_fired: RwLock<HashMap<SignalKind, u64>>,
    /// Job latencies in microseconds
    processing_times: RwLock<Vec<u64>>,
    /// Committed scores in buckets of 10
    score_buckets: RwLock<[u64; 10]>,
    start_time: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            jobs_succeeded: AtomicU64::new(0),
            jobs_failed: AtomicU64::new(0),
            malformed_payloads: AtomicU64::new(0),
            redeliveries: AtomicU64::new(0),
            degraded_stages: RwLock::new(HashMap::new()),
            signals_fired: RwLock::new(HashMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a job that committed (or skipped as a redelivery)
    pub fn record_success(
        &self,
        processing_time: Duration,
        fraud_score: u8,
        signals: &[SignalKind],
        redelivered: bool,
    ) {
        self.jobs_succeeded.fetch_add(1, Ordering::Relaxed);
        self.record_latency(processing_time);

        if redelivered {
            self.redeliveries.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let bucket = (usize::from(fraud_score) / 10).min(9);
        if let Ok(mut buckets) = self.score_buckets.write() {
            buckets[bucket] += 1;
        }

        if let Ok(mut fired) = self.signals_fired.write() {
            for kind in signals {
                *fired.entry(*kind).or_insert(0) += 1;
            }
        }
    }

    /// Record a job that ended with an error outcome
    pub fn record_failure(&self, processing_time: Duration) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
        self.record_latency(processing_time);
    }

    pub fn record_malformed(&self) {
        self.malformed_payloads.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a stage that fell back to "no signal"
    pub fn record_degraded(&self, stage: &'static str) {
        if let Ok(mut degraded) = self.degraded_stages.write() {
            *degraded.entry(stage).or_insert(0) += 1;
        }
    }

    fn record_latency(&self, processing_time: Duration) {
        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only the most recent samples
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }
    }

    pub fn jobs_processed(&self) -> u64 {
        self.jobs_succeeded.load(Ordering::Relaxed) + self.jobs_failed.load(Ordering::Relaxed)
    }

    /// Latency percentiles over the retained samples
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let mut sorted = match self.processing_times.read() {
            Ok(times) if !times.is_empty() => times.clone(),
            _ => return ProcessingStats::default(),
        };
        sorted.sort_unstable();

        let count = sorted.len();
        let percentile = |p: f64| sorted[((count as f64 * p) as usize).min(count - 1)];

        ProcessingStats {
            count: count as u64,
            mean_us: sorted.iter().sum::<u64>() / count as u64,
            p50_us: percentile(0.50),
            p95_us: percentile(0.95),
            p99_us: percentile(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Jobs per second since start
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.jobs_processed() as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn get_score_distribution(&self) -> [u64; 10] {
        self.score_buckets.read().map(|b| *b).unwrap_or([0; 10])
    }

    /// Degradations per stage, sorted by stage name
    pub fn get_degraded_stages(&self) -> BTreeMap<&'static str, u64> {
        self.degraded_stages
            .read()
            .map(|d| d.iter().map(|(k, v)| (*k, *v)).collect())
            .unwrap_or_default()
    }

    /// Signals fired per kind, sorted by kind
    pub fn get_signals_fired(&self) -> BTreeMap<SignalKind, u64> {
        self.signals_fired
            .read()
            .map(|s| s.iter().map(|(k, v)| (*k, *v)).collect())
            .unwrap_or_default()
    }

    /// Log a summary, optionally including store totals
    pub fn print_summary(&self, store: Option<&StoreSummary>) {
        let succeeded = self.jobs_succeeded.load(Ordering::Relaxed);
        let failed = self.jobs_failed.load(Ordering::Relaxed);
        let processing = self.get_processing_stats();

        info!(
            jobs_succeeded = succeeded,
            jobs_failed = failed,
            malformed_payloads = self.malformed_payloads.load(Ordering::Relaxed),
            redeliveries = self.redeliveries.load(Ordering::Relaxed),
            throughput = format!("{:.2} jobs/s", self.get_throughput()),
            mean_us = processing.mean_us,
            p50_us = processing.p50_us,
            p95_us = processing.p95_us,
            p99_us = processing.p99_us,
            "Pipeline summary"
        );

        for (stage, count) in self.get_degraded_stages() {
            info!(stage = stage, count = count, "Degraded stage");
        }
        for (kind, count) in self.get_signals_fired() {
            info!(signal = %kind, count = count, "Signals fired");
        }

        let distribution = self.get_score_distribution();
        let total: u64 = distribution.iter().sum();
        for (i, &count) in distribution.iter().enumerate().filter(|&(_, &c)| c > 0) {
            let pct = if total > 0 {
                count as f64 / total as f64 * 100.0
            } else {
                0.0
            };
            let bar = "█".repeat(((pct / 5.0) as usize).min(20));
            info!(
                "score {:>3}-{:<3} {:>6} ({:>5.1}%) {}",
                i * 10,
                i * 10 + 9,
                count,
                pct,
                bar
            );
        }

        if let Some(summary) = store {
            info!(
                total_applications = summary.total_applications,
                flagged = summary.flagged_applications,
                cleared = summary.cleared_applications,
                funds_saved = summary.funds_saved,
                "Application store summary"
            );
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Latency statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Periodically logs the metrics summary
#[derive(Clone)]
pub struct MetricsReporter {
    metrics: Arc<PipelineMetrics>,
    store: Option<Arc<dyn ApplicationStore>>,
    flag_threshold: u8,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<PipelineMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            store: None,
            flag_threshold: 60,
            interval_secs,
        }
    }

    /// Include store totals in each report
    pub fn with_store(mut self, store: Arc<dyn ApplicationStore>, flag_threshold: u8) -> Self {
        self.store = Some(store);
        self.flag_threshold = flag_threshold;
        self
    }

    /// Current store totals, if a store is attached and readable
    pub async fn store_summary(&self) -> Option<StoreSummary> {
        let store = self.store.clone()?;
        let threshold = self.flag_threshold;
        match tokio::task::spawn_blocking(move || store.summary(threshold)).await {
            Ok(Ok(summary)) => Some(summary),
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to summarise application store");
                None
            }
            Err(e) => {
                warn!(error = %e, "Store summary task failed");
                None
            }
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // the first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            let summary = self.store_summary().await;
            self.metrics.print_summary(summary.as_ref());
        }
    }
}
