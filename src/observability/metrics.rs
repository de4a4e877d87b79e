use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

use crate::error::{AppError, Result};

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Global metrics instance.
pub static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Metrics collector for validation passes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Metrics;

impl Metrics {
    pub fn new() -> Self {
        Self
    }

    pub fn record_run_started(&self, method: &str, strategy: &str) {
        counter!("payment_validation_runs_total", "method" => method.to_string(), "strategy" => strategy.to_string()).increment(1);
    }

    pub fn record_run_completed(&self, method: &str, record_count: u64, duration_ms: f64) {
        counter!("payment_validation_runs_completed_total", "method" => method.to_string()).increment(1);
        histogram!("payment_validation_run_record_count").record(record_count as f64);
        histogram!("payment_validation_run_duration_ms", "method" => method.to_string()).record(duration_ms);
    }

    pub fn record_run_failed(&self, method: &str, reason: &str) {
        counter!("payment_validation_runs_failed_total", "method" => method.to_string(), "reason" => reason.to_string()).increment(1);
    }

    pub fn record_outcome(&self, method: &str, outcome: &str) {
        counter!("payment_validation_records_total", "method" => method.to_string(), "outcome" => outcome.to_string()).increment(1);
    }

    pub fn record_duplicates_dropped(&self, method: &str, count: u64) {
        counter!("payment_validation_duplicates_dropped_total", "method" => method.to_string()).increment(count);
    }
}

/// Timer for measuring operation latency.
pub struct LatencyTimer {
    start: Instant,
}

impl LatencyTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for LatencyTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Installs the Prometheus recorder once and returns its handle.
pub fn init_metrics() -> Result<PrometheusHandle> {
    if let Some(handle) = METRICS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to install Prometheus recorder: {}", e)))?;
    describe_metrics();

    METRICS.get_or_init(Metrics::new);
    Ok(METRICS_HANDLE.get_or_init(|| handle).clone())
}

fn describe_metrics() {
    describe_counter!("payment_validation_runs_total", Unit::Count, "Validation passes started");
    describe_counter!("payment_validation_runs_completed_total", Unit::Count, "Validation passes committed");
    describe_counter!("payment_validation_runs_failed_total", Unit::Count, "Validation passes rolled back");
    describe_counter!("payment_validation_records_total", Unit::Count, "Canonical records processed by outcome");
    describe_counter!("payment_validation_duplicates_dropped_total", Unit::Count, "Duplicate file lines dropped");

    describe_histogram!("payment_validation_run_record_count", Unit::Count, "Canonical records per pass");
    describe_histogram!("payment_validation_run_duration_ms", Unit::Milliseconds, "Validation pass latency in milliseconds");
}

/// Returns the global metrics instance.
pub fn get_metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::new)
}
