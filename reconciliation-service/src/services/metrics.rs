//! Prometheus metrics for reconciliation-service.
//!
//! Installs the `metrics` recorder and renders the /metrics endpoint.

use crate::engine::ReconciliationSummary;
use crate::models::{ExecutionMode, JobStatus};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use service_core::error::AppError;
use std::sync::OnceLock;

/// Global handle to the Prometheus recorder.
pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global recorder. Safe to call more than once.
pub fn init_metrics() -> Result<(), AppError> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }
    let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
        AppError::InternalError(anyhow::anyhow!("failed to install Prometheus recorder: {}", e))
    })?;
    let _ = METRICS_HANDLE.set(handle);
    Ok(())
}

/// Get all metrics as Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized".to_string())
}

/// Record an accepted upload.
pub fn record_upload(mode: ExecutionMode) {
    metrics::counter!("uploads_total", "mode" => mode.as_str()).increment(1);
}

/// Record a job reaching a terminal state.
pub fn record_job_finished(status: JobStatus, duration_secs: f64) {
    metrics::counter!("jobs_total", "status" => status.as_str()).increment(1);
    metrics::histogram!("job_duration_seconds").record(duration_secs);
}

/// Record one reconciliation and the size of each bucket it produced.
pub fn record_reconciliation(summary: &ReconciliationSummary) {
    metrics::counter!("reconciliations_total").increment(1);
    let buckets = [
        ("matched", summary.matched),
        ("status_mismatch", summary.status_mismatch),
        ("merchant_only", summary.merchant_only),
        ("platform_only", summary.platform_only),
    ];
    for (bucket, count) in buckets {
        metrics::counter!("reconciled_records_total", "bucket" => bucket).increment(count as u64);
    }
}
