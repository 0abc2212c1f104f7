//! Production observability metrics for the export scheduler
//!
//! This module provides metrics collection for monitoring submission
//! volume, skip and failure rates, retry behavior, and throttle waits.
//!
//! ## Architecture
//!
//! - Uses `metrics` crate for low-overhead metric collection
//! - Prometheus exporter for scraping endpoint (:9090/metrics)
//! - Graceful no-op when the exporter was never installed

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Global metrics registry initialization flag
static METRICS_INITIALIZED: Lazy<Arc<RwLock<bool>>> = Lazy::new(|| Arc::new(RwLock::new(false)));

/// Initialize metrics system with Prometheus exporter
///
/// This should be called once at application startup, typically when the
/// HTTP surface starts. The function is idempotent and will not
/// reinitialize if already called.
pub async fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let mut initialized = METRICS_INITIALIZED.write().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "jobs_submitted_total",
        Unit::Count,
        "Total number of batch jobs accepted by the remote service"
    );

    describe_counter!(
        "dates_skipped_total",
        Unit::Count,
        "Total number of dates skipped without a submission"
    );

    describe_counter!(
        "submission_failures_total",
        Unit::Count,
        "Total number of dates whose submission failed past the retry budget"
    );

    describe_counter!(
        "remote_retries_total",
        Unit::Count,
        "Total number of remote call retries"
    );

    describe_histogram!(
        "throttle_wait_seconds",
        Unit::Seconds,
        "Time spent waiting at the ready-job ceiling"
    );

    describe_gauge!(
        "ready_jobs",
        Unit::Count,
        "Jobs queued at the remote service as of the last directory read"
    );

    *initialized = true;
    info!("Metrics system initialized successfully on {}", addr);
    Ok(())
}

/// Record a job accepted by the remote service.
pub fn record_submission(collection: &str) {
    counter!(
        "jobs_submitted_total",
        "collection" => collection.to_string(),
    )
    .increment(1);
}

/// Record a date skipped without a submission.
pub fn record_skip(collection: &str, reason: &str) {
    counter!(
        "dates_skipped_total",
        "collection" => collection.to_string(),
        "reason" => reason.to_string(),
    )
    .increment(1);
}

/// Record a date whose submission failed.
pub fn record_failure(collection: &str) {
    counter!(
        "submission_failures_total",
        "collection" => collection.to_string(),
    )
    .increment(1);
}

/// Record one retry of a remote call.
pub fn record_remote_retry(what: &str, attempt: u32) {
    counter!(
        "remote_retries_total",
        "call" => what.to_string(),
        "attempt" => attempt.to_string(),
    )
    .increment(1);
}

/// Record time spent blocked at the ready-job ceiling.
pub fn record_throttle_wait(duration: Duration) {
    histogram!("throttle_wait_seconds").record(duration.as_secs_f64());
}

/// Update the queued-job gauge from a directory read.
pub fn record_ready_jobs(count: usize) {
    gauge!("ready_jobs").set(count as f64);
}

/// Check if metrics system is initialized
pub async fn is_initialized() -> bool {
    *METRICS_INITIALIZED.read().await
}
