//! Prometheus metrics for the gateway.
//!
//! Metrics are exposed on a dedicated HTTP listener when `METRICS_PORT` is
//! set. Recording functions are no-ops until an exporter is installed, so
//! handlers and tests can call them unconditionally.
//!
//! # Available Metrics
//!
//! ## Counters
//! - `gateway_requests_total` - Translated GET requests (label: outcome)
//! - `gateway_access_denied_total` - Requests rejected by the access guard (label: reason)
//!
//! ## Histograms
//! - `gateway_backend_duration_seconds` - Duration of backend POST calls

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{error, info};

/// Metric names as constants for consistency.
pub mod names {
    pub const REQUESTS_TOTAL: &str = "gateway_requests_total";
    pub const ACCESS_DENIED_TOTAL: &str = "gateway_access_denied_total";
    pub const BACKEND_DURATION_SECONDS: &str = "gateway_backend_duration_seconds";
}

/// Install the Prometheus exporter and describe every metric.
///
/// # Errors
///
/// Returns a message if the exporter cannot be installed (for example the
/// port is taken or a recorder is already set).
pub fn init_metrics(metrics_addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        names::REQUESTS_TOTAL,
        "Total number of GET requests handled by the translator"
    );
    describe_counter!(
        names::ACCESS_DENIED_TOTAL,
        "Total number of requests rejected by the access guard"
    );
    describe_histogram!(
        names::BACKEND_DURATION_SECONDS,
        "Backend POST duration in seconds"
    );

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Try to initialize metrics, logging any errors but not failing.
pub fn try_init_metrics(metrics_addr: SocketAddr) {
    if let Err(e) = init_metrics(metrics_addr) {
        error!(error = %e, "Failed to initialize metrics, continuing without metrics");
    }
}

/// Record one translated request and how it ended.
pub fn record_request(outcome: &'static str) {
    counter!(names::REQUESTS_TOTAL, "outcome" => outcome).increment(1);
}

/// Record a request turned away by an access gate.
pub fn record_access_denied(reason: &'static str) {
    counter!(names::ACCESS_DENIED_TOTAL, "reason" => reason).increment(1);
}

pub fn record_backend_duration(duration_secs: f64) {
    histogram!(names::BACKEND_DURATION_SECONDS).record(duration_secs);
}
