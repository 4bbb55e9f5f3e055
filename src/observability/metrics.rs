//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_auth_attempts_total` (counter): logins by outcome
//! - `gateway_rate_limited_total` (counter): rejections by category
//! - `gateway_csrf_rejected_total` (counter): failed token checks
//! - `gateway_uploads_total` (counter): uploads by outcome
//! - `gateway_active_sessions` (gauge): live session count
//!
//! # Design Decisions
//! - Low-overhead updates (atomic operations under the hood)
//! - Prometheus exposition on a separate listener

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`.
///
/// Must run inside the tokio runtime. Failure is logged, not fatal; the
/// gateway keeps serving without metrics.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a completed request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
    )
    .increment(1);
    metrics::histogram!("gateway_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

/// Record a login attempt outcome ("success" or "failure").
pub fn record_auth(outcome: &'static str) {
    metrics::counter!("gateway_auth_attempts_total", "outcome" => outcome).increment(1);
}

/// Record a rate-limit rejection.
pub fn record_rate_limited(category: &'static str) {
    metrics::counter!("gateway_rate_limited_total", "category" => category).increment(1);
}

/// Record a failed anti-forgery check.
pub fn record_csrf_rejected() {
    metrics::counter!("gateway_csrf_rejected_total").increment(1);
}

/// Record an upload outcome ("stored" or "rejected").
pub fn record_upload(outcome: &'static str) {
    metrics::counter!("gateway_uploads_total", "outcome" => outcome).increment(1);
}

/// Update the live session gauge.
pub fn record_session_count(count: usize) {
    metrics::gauge!("gateway_active_sessions").set(count as f64);
}
