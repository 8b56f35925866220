//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics (requests, latency, limiter rejections, backend calls)
//! - Expose a Prometheus-compatible scrape endpoint when enabled
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, route, status
//! - `gateway_request_duration_seconds` (histogram): end-to-end latency
//! - `gateway_rate_limited_total` (counter): requests rejected by the limiter
//! - `gateway_backend_calls_total` (counter): backend calls by backend, outcome
//! - `gateway_inflight_requests` (gauge): requests currently in the pipeline
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; with no exporter installed
//!   every call is a no-op, so tests need no setup
//! - Labels stay low-cardinality: route names, never raw paths

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder with an HTTP scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    describe_metrics();
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

fn describe_metrics() {
    describe_counter!("gateway_requests_total", "Total HTTP requests processed");
    describe_histogram!(
        "gateway_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    describe_counter!(
        "gateway_rate_limited_total",
        "Requests rejected by the rate limiter"
    );
    describe_counter!(
        "gateway_backend_calls_total",
        "Backend calls by backend and outcome"
    );
    describe_gauge!(
        "gateway_inflight_requests",
        "Requests currently being processed"
    );
}

/// Record a completed request.
pub fn record_request(method: &str, route: &str, status: u16, elapsed: Duration) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        "gateway_request_duration_seconds",
        "method" => method.to_string(),
        "route" => route.to_string()
    )
    .record(elapsed.as_secs_f64());
}

pub fn record_rate_limited() {
    counter!("gateway_rate_limited_total").increment(1);
}

/// Record one backend call; `outcome` is "ok" or a failure kind label.
pub fn record_backend_call(backend: &str, outcome: &str) {
    counter!(
        "gateway_backend_calls_total",
        "backend" => backend.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

pub fn set_inflight(count: usize) {
    gauge!("gateway_inflight_requests").set(count as f64);
}
