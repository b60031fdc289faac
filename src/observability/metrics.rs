//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, route, status
//! - `proxy_request_duration_seconds` (histogram): latency by method, route
//! - `proxy_store_operations_total` (counter): document store operations
//! - `proxy_upstream_calls_total` (counter): upstream calls by outcome
//!
//! Recording is always safe: without an installed exporter the `metrics`
//! macros are no-ops.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one handled HTTP request.
pub fn record_request(method: &str, route: &str, status: u16, started: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("route", route.to_string()),
        ("status", status.to_string()),
    ];
    counter!("proxy_requests_total", &labels).increment(1);
    histogram!(
        "proxy_request_duration_seconds",
        "method" => method.to_string(),
        "route" => route.to_string()
    )
    .record(started.elapsed().as_secs_f64());
}

pub fn record_store_operation(operation: &'static str) {
    counter!("proxy_store_operations_total", "operation" => operation).increment(1);
}

pub fn record_upstream_call(outcome: &'static str) {
    counter!("proxy_upstream_calls_total", "outcome" => outcome).increment(1);
}
