//! Metrics collection and exposition.
//!
//! # Metrics
//! - `guard_requests_total` (counter): requests by route class and status
//! - `guard_pipeline_duration_seconds` (histogram): time spent in the guard
//! - `guard_blocked_total` (counter): requests denied by the blocklist
//! - `guard_rate_limited_total` (counter): denials by tier
//! - `guard_attacks_detected_total` (counter): detections by signature
//! - `guard_store_errors_total` (counter): failed store calls by operation
//! - `guard_csp_violations_total` (counter): reports by severity
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(route_class: &'static str, status: u16, start: Instant) {
    counter!("guard_requests_total", "route_class" => route_class, "status" => status.to_string())
        .increment(1);
    histogram!("guard_pipeline_duration_seconds", "route_class" => route_class)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_blocked() {
    counter!("guard_blocked_total").increment(1);
}

pub fn record_rate_limited(tier: &'static str) {
    counter!("guard_rate_limited_total", "tier" => tier).increment(1);
}

pub fn record_attack(signature: &str) {
    counter!("guard_attacks_detected_total", "signature" => signature.to_string()).increment(1);
}

pub fn record_store_error(op: &'static str) {
    counter!("guard_store_errors_total", "op" => op).increment(1);
}

pub fn record_csp_violation(severity: &'static str) {
    counter!("guard_csp_violations_total", "severity" => severity).increment(1);
}
