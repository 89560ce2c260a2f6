//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status
//! - `gateway_request_duration_seconds` (histogram): latency
//! - `gateway_rate_limited_total` (counter): 429s by key kind
//! - `gateway_auth_failures_total` (counter): 401s by reason

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on its own listener. A failure here
/// is logged, not fatal: the gateway serves traffic without metrics.
pub fn init(address: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(address).install() {
        Ok(()) => tracing::info!(address = %address, "Metrics exporter listening"),
        Err(error) => tracing::error!(error = %error, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited(key_kind: &'static str) {
    counter!("gateway_rate_limited_total", "key" => key_kind).increment(1);
}

pub fn record_auth_failure(reason: &'static str) {
    counter!("gateway_auth_failures_total", "reason" => reason).increment(1);
}
