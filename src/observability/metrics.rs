//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status, backend
//! - `proxy_request_duration_seconds` (histogram): latency distribution
//! - `proxy_backend_fails_total` (counter): failed dials per backend
//! - `proxy_backend_down_total` (counter): down transitions per backend
//! - `proxy_websocket_sessions_total` (counter): sessions by forward mode
//! - `proxy_websocket_active_sessions` (gauge): open sessions
//! - `proxy_waf_checkpoint_errors_total` (counter): checkpoint failures by kind

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, backend: &str, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("backend", backend.to_string()),
    ];
    counter!("proxy_requests_total", &labels).increment(1);
    histogram!("proxy_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());
}

pub fn record_backend_failure(backend: &str) {
    counter!("proxy_backend_fails_total", "backend" => backend.to_string()).increment(1);
}

pub fn record_backend_down(backend: &str) {
    counter!("proxy_backend_down_total", "backend" => backend.to_string()).increment(1);
}

pub fn record_websocket_open(mode: &'static str) {
    counter!("proxy_websocket_sessions_total", "mode" => mode).increment(1);
    gauge!("proxy_websocket_active_sessions").increment(1.0);
}

pub fn record_websocket_closed() {
    gauge!("proxy_websocket_active_sessions").decrement(1.0);
}

pub fn record_checkpoint_error(checkpoint: &str, kind: &'static str) {
    counter!(
        "proxy_waf_checkpoint_errors_total",
        "checkpoint" => checkpoint.to_string(),
        "kind" => kind
    )
    .increment(1);
}
