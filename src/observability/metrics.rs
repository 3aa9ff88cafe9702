//! Metrics collection and exposition.
//!
//! # Metrics
//! - `balancer_requests_total` (counter): proxied requests by node, outcome
//! - `balancer_request_duration_seconds` (histogram): backend call latency by node
//! - `balancer_node_health` (gauge): 1=healthy, 0=unhealthy
//!
//! Recording is a no-op until `init_metrics` installs the exporter.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one proxied request. `node` is "none" when nothing was selected.
pub fn record_request(node: &str, outcome: &'static str, elapsed: Duration) {
    let node = node.to_string();
    metrics::counter!("balancer_requests_total", "node" => node.clone(), "outcome" => outcome)
        .increment(1);
    metrics::histogram!("balancer_request_duration_seconds", "node" => node)
        .record(elapsed.as_secs_f64());
}

pub fn record_node_health(node: &str, healthy: bool) {
    metrics::gauge!("balancer_node_health", "node" => node.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}
