//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by responder, status
//! - `gateway_request_duration_seconds` (histogram): end-to-end latency
//! - `gateway_worker_failures_total` (counter): failures by worker, kind
//! - `gateway_backend_errors_total` (counter): `status=error` replies by responder
//! - `gateway_worker_health` (gauge): 1=healthy, 0=unhealthy
//!
//! Recording is a no-op until a recorder is installed.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(responder: &str, status: u16, started: Instant) {
    metrics::counter!(
        "gateway_requests_total",
        "responder" => responder.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!(
        "gateway_request_duration_seconds",
        "responder" => responder.to_string()
    )
    .record(started.elapsed().as_secs_f64());
}

pub fn record_worker_failure(worker: &str, kind: &'static str) {
    metrics::counter!(
        "gateway_worker_failures_total",
        "worker" => worker.to_string(),
        "kind" => kind
    )
    .increment(1);
}

pub fn record_backend_error(responder: &str) {
    metrics::counter!("gateway_backend_errors_total", "responder" => responder.to_string())
        .increment(1);
}

pub fn record_worker_health(worker: &str, healthy: bool) {
    metrics::gauge!("gateway_worker_health", "worker" => worker.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}
