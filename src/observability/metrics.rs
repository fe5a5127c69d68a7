//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define ingestion metrics (requests, rejections, payload sizes, latency)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `webhook_requests_total` (counter): ingestion responses by status
//! - `webhook_rate_limited_total` (counter): requests refused by the rate limiter
//! - `webhook_body_read_timeout_total` (counter): senders that stalled mid-body
//! - `webhook_payload_bytes` (histogram): accepted body sizes
//! - `webhook_ingest_duration_seconds` (histogram): handler latency
//! - `webhook_events_stored_total` (counter): events written to storage
//! - `rate_limiter_tracked_keys` (gauge): live rate-limit records
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so tests need no setup
//! - Labels limited to status code to keep cardinality bounded

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one ingestion response.
pub fn record_request(status: u16, start: Instant) {
    counter!("webhook_requests_total", "status" => status.to_string()).increment(1);
    histogram!("webhook_ingest_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    counter!("webhook_rate_limited_total").increment(1);
}

pub fn record_body_timeout() {
    counter!("webhook_body_read_timeout_total").increment(1);
}

pub fn record_payload_size(bytes: usize) {
    histogram!("webhook_payload_bytes").record(bytes as f64);
}

pub fn record_event_stored() {
    counter!("webhook_events_stored_total").increment(1);
}

pub fn record_tracked_keys(count: usize) {
    gauge!("rate_limiter_tracked_keys").set(count as f64);
}
