//! Metrics collection and exposition.
//!
//! # Metrics
//! - `listener_requests_rejected_total` (counter): requests refused by the reject gate, by listener
//! - `shutdown_phase_duration_seconds` (histogram): time spent in each shutdown phase
//! - `shutdown_callbacks_total` (counter): callback outcomes
//! - `shutdown_outcome_total` (counter): how the process exited
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Prometheus exporter is opt-in through config

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_rejected(listener: &str) {
    counter!("listener_requests_rejected_total", "listener" => listener.to_string()).increment(1);
}

pub fn record_phase(phase: &'static str, elapsed: Duration) {
    histogram!("shutdown_phase_duration_seconds", "phase" => phase).record(elapsed.as_secs_f64());
}

pub fn record_callback(outcome: &'static str) {
    counter!("shutdown_callbacks_total", "outcome" => outcome).increment(1);
}

pub fn record_outcome(outcome: &'static str) {
    counter!("shutdown_outcome_total", "outcome" => outcome).increment(1);
}
