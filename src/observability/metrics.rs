//! Metrics collection and exposition.
//!
//! # Metrics
//! - `mesh_requests_total` (counter): logical requests by outcome
//! - `mesh_source_attempts_total` (counter): per-source attempts by outcome
//! - `mesh_request_duration_seconds` (histogram): logical request latency
//! - `mesh_circuit_state` (gauge): per-breaker state (0=closed, 1=open, 2=half-open)
//! - `mesh_circuit_transitions_total` (counter): state changes by breaker
//! - `mesh_degradation_level` (gauge): current level (0..=3)
//! - `mesh_cache_hits_total` / `mesh_cache_misses_total` (counters)
//! - `mesh_source_healthy` (gauge): 1 when a source is usable
//! - `mesh_fallbacks_total` (counter): fallback results served

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and HTTP listener.
pub fn install_recorder(address: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(address)
        .install()
        .map_err(|e| format!("failed to install metrics recorder: {e}"))
}

pub fn record_request(success: bool, latency: Duration) {
    let outcome = if success { "success" } else { "failure" };
    metrics::counter!("mesh_requests_total", "outcome" => outcome).increment(1);
    metrics::histogram!("mesh_request_duration_seconds").record(latency.as_secs_f64());
}

pub fn record_source_attempt(source: &str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    metrics::counter!(
        "mesh_source_attempts_total",
        "source" => source.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_circuit_state(circuit: &str, state: u8) {
    metrics::gauge!("mesh_circuit_state", "circuit" => circuit.to_string()).set(state as f64);
    metrics::counter!("mesh_circuit_transitions_total", "circuit" => circuit.to_string())
        .increment(1);
}

pub fn record_degradation_level(level: u8) {
    metrics::gauge!("mesh_degradation_level").set(level as f64);
}

pub fn record_cache_hit() {
    metrics::counter!("mesh_cache_hits_total").increment(1);
}

pub fn record_cache_miss() {
    metrics::counter!("mesh_cache_misses_total").increment(1);
}

pub fn record_source_health(source: &str, usable: bool) {
    metrics::gauge!("mesh_source_healthy", "source" => source.to_string())
        .set(if usable { 1.0 } else { 0.0 });
}

pub fn record_fallback(circuit: &str) {
    metrics::counter!("mesh_fallbacks_total", "circuit" => circuit.to_string()).increment(1);
}
