//! Breaker behavior driven through the assembled mesh.

use std::time::Duration;

use serde_json::json;
use source_mesh::config::schema::MeshConfig;
use source_mesh::coordinator::request::DataRequest;
use source_mesh::sources::client::UpstreamError;
use source_mesh::{AggregationStrategy, CircuitState, Signal};

mod common;
use common::{mesh_with, source_config, ScriptedClient};

fn tight_breaker_config() -> MeshConfig {
    let mut config = MeshConfig::default();
    config.coordinator.strategy = AggregationStrategy::FirstSuccess;
    config.circuit_breaker.volume_threshold = 3;
    config.circuit_breaker.failure_threshold = 3;
    config.circuit_breaker.timeout_ms = 1_000;
    config.circuit_breaker.half_open_probe_count = 2;
    config.circuit_breaker.success_threshold = 1;
    config
}

fn failing(message: &str, count: usize) -> Vec<Result<serde_json::Value, UpstreamError>> {
    (0..count)
        .map(|_| Err(UpstreamError::Provider(message.to_string())))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn breaker_opens_isolates_and_recovers() {
    // Three failures, then the provider is healthy again.
    let client = ScriptedClient::script(failing("flaking", 3), Ok(json!({"price": 5})));
    let mesh = mesh_with(
        tight_breaker_config(),
        vec![(source_config("alpha", 1, 0.9), client.clone())],
    );

    for _ in 0..3 {
        let response = mesh.request_data(DataRequest::new("price", json!({}))).await;
        assert!(!response.success);
    }
    let breaker = mesh.breakers().circuit("alpha");
    assert_eq!(breaker.state(), CircuitState::Open);
    assert_eq!(client.fetch_count(), 3);

    // While open, requests fail fast without reaching the provider.
    let rejected = mesh.request_data(DataRequest::new("price", json!({}))).await;
    assert!(!rejected.success);
    assert!(rejected.errors[0].message.contains("is open"));
    assert_eq!(client.fetch_count(), 3);

    // After the cool-down (1s base + jitter), probes are admitted and the
    // now-healthy provider closes the circuit.
    tokio::time::advance(Duration::from_millis(1_200)).await;
    let recovered = mesh.request_data(DataRequest::new("price", json!({}))).await;
    assert!(recovered.success);
    assert_eq!(breaker.state(), CircuitState::HalfOpen);

    let settled = mesh.request_data(DataRequest::new("price", json!({}))).await;
    assert!(settled.success);
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn open_breaker_shifts_traffic_to_the_next_source() {
    let primary = ScriptedClient::always_err("down hard");
    let backup = ScriptedClient::always_ok(json!({"price": 11}));
    let mesh = mesh_with(
        tight_breaker_config(),
        vec![
            (source_config("primary", 1, 0.9), primary.clone()),
            (source_config("backup", 2, 0.8), backup.clone()),
        ],
    );

    for _ in 0..5 {
        let response = mesh.request_data(DataRequest::new("price", json!({}))).await;
        // Every request succeeds through the backup.
        assert!(response.success);
        assert_eq!(response.source.as_deref(), Some("backup"));
        assert_eq!(response.fallbacks_used, ["primary"]);
    }

    // The primary's breaker opened after three real failures; further
    // attempts were fast-rejected, not sent upstream.
    assert_eq!(
        mesh.breakers().circuit("primary").state(),
        CircuitState::Open
    );
    assert_eq!(primary.fetch_count(), 3);
    assert_eq!(backup.fetch_count(), 5);
}

#[tokio::test]
async fn majority_open_circuits_signal_cascading_failure() {
    let mesh = mesh_with(tight_breaker_config(), Vec::new());
    let mut rx = mesh.subscribe();

    for name in ["a", "b", "c", "d"] {
        mesh.breakers().circuit(name);
    }
    mesh.breakers().circuit("a").force_open();
    mesh.breakers().circuit("b").force_open();
    mesh.breakers().circuit("c").force_open();

    let mut seen = None;
    while let Ok(signal) = rx.try_recv() {
        if let Signal::CascadingFailure { open, total } = signal {
            seen = Some((open, total));
        }
    }
    assert_eq!(seen, Some((3, 4)));
}

#[tokio::test]
async fn reset_all_restores_service() {
    let client = ScriptedClient::script(failing("flaking", 3), Ok(json!({"ok": true})));
    let mesh = mesh_with(
        tight_breaker_config(),
        vec![(source_config("alpha", 1, 0.9), client.clone())],
    );

    for _ in 0..3 {
        let _ = mesh.request_data(DataRequest::new("price", json!({}))).await;
    }
    assert_eq!(
        mesh.breakers().circuit("alpha").state(),
        CircuitState::Open
    );

    mesh.breakers().reset_all();
    let response = mesh.request_data(DataRequest::new("price", json!({}))).await;
    assert!(response.success);
}
