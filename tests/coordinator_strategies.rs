//! Aggregation strategy behavior through the assembled mesh.

use serde_json::json;
use source_mesh::config::schema::MeshConfig;
use source_mesh::coordinator::request::DataRequest;
use source_mesh::AggregationStrategy;

mod common;
use common::{mesh_with, source_config, ScriptedClient};

fn config(strategy: AggregationStrategy) -> MeshConfig {
    let mut config = MeshConfig::default();
    config.coordinator.strategy = strategy;
    config
}

#[tokio::test]
async fn failover_exhaustion_reports_every_source() {
    let mesh = mesh_with(
        config(AggregationStrategy::Fallback),
        vec![
            (source_config("a", 1, 0.9), ScriptedClient::always_err("a down")),
            (source_config("b", 2, 0.9), ScriptedClient::always_err("b down")),
            (source_config("c", 3, 0.9), ScriptedClient::always_err("c down")),
        ],
    );

    let response = mesh.request_data(DataRequest::new("price", json!({}))).await;
    assert!(!response.success);
    assert_eq!(response.errors.len(), 3);
    assert_eq!(response.fallbacks_used, ["a", "b", "c"]);
    assert_eq!(response.total_cost, 3.0);
    assert!(response.data.is_none());
}

#[tokio::test]
async fn failover_stops_at_first_success() {
    let b = ScriptedClient::always_ok(json!({"price": 7}));
    let c = ScriptedClient::always_ok(json!({"price": 9}));
    let mesh = mesh_with(
        config(AggregationStrategy::Fallback),
        vec![
            (source_config("a", 1, 0.9), ScriptedClient::always_err("a down")),
            (source_config("b", 2, 0.8), b.clone()),
            (source_config("c", 3, 0.9), c.clone()),
        ],
    );

    let response = mesh.request_data(DataRequest::new("price", json!({}))).await;
    assert!(response.success);
    assert_eq!(response.source.as_deref(), Some("b"));
    assert_eq!(response.fallbacks_used, ["a"]);
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.metadata.confidence, 0.8);
    assert_eq!(b.fetch_count(), 1);
    // The walk stopped before reaching c.
    assert_eq!(c.fetch_count(), 0);
}

#[tokio::test]
async fn consensus_needs_a_quorum_of_two() {
    let mesh = mesh_with(
        config(AggregationStrategy::Consensus),
        vec![
            (source_config("a", 1, 0.9), ScriptedClient::always_ok(json!({"price": 1}))),
            (source_config("b", 2, 0.9), ScriptedClient::always_err("b down")),
            (source_config("c", 3, 0.9), ScriptedClient::always_err("c down")),
        ],
    );

    let response = mesh.request_data(DataRequest::new("price", json!({}))).await;
    assert!(!response.success);
    assert_eq!(response.errors.len(), 2);
    assert!(!response.metadata.aggregated);
}

#[tokio::test]
async fn consensus_merges_earliest_priority_first() {
    let mesh = mesh_with(
        config(AggregationStrategy::Consensus),
        vec![
            (
                source_config("a", 1, 0.9),
                ScriptedClient::always_ok(json!({"price": 100, "volume": 5})),
            ),
            (
                source_config("b", 2, 0.9),
                ScriptedClient::always_ok(json!({"price": 999, "depth": 2})),
            ),
            (source_config("c", 3, 0.9), ScriptedClient::always_err("c down")),
        ],
    );

    let response = mesh.request_data(DataRequest::new("price", json!({}))).await;
    assert!(response.success);
    assert!(response.metadata.aggregated);
    assert_eq!(response.metadata.confidence, 0.9);
    assert_eq!(
        response.data.unwrap(),
        json!({"price": 100, "volume": 5, "depth": 2})
    );
    assert_eq!(response.fallbacks_used, ["c"]);
}

#[tokio::test]
async fn weighted_prefers_the_most_reliable_survivor() {
    let mesh = mesh_with(
        config(AggregationStrategy::Weighted),
        vec![
            (source_config("a", 1, 0.6), ScriptedClient::always_ok(json!({"v": "a"}))),
            (source_config("b", 2, 0.95), ScriptedClient::always_ok(json!({"v": "b"}))),
            (source_config("c", 3, 0.99), ScriptedClient::always_err("c down")),
        ],
    );

    let response = mesh.request_data(DataRequest::new("price", json!({}))).await;
    assert!(response.success);
    assert_eq!(response.source.as_deref(), Some("b"));
    assert_eq!(response.data.unwrap(), json!({"v": "b"}));
    // Mean of the surviving weights, not including the failed source.
    assert!((response.metadata.confidence - 0.775).abs() < 1e-9);
}

#[tokio::test]
async fn complete_returns_the_whole_picture() {
    let mesh = mesh_with(
        config(AggregationStrategy::Complete),
        vec![
            (source_config("a", 1, 0.9), ScriptedClient::always_ok(json!({"v": 1}))),
            (source_config("b", 2, 0.9), ScriptedClient::always_err("b down")),
            (source_config("c", 3, 0.9), ScriptedClient::always_ok(json!({"v": 3}))),
        ],
    );

    let response = mesh.request_data(DataRequest::new("price", json!({}))).await;
    assert!(response.success);
    assert!(response.metadata.aggregated);
    assert!((response.metadata.confidence - 2.0 / 3.0).abs() < 1e-9);
    let data = response.data.unwrap();
    assert_eq!(data["sources"], json!(["a", "c"]));
    assert_eq!(data["data"]["a"], json!({"v": 1}));
    assert_eq!(data["data"]["c"], json!({"v": 3}));
}

#[tokio::test]
async fn no_eligible_sources_is_a_typed_failure() {
    let mesh = mesh_with(
        config(AggregationStrategy::Fallback),
        vec![(source_config("a", 1, 0.9), ScriptedClient::always_ok(json!(1)))],
    );

    // No source carries the "sentiment" capability.
    let response = mesh
        .request_data(DataRequest::new("sentiment", json!({})))
        .await;
    assert!(!response.success);
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].source, "coordinator");
    assert!(response.errors[0].message.contains("no eligible sources"));
}

#[tokio::test]
async fn excluded_and_required_sources_shape_routing() {
    let a = ScriptedClient::always_ok(json!({"from": "a"}));
    let mesh = mesh_with(
        config(AggregationStrategy::FirstSuccess),
        vec![
            (source_config("a", 1, 0.9), a.clone()),
            (source_config("b", 2, 0.9), ScriptedClient::always_ok(json!({"from": "b"}))),
        ],
    );

    let request =
        DataRequest::new("price", json!({})).with_excluded_sources(vec!["a".to_string()]);
    let response = mesh.request_data(request).await;
    assert_eq!(response.source.as_deref(), Some("b"));
    assert_eq!(a.fetch_count(), 0);
}

#[tokio::test]
async fn cache_short_circuits_identical_requests() {
    let client = ScriptedClient::always_ok(json!({"price": 42}));
    let mesh = mesh_with(
        config(AggregationStrategy::FirstSuccess),
        vec![(source_config("a", 1, 0.9), client.clone())],
    );

    let first = mesh
        .request_data(DataRequest::new("price", json!({"symbol": "BTC"})).with_cache())
        .await;
    assert!(first.success);
    assert!(!first.metadata.cache_hit);
    assert_eq!(client.fetch_count(), 1);

    let second = mesh
        .request_data(DataRequest::new("price", json!({"symbol": "BTC"})).with_cache())
        .await;
    assert!(second.success);
    assert!(second.metadata.cache_hit);
    assert_eq!(second.latency_ms, 0);
    assert_eq!(second.total_cost, 0.0);
    // No upstream invocation for the hit.
    assert_eq!(client.fetch_count(), 1);

    // Different params miss.
    let third = mesh
        .request_data(DataRequest::new("price", json!({"symbol": "ETH"})).with_cache())
        .await;
    assert!(!third.metadata.cache_hit);
    assert_eq!(client.fetch_count(), 2);
}
