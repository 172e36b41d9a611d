//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the mesh.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::coordinator::strategy::AggregationStrategy;
use crate::resilience::backoff::RecoveryStrategy;

/// Root configuration for the resilience mesh.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MeshConfig {
    /// Default circuit breaker settings, applied to every upstream call path.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Upstream data source definitions.
    pub sources: Vec<SourceConfig>,

    /// Multi-source coordinator settings.
    pub coordinator: CoordinatorConfig,

    /// Graceful degradation settings.
    pub degradation: DegradationConfig,

    /// Source health probing settings.
    pub health_probe: HealthProbeConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Circuit breaker configuration, immutable per breaker.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failures in the monitoring window before the circuit opens.
    pub failure_threshold: u32,

    /// Successes among half-open probes required to close the circuit.
    pub success_threshold: u32,

    /// Base cool-down before probing an open circuit, in milliseconds.
    pub timeout_ms: u64,

    /// Minimum sample count before health evaluation runs.
    pub volume_threshold: u32,

    /// Error rate (percent) that opens the circuit.
    pub error_threshold_percent: f64,

    /// Calls slower than this count as slow, in milliseconds.
    pub slow_call_duration_ms: u64,

    /// Slow-call rate (percent) that opens the circuit.
    pub slow_call_threshold_percent: f64,

    /// Number of trial calls admitted in the half-open state.
    pub half_open_probe_count: u32,

    /// Rolling window over which outcomes are evaluated, in milliseconds.
    pub monitoring_window_ms: u64,

    /// Cool-down growth strategy after failed recoveries.
    pub recovery: RecoveryStrategy,

    /// Interval of the background sweep that re-evaluates and prunes
    /// breakers even between calls, in seconds.
    pub monitor_interval_secs: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout_ms: 30_000,
            volume_threshold: 10,
            error_threshold_percent: 50.0,
            slow_call_duration_ms: 5_000,
            slow_call_threshold_percent: 50.0,
            half_open_probe_count: 3,
            monitoring_window_ms: 60_000,
            recovery: RecoveryStrategy::Exponential,
            monitor_interval_secs: 5,
        }
    }
}

/// Upstream data source configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Unique source identifier.
    pub name: String,

    /// Selection priority; lower is preferred.
    pub priority: u32,

    /// Capability tags matched against request types.
    pub capabilities: Vec<String>,

    /// Request quota per time window.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Per-call timeout in milliseconds.
    #[serde(default = "default_source_timeout_ms")]
    pub timeout_ms: u64,

    /// Health-probe retries before the source is declared offline.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Historical reliability score in [0, 1]; the weight under the
    /// weighted aggregation strategy.
    #[serde(default = "default_reliability")]
    pub reliability: f64,

    /// Cost units accrued per attempt.
    #[serde(default = "default_cost_per_call")]
    pub cost_per_call: f64,
}

fn default_source_timeout_ms() -> u64 {
    10_000
}

fn default_retry_attempts() -> u32 {
    2
}

fn default_reliability() -> f64 {
    0.9
}

fn default_cost_per_call() -> f64 {
    1.0
}

/// Per-window request quotas. `None` means unlimited.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RateLimitConfig {
    pub per_second: Option<u32>,
    pub per_minute: Option<u32>,
    pub per_day: Option<u32>,
}

/// Multi-source coordinator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Aggregation strategy active at startup.
    pub strategy: AggregationStrategy,

    /// Response cache time-to-live in seconds.
    pub cache_ttl_secs: u64,

    /// Maximum cached responses before FIFO eviction.
    pub cache_capacity: usize,

    /// Maximum sources dispatched concurrently by consensus/weighted
    /// strategies.
    pub fan_out: usize,

    /// Window over which request outcomes feed system metrics, in seconds.
    pub tracking_window_secs: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            strategy: AggregationStrategy::Weighted,
            cache_ttl_secs: 60,
            cache_capacity: 1_000,
            fan_out: 3,
            tracking_window_secs: 60,
        }
    }
}

/// Graceful degradation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DegradationConfig {
    /// Minimum time between level changes (hysteresis), in seconds.
    pub cooldown_secs: u64,

    /// Metric evaluation interval in seconds.
    pub evaluate_interval_secs: u64,
}

impl Default for DegradationConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 60,
            evaluate_interval_secs: 5,
        }
    }
}

/// Source health probing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthProbeConfig {
    /// Enable the background prober.
    pub enabled: bool,

    /// Probe interval in seconds.
    pub interval_secs: u64,
}

impl Default for HealthProbeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_reasonable() {
        let config = MeshConfig::default();
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.circuit_breaker.volume_threshold, 10);
        assert_eq!(config.degradation.cooldown_secs, 60);
        assert_eq!(config.coordinator.cache_capacity, 1_000);
        assert!(config.sources.is_empty());
    }

    #[test]
    fn source_config_parses_with_defaults() {
        let toml = r#"
            name = "alpha"
            priority = 1
            capabilities = ["price", "volume"]
        "#;
        let source: SourceConfig = toml::from_str(toml).unwrap();
        assert_eq!(source.timeout_ms, 10_000);
        assert_eq!(source.reliability, 0.9);
        assert!(source.rate_limit.per_second.is_none());
    }

    #[test]
    fn full_config_round_trips_through_toml() {
        let toml = r#"
            [circuit_breaker]
            failure_threshold = 3
            recovery = "linear"

            [[sources]]
            name = "alpha"
            priority = 1
            capabilities = ["price"]
            reliability = 0.95

            [coordinator]
            strategy = "consensus"
            cache_ttl_secs = 30
        "#;
        let config: MeshConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.circuit_breaker.failure_threshold, 3);
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.coordinator.cache_ttl_secs, 30);
    }
}
