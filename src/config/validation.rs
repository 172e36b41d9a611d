//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check value ranges (thresholds > 0, reliability in [0, 1])
//! - Detect duplicate source names and empty capability sets
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure: MeshConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;

use crate::config::schema::MeshConfig;

/// A single semantic configuration problem.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("duplicate source name '{0}'")]
    DuplicateSource(String),

    #[error("source '{0}' declares no capabilities")]
    NoCapabilities(String),

    #[error("source '{name}' reliability {value} is outside [0, 1]")]
    ReliabilityOutOfRange { name: String, value: f64 },

    #[error("source '{name}' cost_per_call {value} is negative")]
    NegativeCost { name: String, value: f64 },

    #[error("circuit breaker {field} must be greater than zero")]
    ZeroThreshold { field: &'static str },

    #[error("circuit breaker {field} {value} is outside (0, 100]")]
    PercentOutOfRange { field: &'static str, value: f64 },

    #[error("circuit breaker success_threshold {success} exceeds half_open_probe_count {probes}")]
    SuccessExceedsProbes { success: u32, probes: u32 },

    #[error("coordinator cache_capacity must be greater than zero")]
    ZeroCacheCapacity,

    #[error("coordinator fan_out must be greater than zero")]
    ZeroFanOut,
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &MeshConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let cb = &config.circuit_breaker;
    for (value, field) in [
        (cb.failure_threshold, "failure_threshold"),
        (cb.success_threshold, "success_threshold"),
        (cb.volume_threshold, "volume_threshold"),
        (cb.half_open_probe_count, "half_open_probe_count"),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroThreshold { field });
        }
    }
    if cb.timeout_ms == 0 {
        errors.push(ValidationError::ZeroThreshold { field: "timeout_ms" });
    }
    if cb.slow_call_duration_ms == 0 {
        errors.push(ValidationError::ZeroThreshold {
            field: "slow_call_duration_ms",
        });
    }
    if cb.monitoring_window_ms == 0 {
        errors.push(ValidationError::ZeroThreshold {
            field: "monitoring_window_ms",
        });
    }
    for (value, field) in [
        (cb.error_threshold_percent, "error_threshold_percent"),
        (cb.slow_call_threshold_percent, "slow_call_threshold_percent"),
    ] {
        if !(value > 0.0 && value <= 100.0) {
            errors.push(ValidationError::PercentOutOfRange { field, value });
        }
    }
    if cb.success_threshold > cb.half_open_probe_count {
        errors.push(ValidationError::SuccessExceedsProbes {
            success: cb.success_threshold,
            probes: cb.half_open_probe_count,
        });
    }

    let mut seen = HashSet::new();
    for source in &config.sources {
        if !seen.insert(source.name.clone()) {
            errors.push(ValidationError::DuplicateSource(source.name.clone()));
        }
        if source.capabilities.is_empty() {
            errors.push(ValidationError::NoCapabilities(source.name.clone()));
        }
        if !(0.0..=1.0).contains(&source.reliability) {
            errors.push(ValidationError::ReliabilityOutOfRange {
                name: source.name.clone(),
                value: source.reliability,
            });
        }
        if source.cost_per_call < 0.0 {
            errors.push(ValidationError::NegativeCost {
                name: source.name.clone(),
                value: source.cost_per_call,
            });
        }
    }

    if config.coordinator.cache_capacity == 0 {
        errors.push(ValidationError::ZeroCacheCapacity);
    }
    if config.coordinator.fan_out == 0 {
        errors.push(ValidationError::ZeroFanOut);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::SourceConfig;

    fn source(name: &str) -> SourceConfig {
        SourceConfig {
            name: name.to_string(),
            priority: 1,
            capabilities: vec!["price".to_string()],
            rate_limit: Default::default(),
            timeout_ms: 10_000,
            retry_attempts: 2,
            reliability: 0.9,
            cost_per_call: 1.0,
        }
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&MeshConfig::default()).is_ok());
    }

    #[test]
    fn collects_all_errors() {
        let mut config = MeshConfig::default();
        let mut bad = source("alpha");
        bad.reliability = 1.5;
        bad.capabilities.clear();
        config.sources.push(bad);
        config.sources.push(source("alpha"));
        config.coordinator.cache_capacity = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::DuplicateSource("alpha".into())));
        assert!(errors.contains(&ValidationError::ZeroCacheCapacity));
    }

    #[test]
    fn success_threshold_cannot_exceed_probe_count() {
        let mut config = MeshConfig::default();
        config.circuit_breaker.success_threshold = 5;
        config.circuit_breaker.half_open_probe_count = 3;
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(
            errors[0],
            ValidationError::SuccessExceedsProbes { success: 5, probes: 3 }
        ));
    }
}
