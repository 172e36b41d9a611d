//! The multi-source coordinator.
//!
//! # Responsibilities
//! - Route a logical request across eligible sources per the active
//!   aggregation strategy
//! - Wrap every attempt in that source's circuit breaker
//! - Account health, quota, and cost per attempt
//! - Return a unified response with provenance, never a raw error

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use futures_util::future::join_all;
use serde_json::{json, Value};
use tokio::time::Instant;

use crate::config::schema::CoordinatorConfig;
use crate::coordinator::cache::{CachedResponse, ResponseCache};
use crate::coordinator::request::{DataRequest, DataResponse, ResponseMetadata, SourceFailure};
use crate::coordinator::strategy::{AggregationError, AggregationStrategy};
use crate::coordinator::tracker::RequestTracker;
use crate::observability::metrics;
use crate::resilience::registry::CircuitBreakerRegistry;
use crate::sources::client::UpstreamError;
use crate::sources::registry::SourceRegistry;
use crate::sources::source::{Source, SourceHealth};

/// One source attempt, concluded.
struct Attempt {
    source: String,
    reliability: f64,
    cost: f64,
    result: Result<Value, String>,
}

pub struct MultiSourceCoordinator {
    sources: Arc<SourceRegistry>,
    breakers: Arc<CircuitBreakerRegistry>,
    cache: ResponseCache,
    strategy: ArcSwap<AggregationStrategy>,
    tracker: RequestTracker,
    fan_out: usize,
}

impl MultiSourceCoordinator {
    pub fn new(
        sources: Arc<SourceRegistry>,
        breakers: Arc<CircuitBreakerRegistry>,
        config: &CoordinatorConfig,
    ) -> Self {
        Self {
            sources,
            breakers,
            cache: ResponseCache::new(
                config.cache_capacity,
                Duration::from_secs(config.cache_ttl_secs),
            ),
            strategy: ArcSwap::new(Arc::new(config.strategy)),
            tracker: RequestTracker::new(Duration::from_secs(config.tracking_window_secs)),
            fan_out: config.fan_out.max(1),
        }
    }

    /// Swap the active aggregation strategy (operator or degradation
    /// control). Subsequent requests observe the new strategy.
    pub fn set_strategy(&self, strategy: AggregationStrategy) {
        let previous = **self.strategy.load();
        if previous != strategy {
            tracing::info!(from = %previous, to = %strategy, "Aggregation strategy changed");
        }
        self.strategy.store(Arc::new(strategy));
    }

    pub fn strategy(&self) -> AggregationStrategy {
        **self.strategy.load()
    }

    pub fn source_health(&self) -> HashMap<String, SourceHealth> {
        self.sources.health_snapshot()
    }

    pub fn tracker(&self) -> &RequestTracker {
        &self.tracker
    }

    /// Route one logical request. Always returns a typed response.
    pub async fn request_data(&self, request: DataRequest) -> DataResponse {
        let started = Instant::now();

        if request.cache {
            if let Some(hit) = self.cache.get(&request.cache_key()) {
                metrics::record_cache_hit();
                tracing::debug!(request_type = %request.request_type, "Cache hit");
                return DataResponse {
                    request_id: request.id,
                    success: true,
                    data: Some(hit.data),
                    source: hit.source,
                    fallbacks_used: Vec::new(),
                    latency_ms: 0,
                    total_cost: 0.0,
                    errors: Vec::new(),
                    metadata: ResponseMetadata {
                        cache_hit: true,
                        aggregated: hit.aggregated,
                        confidence: hit.confidence,
                    },
                };
            }
            metrics::record_cache_miss();
        }

        let eligible = self.sources.eligible(&request);
        if eligible.is_empty() {
            let error = AggregationError::NoEligibleSources(request.request_type.clone());
            tracing::warn!(request_type = %request.request_type, "No eligible sources");
            let latency = started.elapsed();
            self.tracker.record(false, latency.as_millis() as u64);
            metrics::record_request(false, latency);
            return DataResponse {
                request_id: request.id,
                success: false,
                data: None,
                source: None,
                fallbacks_used: Vec::new(),
                latency_ms: latency.as_millis() as u64,
                total_cost: 0.0,
                errors: vec![SourceFailure {
                    source: "coordinator".to_string(),
                    message: error.to_string(),
                }],
                metadata: ResponseMetadata::default(),
            };
        }

        let strategy = self.strategy();
        let mut response = match strategy {
            AggregationStrategy::FirstSuccess | AggregationStrategy::Fallback => {
                self.sequential(&eligible, &request).await
            }
            AggregationStrategy::Consensus => self.consensus(&eligible, &request).await,
            AggregationStrategy::Weighted => self.weighted(&eligible, &request).await,
            AggregationStrategy::Complete => self.complete(&eligible, &request).await,
        };

        response.request_id = request.id;
        response.latency_ms = started.elapsed().as_millis() as u64;
        self.tracker.record(response.success, response.latency_ms);
        metrics::record_request(response.success, started.elapsed());

        if response.success && request.cache {
            if let Some(data) = &response.data {
                self.cache.insert(
                    request.cache_key(),
                    CachedResponse {
                        data: data.clone(),
                        source: response.source.clone(),
                        aggregated: response.metadata.aggregated,
                        confidence: response.metadata.confidence,
                    },
                );
            }
        }

        response
    }

    /// One breaker-wrapped call to one source, with full accounting.
    async fn attempt(&self, source: &Arc<Source>, request: &DataRequest) -> Attempt {
        let name = source.name().to_string();
        let config = source.config();
        let started = Instant::now();

        source.quota().record();

        let breaker = self.breakers.circuit(&name);
        let client = source.client();
        let per_call = Duration::from_millis(request.timeout_ms.unwrap_or(config.timeout_ms));
        let call_request = request.clone();

        let result = breaker
            .execute(move || async move {
                match tokio::time::timeout(per_call, client.fetch(&call_request)).await {
                    Ok(result) => result,
                    Err(_) => Err(UpstreamError::Provider(format!(
                        "timed out after {}ms",
                        per_call.as_millis()
                    ))),
                }
            })
            .await;

        let latency = started.elapsed();
        let result = match result {
            Ok(value) => {
                source.record_outcome(true, latency);
                metrics::record_source_attempt(&name, true);
                Ok(value)
            }
            Err(error) => {
                source.record_outcome(false, latency);
                metrics::record_source_attempt(&name, false);
                if error.is_open() {
                    // Routine fast-reject, not an incident.
                    tracing::debug!(source = %name, "Attempt rejected by open circuit");
                } else {
                    tracing::warn!(source = %name, %error, "Source attempt failed");
                }
                Err(error.to_string())
            }
        };

        Attempt {
            source: name,
            reliability: config.reliability,
            cost: config.cost_per_call,
            result,
        }
    }

    /// Walk sources in priority order; first success wins.
    async fn sequential(&self, eligible: &[Arc<Source>], request: &DataRequest) -> DataResponse {
        let mut errors = Vec::new();
        let mut tried = Vec::new();
        let mut total_cost = 0.0;

        for source in eligible {
            let attempt = self.attempt(source, request).await;
            total_cost += attempt.cost;
            match attempt.result {
                Ok(value) => {
                    if !tried.is_empty() {
                        tracing::info!(
                            source = %attempt.source,
                            fallbacks = tried.len(),
                            "Request served after failover"
                        );
                    }
                    return DataResponse {
                        request_id: request.id,
                        success: true,
                        data: Some(value),
                        source: Some(attempt.source),
                        fallbacks_used: tried,
                        latency_ms: 0,
                        total_cost,
                        errors,
                        metadata: ResponseMetadata {
                            cache_hit: false,
                            aggregated: false,
                            confidence: attempt.reliability,
                        },
                    };
                }
                Err(message) => {
                    tried.push(attempt.source.clone());
                    errors.push(SourceFailure {
                        source: attempt.source,
                        message,
                    });
                }
            }
        }

        let error = AggregationError::AllSourcesFailed(eligible.len());
        tracing::warn!(%error, "Sequential dispatch exhausted");
        DataResponse {
            request_id: request.id,
            success: false,
            data: None,
            source: None,
            fallbacks_used: tried,
            latency_ms: 0,
            total_cost,
            errors,
            metadata: ResponseMetadata::default(),
        }
    }

    /// Fan out to the top sources; require agreement from at least two.
    async fn consensus(&self, eligible: &[Arc<Source>], request: &DataRequest) -> DataResponse {
        const QUORUM: usize = 2;

        let chosen = &eligible[..eligible.len().min(self.fan_out)];
        let attempts = join_all(chosen.iter().map(|s| self.attempt(s, request))).await;

        let total_cost = attempts.iter().map(|a| a.cost).sum();
        let mut successes: Vec<(String, Value)> = Vec::new();
        let mut failed = Vec::new();
        let mut errors = Vec::new();
        for attempt in attempts {
            match attempt.result {
                Ok(value) => successes.push((attempt.source, value)),
                Err(message) => {
                    failed.push(attempt.source.clone());
                    errors.push(SourceFailure {
                        source: attempt.source,
                        message,
                    });
                }
            }
        }

        if successes.len() < QUORUM {
            let error = AggregationError::ConsensusNotReached {
                got: successes.len(),
                needed: QUORUM,
            };
            tracing::warn!(%error, "Consensus dispatch failed");
            return DataResponse {
                request_id: request.id,
                success: false,
                data: None,
                source: None,
                fallbacks_used: failed,
                latency_ms: 0,
                total_cost,
                errors,
                metadata: ResponseMetadata::default(),
            };
        }

        // Earlier-priority sources win key conflicts deterministically.
        let merged = merge_first_key_wins(&successes);
        DataResponse {
            request_id: request.id,
            success: true,
            data: Some(merged),
            source: Some(successes[0].0.clone()),
            fallbacks_used: failed,
            latency_ms: 0,
            total_cost,
            errors,
            metadata: ResponseMetadata {
                cache_hit: false,
                aggregated: true,
                confidence: 0.9,
            },
        }
    }

    /// Fan out to the top sources; the most reliable surviving answer wins.
    async fn weighted(&self, eligible: &[Arc<Source>], request: &DataRequest) -> DataResponse {
        let chosen = &eligible[..eligible.len().min(self.fan_out)];
        let attempts = join_all(chosen.iter().map(|s| self.attempt(s, request))).await;

        let total_cost = attempts.iter().map(|a| a.cost).sum();
        let mut surviving: Vec<(String, Value, f64)> = Vec::new();
        let mut failed = Vec::new();
        let mut errors = Vec::new();
        for attempt in attempts {
            match attempt.result {
                Ok(value) => surviving.push((attempt.source, value, attempt.reliability)),
                Err(message) => {
                    failed.push(attempt.source.clone());
                    errors.push(SourceFailure {
                        source: attempt.source,
                        message,
                    });
                }
            }
        }

        if surviving.is_empty() {
            let error = AggregationError::AllSourcesFailed(chosen.len());
            tracing::warn!(%error, "Weighted dispatch failed");
            return DataResponse {
                request_id: request.id,
                success: false,
                data: None,
                source: None,
                fallbacks_used: failed,
                latency_ms: 0,
                total_cost,
                errors,
                metadata: ResponseMetadata::default(),
            };
        }

        let confidence =
            surviving.iter().map(|(_, _, w)| w).sum::<f64>() / surviving.len() as f64;
        // Strictly-greater comparison: earlier-priority sources win ties.
        let mut best = 0;
        for (index, candidate) in surviving.iter().enumerate().skip(1) {
            if candidate.2 > surviving[best].2 {
                best = index;
            }
        }
        let (source, value, _) = surviving.swap_remove(best);

        DataResponse {
            request_id: request.id,
            success: true,
            data: Some(value),
            source: Some(source),
            fallbacks_used: failed,
            latency_ms: 0,
            total_cost,
            errors,
            metadata: ResponseMetadata {
                cache_hit: false,
                aggregated: false,
                confidence,
            },
        }
    }

    /// Fan out to every eligible source and return the whole picture.
    async fn complete(&self, eligible: &[Arc<Source>], request: &DataRequest) -> DataResponse {
        let attempts = join_all(eligible.iter().map(|s| self.attempt(s, request))).await;
        let total = attempts.len();

        let total_cost = attempts.iter().map(|a| a.cost).sum();
        let mut by_source = serde_json::Map::new();
        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        let mut errors = Vec::new();
        for attempt in attempts {
            match attempt.result {
                Ok(value) => {
                    succeeded.push(attempt.source.clone());
                    by_source.insert(attempt.source, value);
                }
                Err(message) => {
                    failed.push(attempt.source.clone());
                    errors.push(SourceFailure {
                        source: attempt.source,
                        message,
                    });
                }
            }
        }

        let confidence = if total > 0 {
            succeeded.len() as f64 / total as f64
        } else {
            0.0
        };
        let success = !succeeded.is_empty();
        DataResponse {
            request_id: request.id,
            success,
            data: success.then(|| {
                json!({
                    "sources": succeeded.clone(),
                    "data": Value::Object(by_source),
                })
            }),
            source: succeeded.first().cloned(),
            fallbacks_used: failed,
            latency_ms: 0,
            total_cost,
            errors,
            metadata: ResponseMetadata {
                cache_hit: false,
                aggregated: true,
                confidence,
            },
        }
    }
}

/// Merge object payloads, earliest source winning key conflicts. If no
/// payload is an object, the earliest payload is returned verbatim.
fn merge_first_key_wins(successes: &[(String, Value)]) -> Value {
    let mut merged = serde_json::Map::new();
    let mut any_object = false;
    for (_, value) in successes {
        if let Value::Object(fields) = value {
            any_object = true;
            for (key, field) in fields {
                if !merged.contains_key(key) {
                    merged.insert(key.clone(), field.clone());
                }
            }
        }
    }
    if any_object {
        Value::Object(merged)
    } else {
        successes[0].1.clone()
    }
}
