//! Logical request and unified response types.

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::degradation::level::OperationPriority;

/// A logical data request, routed across sources by the coordinator.
#[derive(Debug, Clone, Serialize)]
pub struct DataRequest {
    pub id: Uuid,

    /// Logical type tag, matched against source capability tags.
    pub request_type: String,

    pub params: Value,

    pub priority: OperationPriority,

    /// Restrict routing to these sources (intersected with eligibility).
    pub required_sources: Vec<String>,

    /// Never route to these sources.
    pub exclude_sources: Vec<String>,

    /// Per-attempt timeout override in milliseconds.
    pub timeout_ms: Option<u64>,

    /// Serve from / populate the response cache.
    pub cache: bool,
}

impl DataRequest {
    pub fn new(request_type: impl Into<String>, params: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            request_type: request_type.into(),
            params,
            priority: OperationPriority::Medium,
            required_sources: Vec::new(),
            exclude_sources: Vec::new(),
            timeout_ms: None,
            cache: false,
        }
    }

    pub fn with_priority(mut self, priority: OperationPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_cache(mut self) -> Self {
        self.cache = true;
        self
    }

    pub fn with_required_sources(mut self, sources: Vec<String>) -> Self {
        self.required_sources = sources;
        self
    }

    pub fn with_excluded_sources(mut self, sources: Vec<String>) -> Self {
        self.exclude_sources = sources;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Cache key: type plus canonicalized parameters. Identical logical
    /// requests collide on purpose.
    pub(crate) fn cache_key(&self) -> String {
        format!("{}:{}", self.request_type, self.params)
    }
}

/// Why one source attempt failed.
#[derive(Debug, Clone, Serialize)]
pub struct SourceFailure {
    pub source: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, Default)]
pub struct ResponseMetadata {
    pub cache_hit: bool,
    pub aggregated: bool,
    pub confidence: f64,
}

/// Unified response with provenance.
#[derive(Debug, Clone, Serialize)]
pub struct DataResponse {
    pub request_id: Uuid,
    pub success: bool,
    pub data: Option<Value>,

    /// Source that produced the returned data.
    pub source: Option<String>,

    /// Sources tried and failed before (or alongside) the winner.
    pub fallbacks_used: Vec<String>,

    pub latency_ms: u64,

    /// Cost units accrued across every attempt.
    pub total_cost: f64,

    pub errors: Vec<SourceFailure>,

    pub metadata: ResponseMetadata,
}
