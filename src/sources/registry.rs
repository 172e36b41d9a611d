//! Source registry and eligibility filtering.
//!
//! # Responsibilities
//! - Own the static set of configured sources
//! - Answer eligibility queries for a logical request
//! - Expose health snapshots for operators and the degradation manager

use std::collections::HashMap;
use std::sync::Arc;

use crate::coordinator::request::DataRequest;
use crate::sources::source::{Source, SourceHealth, SourceStatus};

/// Owns all configured sources, ordered by priority.
pub struct SourceRegistry {
    ordered: Vec<Arc<Source>>,
    by_name: HashMap<String, Arc<Source>>,
}

impl SourceRegistry {
    pub fn new(mut sources: Vec<Arc<Source>>) -> Self {
        sources.sort_by_key(|s| s.config().priority);
        let by_name = sources
            .iter()
            .map(|s| (s.name().to_string(), s.clone()))
            .collect();
        Self {
            ordered: sources,
            by_name,
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<Source>> {
        self.by_name.get(name).cloned()
    }

    pub fn all(&self) -> &[Arc<Source>] {
        &self.ordered
    }

    /// Sources able to serve this request, most preferred first.
    ///
    /// Drops excluded sources, intersects with required ones, skips
    /// offline sources, matches capability tags against the request type,
    /// and skips exhausted quotas.
    pub fn eligible(&self, request: &DataRequest) -> Vec<Arc<Source>> {
        self.ordered
            .iter()
            .filter(|source| {
                let name = source.name();
                if request.exclude_sources.iter().any(|n| n == name) {
                    return false;
                }
                if !request.required_sources.is_empty()
                    && !request.required_sources.iter().any(|n| n == name)
                {
                    return false;
                }
                if !source.is_available() {
                    return false;
                }
                if !source
                    .config()
                    .capabilities
                    .iter()
                    .any(|c| c == &request.request_type)
                {
                    return false;
                }
                if !source.quota().has_quota() {
                    tracing::debug!(source = %name, "Source skipped, quota exhausted");
                    return false;
                }
                true
            })
            .cloned()
            .collect()
    }

    pub fn health_snapshot(&self) -> HashMap<String, SourceHealth> {
        self.ordered
            .iter()
            .map(|s| (s.name().to_string(), s.health()))
            .collect()
    }

    /// Sources currently unusable (unhealthy or offline).
    pub fn unhealthy_count(&self) -> usize {
        self.ordered
            .iter()
            .filter(|s| matches!(s.status(), SourceStatus::Unhealthy | SourceStatus::Offline))
            .count()
    }
}
