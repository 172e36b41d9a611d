//! Aggregation strategies.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How a logical request is dispatched across eligible sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationStrategy {
    /// Try sources in priority order, return the first success.
    FirstSuccess,
    /// Same walk as `FirstSuccess`; named for its role as the degraded
    /// default, where minimizing cost matters more than latency.
    Fallback,
    /// Fan out to the top sources and require a quorum of agreement.
    Consensus,
    /// Fan out to the top sources and keep the most reliable answer.
    Weighted,
    /// Fan out to every eligible source and return everything.
    Complete,
}

impl std::fmt::Display for AggregationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AggregationStrategy::FirstSuccess => "first_success",
            AggregationStrategy::Fallback => "fallback",
            AggregationStrategy::Consensus => "consensus",
            AggregationStrategy::Weighted => "weighted",
            AggregationStrategy::Complete => "complete",
        };
        write!(f, "{name}")
    }
}

/// Terminal aggregation failures. These surface inside a failed
/// `DataResponse`, not as raised errors.
#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("no eligible sources for request type '{0}'")]
    NoEligibleSources(String),

    #[error("consensus not reached: {got} of {needed} required responses")]
    ConsensusNotReached { got: usize, needed: usize },

    #[error("all {0} eligible sources failed")]
    AllSourcesFailed(usize),
}
