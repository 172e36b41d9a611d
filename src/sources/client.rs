//! Upstream provider seam.

use futures_util::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;

use crate::coordinator::request::DataRequest;

/// Errors surfaced by a provider client.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    /// The provider endpoint could not be reached at all.
    #[error("provider unreachable: {0}")]
    Unreachable(String),

    /// The provider answered with an error.
    #[error("provider request failed: {0}")]
    Provider(String),

    /// The provider rejected the call for quota reasons.
    #[error("provider rate limited")]
    RateLimited,

    /// The provider answered with something we could not interpret.
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

/// A single upstream data provider.
///
/// Implementations wrap real provider transports; tests use deterministic
/// scripted fakes. Calls must be cancel-safe: the coordinator abandons
/// them on timeout rather than killing them.
pub trait SourceClient: Send + Sync {
    /// Fetch data for a logical request.
    fn fetch<'a>(&'a self, request: &'a DataRequest) -> BoxFuture<'a, Result<Value, UpstreamError>>;

    /// Lightweight reachability/latency probe.
    fn ping(&self) -> BoxFuture<'_, Result<(), UpstreamError>>;
}
