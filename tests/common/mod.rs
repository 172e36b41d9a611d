//! Shared deterministic fakes for integration tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde_json::Value;

use source_mesh::config::schema::{MeshConfig, RateLimitConfig, SourceConfig};
use source_mesh::coordinator::request::DataRequest;
use source_mesh::degradation::manager::NoopResourceProbe;
use source_mesh::sources::client::{SourceClient, UpstreamError};
use source_mesh::SourceMesh;

/// A provider fake that answers from a fixed script, then repeats a
/// default answer forever. Entirely deterministic.
pub struct ScriptedClient {
    script: Mutex<VecDeque<Result<Value, UpstreamError>>>,
    default: Result<Value, UpstreamError>,
    latency: Duration,
    fetches: AtomicUsize,
}

#[allow(dead_code)]
impl ScriptedClient {
    pub fn always_ok(value: Value) -> Arc<Self> {
        Self::script(Vec::new(), Ok(value))
    }

    pub fn always_err(message: &str) -> Arc<Self> {
        Self::script(
            Vec::new(),
            Err(UpstreamError::Provider(message.to_string())),
        )
    }

    pub fn script(
        steps: Vec<Result<Value, UpstreamError>>,
        default: Result<Value, UpstreamError>,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(steps.into()),
            default,
            latency: Duration::ZERO,
            fetches: AtomicUsize::new(0),
        })
    }

    pub fn with_latency(value: Value, latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            default: Ok(value),
            latency,
            fetches: AtomicUsize::new(0),
        })
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl SourceClient for ScriptedClient {
    fn fetch<'a>(&'a self, _request: &'a DataRequest) -> BoxFuture<'a, Result<Value, UpstreamError>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let step = self
            .script
            .lock()
            .expect("script poisoned")
            .pop_front()
            .unwrap_or_else(|| self.default.clone());
        let latency = self.latency;
        Box::pin(async move {
            if latency > Duration::ZERO {
                tokio::time::sleep(latency).await;
            }
            step
        })
    }

    fn ping(&self) -> BoxFuture<'_, Result<(), UpstreamError>> {
        Box::pin(async { Ok(()) })
    }
}

#[allow(dead_code)]
pub fn source_config(name: &str, priority: u32, reliability: f64) -> SourceConfig {
    SourceConfig {
        name: name.to_string(),
        priority,
        capabilities: vec!["price".to_string()],
        rate_limit: RateLimitConfig::default(),
        timeout_ms: 1_000,
        retry_attempts: 2,
        reliability,
        cost_per_call: 1.0,
    }
}

/// Build a mesh over `(config, client)` pairs with the default probe.
#[allow(dead_code)]
pub fn mesh_with(
    mut config: MeshConfig,
    sources: Vec<(SourceConfig, Arc<ScriptedClient>)>,
) -> SourceMesh {
    let mut clients: HashMap<String, Arc<dyn SourceClient>> = HashMap::new();
    for (source, client) in sources {
        clients.insert(source.name.clone(), client);
        config.sources.push(source);
    }
    SourceMesh::new(config, clients, Arc::new(NoopResourceProbe)).expect("mesh builds")
}
