//! Composition root.
//!
//! # Responsibilities
//! - Build the breaker registry, source registry, coordinator, and
//!   degradation manager as explicitly wired instances
//! - Spawn the background loops against a shutdown coordinator
//! - Expose the external interface in one place
//!
//! # Design Decisions
//! - No ambient globals: every subsystem receives its collaborators
//! - Provider clients are injected by name, so the same wiring serves
//!   production transports and deterministic test fakes

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::config::schema::MeshConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::coordinator::engine::MultiSourceCoordinator;
use crate::coordinator::request::{DataRequest, DataResponse};
use crate::degradation::manager::{GracefulDegradationManager, ResourceProbe};
use crate::lifecycle::Shutdown;
use crate::resilience::registry::CircuitBreakerRegistry;
use crate::signals::{Signal, SignalBus};
use crate::sources::client::SourceClient;
use crate::sources::prober::SourceProber;
use crate::sources::registry::SourceRegistry;
use crate::sources::source::Source;

/// Errors building a mesh from configuration.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("configuration invalid: {}", format_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("no client registered for source '{0}'")]
    MissingClient(String),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// The assembled resilience control plane.
pub struct SourceMesh {
    config: Arc<MeshConfig>,
    bus: SignalBus,
    breakers: Arc<CircuitBreakerRegistry>,
    sources: Arc<SourceRegistry>,
    coordinator: Arc<MultiSourceCoordinator>,
    degradation: Arc<GracefulDegradationManager>,
}

impl std::fmt::Debug for SourceMesh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceMesh").finish_non_exhaustive()
    }
}

impl SourceMesh {
    /// Wire every subsystem from validated configuration. `clients` maps
    /// source names to their provider transports.
    pub fn new(
        config: MeshConfig,
        mut clients: HashMap<String, Arc<dyn SourceClient>>,
        probe: Arc<dyn ResourceProbe>,
    ) -> Result<Self, BuildError> {
        validate_config(&config).map_err(BuildError::Validation)?;

        let bus = SignalBus::default();
        let breakers = Arc::new(CircuitBreakerRegistry::new(
            config.circuit_breaker.clone(),
            bus.clone(),
        ));

        let mut sources = Vec::with_capacity(config.sources.len());
        for source_config in &config.sources {
            let client = clients
                .remove(&source_config.name)
                .ok_or_else(|| BuildError::MissingClient(source_config.name.clone()))?;
            sources.push(Arc::new(Source::new(source_config.clone(), client)));
        }
        let sources = Arc::new(SourceRegistry::new(sources));

        let coordinator = Arc::new(MultiSourceCoordinator::new(
            sources.clone(),
            breakers.clone(),
            &config.coordinator,
        ));

        let degradation = Arc::new(GracefulDegradationManager::new(
            &config.degradation,
            coordinator.clone(),
            breakers.clone(),
            sources.clone(),
            probe,
            bus.clone(),
        ));

        tracing::info!(
            sources = config.sources.len(),
            strategy = %config.coordinator.strategy,
            "Source mesh assembled"
        );

        Ok(Self {
            config: Arc::new(config),
            bus,
            breakers,
            sources,
            coordinator,
            degradation,
        })
    }

    /// Start the breaker monitor, source prober, and degradation
    /// evaluator. Each exits on the shutdown signal.
    pub fn spawn_background(&self, shutdown: &Shutdown) {
        tokio::spawn(self.breakers.clone().run_monitor(shutdown.subscribe()));

        let prober = SourceProber::new(self.sources.clone(), self.config.health_probe.clone());
        tokio::spawn(prober.run(shutdown.subscribe()));

        tokio::spawn(self.degradation.clone().run(shutdown.subscribe()));
    }

    /// Route a logical request through the coordinator.
    pub async fn request_data(&self, request: DataRequest) -> DataResponse {
        self.coordinator.request_data(request).await
    }

    pub fn coordinator(&self) -> &Arc<MultiSourceCoordinator> {
        &self.coordinator
    }

    pub fn degradation(&self) -> &Arc<GracefulDegradationManager> {
        &self.degradation
    }

    pub fn breakers(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.breakers
    }

    pub fn sources(&self) -> &Arc<SourceRegistry> {
        &self.sources
    }

    pub fn config(&self) -> &MeshConfig {
        &self.config
    }

    /// Subscribe to state-change, cascading-failure, degradation, and
    /// fallback signals.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Signal> {
        self.bus.subscribe()
    }
}
