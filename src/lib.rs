//! In-process resilience control plane for multi-provider data
//! aggregation.
//!
//! Three tightly coupled subsystems form one control loop:
//!
//! - per-dependency circuit breaking ([`resilience`]), isolating a
//!   failing upstream call path before it cascades;
//! - system-wide graceful degradation ([`degradation`]), a composite
//!   health ladder that reduces functional scope under load instead of
//!   failing outright;
//! - multi-source request coordination ([`coordinator`]), routing a
//!   logical request across ranked, capability-tagged providers
//!   ([`sources`]) with pluggable aggregation semantics and automatic
//!   failover.
//!
//! Everything is wired at a composition root ([`mesh::SourceMesh`]); all
//! state is in-memory and reconstructible.

pub mod config;
pub mod coordinator;
pub mod degradation;
pub mod lifecycle;
pub mod mesh;
pub mod observability;
pub mod resilience;
pub mod signals;
pub mod sources;

pub use config::MeshConfig;
pub use coordinator::engine::MultiSourceCoordinator;
pub use coordinator::request::{DataRequest, DataResponse};
pub use coordinator::strategy::AggregationStrategy;
pub use degradation::level::{DegradationLevel, Feature, OperationPriority};
pub use degradation::manager::GracefulDegradationManager;
pub use lifecycle::Shutdown;
pub use mesh::SourceMesh;
pub use resilience::breaker::{CircuitBreaker, CircuitState};
pub use resilience::registry::CircuitBreakerRegistry;
pub use signals::Signal;
pub use sources::client::{SourceClient, UpstreamError};
