//! Multi-source request coordination.
//!
//! # Data Flow
//! ```text
//! Logical request (request.rs)
//!     → cache.rs (fresh entry? return immediately)
//!     → sources::registry (eligibility + priority order)
//!     → engine.rs dispatches per the active strategy (strategy.rs):
//!         first_success / fallback: sequential failover
//!         consensus / weighted: bounded concurrent fan-out
//!         complete: full fan-out
//!       each attempt goes through that source's circuit breaker
//!     → outcomes feed source health, quota, and tracker.rs
//!     → unified DataResponse with provenance
//! ```
//!
//! # Design Decisions
//! - A failed request is a typed response, never a raw error, as long as
//!   alternatives existed
//! - Sequential strategies minimize cost; concurrent ones minimize latency
//! - Cost accrues per attempt regardless of outcome

pub mod cache;
pub mod engine;
pub mod request;
pub mod strategy;
pub mod tracker;

pub use engine::MultiSourceCoordinator;
pub use request::{DataRequest, DataResponse, ResponseMetadata, SourceFailure};
pub use strategy::AggregationStrategy;
