//! Graceful degradation subsystem.
//!
//! # Data Flow
//! ```text
//! Every evaluation tick (5s):
//!     breaker registry + request tracker + source registry + resource probe
//!     → SystemMetrics snapshot (triggers.rs)
//!     → first matching trigger above the current level escalates one step
//!       (60s cooldown hysteresis), else recovery is considered
//!     → manager.rs applies the level: feature flags, coordinator
//!       strategy, breaker recovery strategy
//!
//! Cascading-failure signal:
//!     → immediate escalation, cooldown bypassed
//! ```
//!
//! # Design Decisions
//! - Levels reduce functional scope instead of failing outright
//! - Applying a level is cumulative from the NORMAL baseline, so flag
//!   restriction is monotonic in level
//! - Recovery steps down one level at a time, never straight to NORMAL
//! - Metric evaluation never errors; a missing metric matches no trigger

pub mod level;
pub mod manager;
pub mod triggers;

pub use level::{DegradationLevel, Feature, FeatureFlags, OperationPriority};
pub use manager::{GracefulDegradationManager, NoopResourceProbe, ResourceProbe};
pub use triggers::SystemMetrics;
