//! Upstream data source subsystem.
//!
//! # Data Flow
//! ```text
//! Live request outcomes (coordinator):
//!     → source.rs (exponential smoothing of error rate / latency)
//!     → quota.rs (per-window usage accounting)
//!
//! Background probes (prober.rs):
//!     Periodic timer
//!     → ping each source's client
//!     → same smoothing, plus offline detection
//!
//! registry.rs answers eligibility queries for the coordinator.
//! ```
//!
//! # Design Decisions
//! - Active probes and passive request outcomes are complementary
//! - Smoothed health, not raw counters, so isolated blips don't flip status
//! - Health state is per-source; sources never coordinate with each other

pub mod client;
pub mod prober;
pub mod quota;
pub mod registry;
pub mod source;

pub use client::{SourceClient, UpstreamError};
pub use prober::SourceProber;
pub use registry::SourceRegistry;
pub use source::{Source, SourceHealth, SourceStatus};
