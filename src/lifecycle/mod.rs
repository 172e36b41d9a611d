//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Load config → Validate → Build SourceMesh → spawn_background
//!
//! Shutdown (shutdown.rs):
//!     Shutdown::trigger → broadcast → monitor loops drain and exit
//! ```
//!
//! # Design Decisions
//! - Background loops (breaker monitor, degradation evaluator, source
//!   prober) all subscribe to the same broadcast channel
//! - Shutdown is cooperative; no task is aborted mid-call

pub mod shutdown;

pub use shutdown::Shutdown;
