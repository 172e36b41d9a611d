//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to an upstream source:
//!     → breaker.rs (admission: fast-reject when open, probe when half-open)
//!     → timeout race around the call (2x slow-call duration)
//!     → outcome recorded into the rolling window
//!     → health evaluation (volume-gated) can trip CLOSED → OPEN
//!     → backoff.rs computes the cool-down before the next probe round
//!
//! registry.rs owns the named breakers, sweeps them on a timer so a
//! breaker can open even between calls, and raises the cascading-failure
//! signal when a majority of circuits are open.
//! ```
//!
//! # Design Decisions
//! - Every external call has a deadline; expiry is a failure outcome
//! - One single-writer state machine per breaker, guarded by its own lock
//! - Breakers never know about each other; the only cross-breaker
//!   coupling is the registry's open-circuit tally

pub mod backoff;
pub mod breaker;
pub mod registry;

pub use breaker::{BreakerError, CircuitBreaker, CircuitMetrics, CircuitState};
pub use registry::CircuitBreakerRegistry;
