//! Typed signal bus.
//!
//! # Data Flow
//! ```text
//! Breakers / registry / degradation manager
//!     → SignalBus::send (bounded broadcast, never blocks)
//!     → subscribers (degradation manager, external alerting)
//! ```
//!
//! # Design Decisions
//! - One enum of typed payloads instead of string-keyed events
//! - Lagging receivers drop oldest signals; these are advisory, not durable
//! - The only cross-subsystem coupling goes through this bus or an explicit
//!   method call, never through ambient globals

use tokio::sync::broadcast;

use crate::degradation::level::DegradationLevel;
use crate::resilience::breaker::CircuitState;

/// Signals emitted by the core subsystems.
#[derive(Debug, Clone)]
pub enum Signal {
    /// A breaker moved between states.
    StateChanged {
        circuit: String,
        from: CircuitState,
        to: CircuitState,
    },
    /// A breaker tripped open.
    CircuitOpened { circuit: String },
    /// A breaker recovered to closed.
    CircuitClosed { circuit: String },
    /// More than half of all registered breakers are open.
    CascadingFailure { open: usize, total: usize },
    /// The degradation manager applied a (higher) level.
    DegradationApplied {
        level: DegradationLevel,
        reason: String,
    },
    /// The degradation manager stepped down a level.
    RecoveryApplied { level: DegradationLevel },
    /// A registered fallback produced the result for a call.
    FallbackUsed { circuit: String },
}

/// Cloneable handle to the broadcast bus.
#[derive(Clone)]
pub struct SignalBus {
    tx: broadcast::Sender<Signal>,
}

impl SignalBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit a signal. Succeeds even with no subscribers.
    pub fn send(&self, signal: Signal) {
        let _ = self.tx.send(signal);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.tx.subscribe()
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new(64)
    }
}
