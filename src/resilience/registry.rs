//! Circuit breaker registry.
//!
//! # Responsibilities
//! - Own the named breaker for each upstream dependency
//! - Track how many circuits are open and raise the cascading-failure
//!   signal when a majority are
//! - Sweep all breakers on a timer so circuits open even between calls
//!
//! # Design Decisions
//! - Breakers are created on demand from shared defaults
//! - The open-circuit tally is updated synchronously on every transition;
//!   readers tolerate slight staleness
//! - Cascading detection is the only cross-breaker coupling

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::time;

use crate::config::schema::CircuitBreakerConfig;
use crate::resilience::backoff::RecoveryStrategy;
use crate::resilience::breaker::{CircuitBreaker, CircuitMetrics, CircuitState};
use crate::signals::SignalBus;

/// Shared open-circuit counters, updated by breakers on every transition.
pub(crate) struct OpenTally {
    open: AtomicUsize,
    total: AtomicUsize,
}

impl OpenTally {
    fn new() -> Self {
        Self {
            open: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
        }
    }

    fn register(&self) {
        self.total.fetch_add(1, Ordering::SeqCst);
    }

    /// Returns (open, total) after counting the new open circuit.
    pub(crate) fn note_open(&self) -> (usize, usize) {
        let open = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        (open, self.total.load(Ordering::SeqCst))
    }

    pub(crate) fn note_left_open(&self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }

    fn snapshot(&self) -> (usize, usize) {
        (
            self.open.load(Ordering::SeqCst),
            self.total.load(Ordering::SeqCst),
        )
    }
}

/// Owns the circuit breakers for all upstream dependencies.
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    defaults: CircuitBreakerConfig,
    tally: Arc<OpenTally>,
    bus: SignalBus,
    recovery_override: Mutex<Option<RecoveryStrategy>>,
}

impl CircuitBreakerRegistry {
    pub fn new(defaults: CircuitBreakerConfig, bus: SignalBus) -> Self {
        Self {
            breakers: DashMap::new(),
            defaults,
            tally: Arc::new(OpenTally::new()),
            bus,
            recovery_override: Mutex::new(None),
        }
    }

    /// Get the breaker for a dependency, creating it from the defaults on
    /// first use.
    pub fn circuit(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.get(name) {
            return breaker.clone();
        }
        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                self.tally.register();
                let breaker = Arc::new(CircuitBreaker::with_tally(
                    name,
                    self.defaults.clone(),
                    self.bus.clone(),
                    Some(self.tally.clone()),
                ));
                let current = *self
                    .recovery_override
                    .lock()
                    .expect("recovery override poisoned");
                if current.is_some() {
                    breaker.set_recovery_override(current);
                }
                breaker
            })
            .value()
            .clone()
    }

    pub fn all_states(&self) -> HashMap<String, CircuitState> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().state()))
            .collect()
    }

    pub fn all_metrics(&self) -> HashMap<String, CircuitMetrics> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().metrics()))
            .collect()
    }

    /// Operator action: close every circuit and clear its history.
    pub fn reset_all(&self) {
        for entry in self.breakers.iter() {
            entry.value().reset();
        }
        tracing::info!(count = self.breakers.len(), "All circuits reset");
    }

    /// (open, total) circuit counts; slightly stale under concurrency.
    pub fn open_fraction(&self) -> (usize, usize) {
        self.tally.snapshot()
    }

    /// Apply a recovery-strategy override to all breakers, present and
    /// future (degradation control). `None` restores configured strategies.
    pub fn set_recovery_override(&self, strategy: Option<RecoveryStrategy>) {
        *self
            .recovery_override
            .lock()
            .expect("recovery override poisoned") = strategy;
        for entry in self.breakers.iter() {
            entry.value().set_recovery_override(strategy);
        }
    }

    /// Background sweep re-evaluating every breaker.
    pub async fn run_monitor(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let interval = Duration::from_secs(self.defaults.monitor_interval_secs.max(1));
        tracing::info!(interval_secs = interval.as_secs(), "Breaker monitor starting");
        let mut ticker = time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    for entry in self.breakers.iter() {
                        entry.value().tick();
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Breaker monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
