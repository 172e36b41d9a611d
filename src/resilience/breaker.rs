//! Circuit breaker for upstream call paths.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: upstream assumed down, calls fail fast
//! - Half-Open: limited probe calls test whether the upstream recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: window health evaluation trips (volume-gated)
//! Open → Half-Open: cool-down elapsed, next call becomes a probe
//! Half-Open → Closed: successes among the probe round >= success_threshold
//! Half-Open → Open: probe round fails; cool-down grows per recovery strategy
//! ```
//!
//! # Design Decisions
//! - Per-dependency breaker, never global
//! - Single-writer state machine behind one lock; outcomes recorded by
//!   concurrent callers serialize through it
//! - Fail fast in Open (no waiting); optional per-call fallback turns a
//!   fast-reject into a served result
//! - The rolling sample window is the only place raw call history lives

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

use crate::config::schema::CircuitBreakerConfig;
use crate::observability::metrics;
use crate::resilience::backoff::RecoveryStrategy;
use crate::resilience::registry::OpenTally;
use crate::signals::{Signal, SignalBus};

/// Breaker state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Error returned by [`CircuitBreaker::execute`].
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// Fast reject: the circuit is open. Expected and routine under
    /// failure; not an incident.
    #[error("circuit '{circuit}' is open, retry in {retry_in:?}")]
    Open { circuit: String, retry_in: Duration },

    /// The call exceeded its deadline; counted as a failure outcome.
    #[error("upstream call timed out after {0:?}")]
    Timeout(Duration),

    /// The call itself failed.
    #[error("upstream call failed: {0}")]
    Upstream(E),
}

impl<E> BreakerError<E> {
    /// True for the open-circuit fast reject.
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open { .. })
    }
}

/// Snapshot of the breaker's rolling window.
#[derive(Debug, Clone)]
pub struct CircuitMetrics {
    pub state: CircuitState,
    pub total_requests: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub slow_count: usize,
    pub average_duration: Duration,
    pub error_rate: f64,
    pub state_change_count: u64,
    pub last_state_change: Instant,
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    at: Instant,
    success: bool,
    duration: Duration,
}

struct Inner {
    state: CircuitState,
    samples: VecDeque<Sample>,
    retry_count: u32,
    opened_at: Instant,
    cooldown: Duration,
    probes_issued: u32,
    probe_results: VecDeque<bool>,
    state_change_count: u64,
    last_state_change: Instant,
    recovery_override: Option<RecoveryStrategy>,
}

struct WindowStats {
    total: usize,
    successes: usize,
    failures: usize,
    slow: usize,
    average_duration: Duration,
    error_rate: f64,
    slow_rate: f64,
}

/// Per-dependency failure isolator.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
    bus: SignalBus,
    tally: Option<Arc<OpenTally>>,
}

enum Admission {
    Proceed,
    Reject { retry_in: Duration },
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig, bus: SignalBus) -> Self {
        Self::with_tally(name, config, bus, None)
    }

    pub(crate) fn with_tally(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        bus: SignalBus,
        tally: Option<Arc<OpenTally>>,
    ) -> Self {
        let now = Instant::now();
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                samples: VecDeque::new(),
                retry_count: 0,
                opened_at: now,
                cooldown: Duration::ZERO,
                probes_issued: 0,
                probe_results: VecDeque::new(),
                state_change_count: 0,
                last_state_change: now,
                recovery_override: None,
            }),
            bus,
            tally,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Run `op` through the breaker.
    ///
    /// The call races a deadline of twice the slow-call duration; expiry
    /// is recorded as a failure.
    pub async fn execute<F, Fut, T, E>(&self, op: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run(op, None::<fn() -> std::future::Ready<T>>).await
    }

    /// Run `op` through the breaker with a fallback.
    ///
    /// The fallback serves the result when the circuit is open or the call
    /// fails; a fallback served on an open circuit is recorded as a
    /// zero-duration success.
    pub async fn execute_with_fallback<F, Fut, G, GFut, T, E>(
        &self,
        op: F,
        fallback: G,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        G: FnOnce() -> GFut,
        GFut: Future<Output = T>,
    {
        self.run(op, Some(fallback)).await
    }

    async fn run<F, Fut, G, GFut, T, E>(
        &self,
        op: F,
        mut fallback: Option<G>,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        G: FnOnce() -> GFut,
        GFut: Future<Output = T>,
    {
        match self.admit() {
            Admission::Reject { retry_in } => {
                if let Some(fb) = fallback.take() {
                    let value = fb().await;
                    self.record_fallback_success();
                    self.note_fallback();
                    return Ok(value);
                }
                return Err(BreakerError::Open {
                    circuit: self.name.clone(),
                    retry_in,
                });
            }
            Admission::Proceed => {}
        }

        let limit = Duration::from_millis(self.config.slow_call_duration_ms.saturating_mul(2));
        let started = Instant::now();
        match tokio::time::timeout(limit, op()).await {
            Ok(Ok(value)) => {
                self.record_outcome(true, started.elapsed());
                Ok(value)
            }
            Ok(Err(err)) => {
                self.record_outcome(false, started.elapsed());
                if let Some(fb) = fallback.take() {
                    let value = fb().await;
                    self.note_fallback();
                    return Ok(value);
                }
                Err(BreakerError::Upstream(err))
            }
            Err(_) => {
                self.record_outcome(false, limit);
                if let Some(fb) = fallback.take() {
                    let value = fb().await;
                    self.note_fallback();
                    return Ok(value);
                }
                Err(BreakerError::Timeout(limit))
            }
        }
    }

    /// Background sweep: prune stale samples and re-run the health
    /// evaluation, so the circuit can open between calls.
    pub fn tick(&self) {
        let mut events = Vec::new();
        {
            let mut inner = self.lock();
            let horizon = Duration::from_millis(self.config.monitoring_window_ms.saturating_mul(2));
            let now = Instant::now();
            while let Some(front) = inner.samples.front() {
                if now.duration_since(front.at) > horizon {
                    inner.samples.pop_front();
                } else {
                    break;
                }
            }
            if inner.state == CircuitState::Closed {
                self.evaluate_closed(&mut inner, &mut events);
            }
        }
        self.emit(events);
    }

    /// Snapshot the rolling-window metrics.
    pub fn metrics(&self) -> CircuitMetrics {
        let mut inner = self.lock();
        let stats = self.window_stats(&mut inner);
        CircuitMetrics {
            state: inner.state,
            total_requests: stats.total,
            success_count: stats.successes,
            failure_count: stats.failures,
            slow_count: stats.slow,
            average_duration: stats.average_duration,
            error_rate: stats.error_rate,
            state_change_count: inner.state_change_count,
            last_state_change: inner.last_state_change,
        }
    }

    /// Operator action: trip the circuit open immediately.
    pub fn force_open(&self) {
        let mut events = Vec::new();
        {
            let mut inner = self.lock();
            if inner.state != CircuitState::Open {
                let stats = self.window_stats(&mut inner);
                self.open_circuit(&mut inner, stats.error_rate, &mut events);
            }
        }
        self.emit(events);
    }

    /// Operator action: clear all history and close the circuit.
    pub fn reset(&self) {
        let mut events = Vec::new();
        {
            let mut inner = self.lock();
            inner.samples.clear();
            inner.retry_count = 0;
            inner.probe_results.clear();
            inner.probes_issued = 0;
            if inner.state != CircuitState::Closed {
                self.transition(&mut inner, CircuitState::Closed, &mut events);
            }
        }
        self.emit(events);
    }

    /// Override the recovery strategy (degradation control). `None`
    /// restores the configured strategy.
    pub fn set_recovery_override(&self, strategy: Option<RecoveryStrategy>) {
        self.lock().recovery_override = strategy;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("breaker state poisoned")
    }

    fn admit(&self) -> Admission {
        let mut events = Vec::new();
        let admission = {
            let mut inner = self.lock();
            match inner.state {
                CircuitState::Closed => Admission::Proceed,
                CircuitState::Open => {
                    let reopen_at = inner.opened_at + inner.cooldown;
                    let now = Instant::now();
                    if now >= reopen_at {
                        self.transition(&mut inner, CircuitState::HalfOpen, &mut events);
                        inner.probes_issued = 1;
                        Admission::Proceed
                    } else {
                        Admission::Reject {
                            retry_in: reopen_at.saturating_duration_since(now),
                        }
                    }
                }
                CircuitState::HalfOpen => {
                    if inner.probes_issued < self.config.half_open_probe_count {
                        inner.probes_issued += 1;
                        Admission::Proceed
                    } else {
                        // Probe quota taken by in-flight calls.
                        Admission::Reject {
                            retry_in: Duration::ZERO,
                        }
                    }
                }
            }
        };
        self.emit(events);
        admission
    }

    /// A fallback served on a rejected call: a zero-duration success in
    /// the window, but never a probe outcome.
    fn record_fallback_success(&self) {
        let mut inner = self.lock();
        inner.samples.push_back(Sample {
            at: Instant::now(),
            success: true,
            duration: Duration::ZERO,
        });
    }

    fn record_outcome(&self, success: bool, duration: Duration) {
        let mut events = Vec::new();
        {
            let mut inner = self.lock();
            inner.samples.push_back(Sample {
                at: Instant::now(),
                success,
                duration,
            });
            match inner.state {
                CircuitState::HalfOpen => {
                    inner.probe_results.push_back(success);
                    if inner.probe_results.len() as u32 >= self.config.half_open_probe_count {
                        self.evaluate_probe_round(&mut inner, &mut events);
                    }
                }
                CircuitState::Closed => self.evaluate_closed(&mut inner, &mut events),
                CircuitState::Open => {}
            }
        }
        self.emit(events);
    }

    fn evaluate_probe_round(&self, inner: &mut Inner, events: &mut Vec<Signal>) {
        let successes = inner.probe_results.iter().filter(|s| **s).count() as u32;
        if successes >= self.config.success_threshold {
            self.transition(inner, CircuitState::Closed, events);
        } else {
            inner.retry_count += 1;
            let stats = self.window_stats(inner);
            self.open_circuit(inner, stats.error_rate, events);
        }
    }

    fn evaluate_closed(&self, inner: &mut Inner, events: &mut Vec<Signal>) {
        let stats = self.window_stats(inner);
        if stats.total < self.config.volume_threshold as usize {
            return;
        }
        let trip = stats.failures >= self.config.failure_threshold as usize
            || stats.error_rate * 100.0 >= self.config.error_threshold_percent
            || stats.slow_rate * 100.0 >= self.config.slow_call_threshold_percent;
        if trip {
            tracing::warn!(
                circuit = %self.name,
                failures = stats.failures,
                error_rate = stats.error_rate,
                slow_rate = stats.slow_rate,
                "Circuit health evaluation tripped"
            );
            self.open_circuit(inner, stats.error_rate, events);
        }
    }

    fn open_circuit(&self, inner: &mut Inner, error_rate: f64, events: &mut Vec<Signal>) {
        let strategy = inner.recovery_override.unwrap_or(self.config.recovery);
        inner.cooldown = strategy.cooldown(self.config.timeout_ms, inner.retry_count, error_rate);
        inner.opened_at = Instant::now();
        self.transition(inner, CircuitState::Open, events);
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState, events: &mut Vec<Signal>) {
        let from = inner.state;
        if from == to {
            return;
        }
        inner.state = to;
        inner.state_change_count += 1;
        inner.last_state_change = Instant::now();
        match to {
            CircuitState::HalfOpen => {
                inner.probes_issued = 0;
                inner.probe_results.clear();
            }
            CircuitState::Closed => {
                inner.retry_count = 0;
                inner.probe_results.clear();
            }
            CircuitState::Open => {}
        }

        if let Some(tally) = &self.tally {
            if from == CircuitState::Open {
                tally.note_left_open();
            }
            if to == CircuitState::Open {
                let (open, total) = tally.note_open();
                if open * 2 > total {
                    tracing::error!(open, total, "Majority of circuits are open");
                    events.push(Signal::CascadingFailure { open, total });
                }
            }
        }

        tracing::info!(circuit = %self.name, %from, %to, "Circuit state changed");
        metrics::record_circuit_state(&self.name, to as u8);
        events.push(Signal::StateChanged {
            circuit: self.name.clone(),
            from,
            to,
        });
        match to {
            CircuitState::Open => events.push(Signal::CircuitOpened {
                circuit: self.name.clone(),
            }),
            CircuitState::Closed => events.push(Signal::CircuitClosed {
                circuit: self.name.clone(),
            }),
            CircuitState::HalfOpen => {}
        }
    }

    fn window_stats(&self, inner: &mut Inner) -> WindowStats {
        let window = Duration::from_millis(self.config.monitoring_window_ms);
        let now = Instant::now();
        while let Some(front) = inner.samples.front() {
            if now.duration_since(front.at) > window {
                inner.samples.pop_front();
            } else {
                break;
            }
        }

        let slow_at = Duration::from_millis(self.config.slow_call_duration_ms);
        let total = inner.samples.len();
        let mut successes = 0;
        let mut slow = 0;
        let mut elapsed_sum = Duration::ZERO;
        for sample in &inner.samples {
            if sample.success {
                successes += 1;
            }
            if sample.duration >= slow_at {
                slow += 1;
            }
            elapsed_sum += sample.duration;
        }
        let failures = total - successes;
        WindowStats {
            total,
            successes,
            failures,
            slow,
            average_duration: if total > 0 {
                elapsed_sum / total as u32
            } else {
                Duration::ZERO
            },
            error_rate: if total > 0 {
                failures as f64 / total as f64
            } else {
                0.0
            },
            slow_rate: if total > 0 {
                slow as f64 / total as f64
            } else {
                0.0
            },
        }
    }

    fn note_fallback(&self) {
        metrics::record_fallback(&self.name);
        self.bus.send(Signal::FallbackUsed {
            circuit: self.name.clone(),
        });
    }

    fn emit(&self, events: Vec<Signal>) {
        for event in events {
            self.bus.send(event);
        }
    }
}
