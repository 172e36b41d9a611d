//! The graceful degradation manager.
//!
//! # Responsibilities
//! - Pull system metrics on a timer and decide the degradation level
//! - Apply a level: feature flags, coordinator strategy, breaker recovery
//! - Admit or reject operations by priority
//! - Keep an append-only transition history for diagnostics

use std::sync::{Arc, Mutex};
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::broadcast;
use tokio::time::{self, Instant};

use crate::config::schema::DegradationConfig;
use crate::coordinator::engine::MultiSourceCoordinator;
use crate::coordinator::strategy::AggregationStrategy;
use crate::degradation::level::{DegradationLevel, Feature, FeatureFlags, OperationPriority};
use crate::degradation::triggers::{
    default_triggers, evaluate_triggers, fallback_strategy, DegradationTrigger, SystemMetrics,
};
use crate::observability::metrics;
use crate::resilience::backoff::RecoveryStrategy;
use crate::resilience::registry::CircuitBreakerRegistry;
use crate::signals::{Signal, SignalBus};
use crate::sources::registry::SourceRegistry;

/// Maps an external resource-zone signal onto a 0-100 pressure scale.
pub trait ResourceProbe: Send + Sync {
    fn usage(&self) -> Option<f64>;

    /// Memory pressure, 0-100, if the probe can see it.
    fn memory(&self) -> Option<f64> {
        None
    }

    /// CPU pressure, 0-100, if the probe can see it.
    fn cpu(&self) -> Option<f64> {
        None
    }
}

/// Probe for deployments without a resource monitor; reports nothing,
/// which matches no trigger.
pub struct NoopResourceProbe;

impl ResourceProbe for NoopResourceProbe {
    fn usage(&self) -> Option<f64> {
        None
    }
}

/// One level change, kept for diagnostics.
#[derive(Debug, Clone)]
pub struct Transition {
    pub at: Instant,
    pub from: DegradationLevel,
    pub to: DegradationLevel,
    pub reason: String,
}

struct ManagerState {
    level: DegradationLevel,
    last_change: Option<Instant>,
    history: Vec<Transition>,
}

pub struct GracefulDegradationManager {
    state: Mutex<ManagerState>,
    flags: ArcSwap<FeatureFlags>,
    latest_metrics: Mutex<SystemMetrics>,
    triggers: Vec<DegradationTrigger>,
    cooldown: Duration,
    evaluate_interval: Duration,
    coordinator: Arc<MultiSourceCoordinator>,
    breakers: Arc<CircuitBreakerRegistry>,
    sources: Arc<SourceRegistry>,
    probe: Arc<dyn ResourceProbe>,
    bus: SignalBus,
}

impl GracefulDegradationManager {
    pub fn new(
        config: &DegradationConfig,
        coordinator: Arc<MultiSourceCoordinator>,
        breakers: Arc<CircuitBreakerRegistry>,
        sources: Arc<SourceRegistry>,
        probe: Arc<dyn ResourceProbe>,
        bus: SignalBus,
    ) -> Self {
        Self {
            state: Mutex::new(ManagerState {
                level: DegradationLevel::Normal,
                last_change: None,
                history: Vec::new(),
            }),
            flags: ArcSwap::new(Arc::new(FeatureFlags::normal())),
            latest_metrics: Mutex::new(SystemMetrics::default()),
            triggers: default_triggers(),
            cooldown: Duration::from_secs(config.cooldown_secs),
            evaluate_interval: Duration::from_secs(config.evaluate_interval_secs.max(1)),
            coordinator,
            breakers,
            sources,
            probe,
            bus,
        }
    }

    pub fn current_level(&self) -> DegradationLevel {
        self.lock().level
    }

    pub fn feature_flags(&self) -> FeatureFlags {
        **self.flags.load()
    }

    pub fn is_feature_enabled(&self, feature: Feature) -> bool {
        self.flags.load().get(feature)
    }

    /// Should an operation of this priority run right now?
    ///
    /// CRITICAL always passes; LEVEL1 sheds LOW, LEVEL2 sheds everything
    /// below HIGH, LEVEL3 sheds everything below CRITICAL.
    pub fn filter_operation(&self, priority: OperationPriority) -> bool {
        if priority == OperationPriority::Critical {
            return true;
        }
        match self.current_level() {
            DegradationLevel::Normal => true,
            DegradationLevel::Level1 => priority > OperationPriority::Low,
            DegradationLevel::Level2 => priority >= OperationPriority::High,
            DegradationLevel::Level3 => false,
        }
    }

    /// Named simplified strategy for an operation kind at the current
    /// level, if one applies.
    pub fn get_fallback_strategy(&self, op_kind: &str) -> Option<&'static str> {
        fallback_strategy(op_kind, self.current_level())
    }

    pub fn latest_metrics(&self) -> SystemMetrics {
        self.latest_metrics
            .lock()
            .expect("metrics snapshot poisoned")
            .clone()
    }

    pub fn history(&self) -> Vec<Transition> {
        self.lock().history.clone()
    }

    /// Operator override: jump straight to a level, bypassing cooldown.
    pub fn force_degrade(&self, level: DegradationLevel) {
        let mut state = self.lock();
        if state.level == level {
            return;
        }
        self.apply(&mut state, level, "forced override");
    }

    /// Operator override: restore NORMAL immediately.
    pub fn force_recover(&self) {
        let mut state = self.lock();
        if state.level == DegradationLevel::Normal {
            return;
        }
        self.apply(&mut state, DegradationLevel::Normal, "forced recovery");
    }

    /// One evaluation pass: escalate on the first matching trigger, else
    /// consider stepping down.
    pub fn evaluate(&self) {
        let snapshot = self.collect_metrics();
        *self
            .latest_metrics
            .lock()
            .expect("metrics snapshot poisoned") = snapshot.clone();

        let current = self.current_level();
        if let Some(hit) = evaluate_triggers(&self.triggers, &snapshot, current) {
            self.try_degrade(hit.target, hit.name, false);
            return;
        }
        self.try_recover(&snapshot);
    }

    /// Immediate escalation on a majority-open breaker population. The
    /// cooldown exists to damp oscillation, not to delay responding to a
    /// cascading failure.
    pub fn handle_cascading_failure(&self, open: usize, total: usize) {
        tracing::error!(open, total, "Cascading failure reported");
        self.try_degrade(DegradationLevel::Level2, "cascading-failure", true);
    }

    pub fn collect_metrics(&self) -> SystemMetrics {
        let tracker = self.coordinator.tracker().snapshot();
        let (open_circuits, total_circuits) = self.breakers.open_fraction();
        SystemMetrics {
            resource_usage: self.probe.usage(),
            error_rate_pct: tracker.error_rate_pct,
            avg_latency_ms: tracker.avg_latency_ms,
            open_circuits,
            total_circuits,
            unhealthy_sources: self.sources.unhealthy_count(),
            memory_pct: self.probe.memory(),
            cpu_pct: self.probe.cpu(),
        }
    }

    /// Evaluation loop; also consumes cascading-failure signals between
    /// ticks.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_secs = self.evaluate_interval.as_secs(),
            cooldown_secs = self.cooldown.as_secs(),
            "Degradation evaluator starting"
        );
        let mut ticker = time::interval(self.evaluate_interval);
        let mut signals = self.bus.subscribe();
        loop {
            tokio::select! {
                _ = ticker.tick() => self.evaluate(),
                signal = signals.recv() => {
                    if let Ok(Signal::CascadingFailure { open, total }) = signal {
                        self.handle_cascading_failure(open, total);
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Degradation evaluator received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    fn try_degrade(&self, target: DegradationLevel, reason: &str, bypass_cooldown: bool) {
        let mut state = self.lock();
        if target <= state.level {
            return;
        }
        if !bypass_cooldown && !self.cooldown_elapsed(&state) {
            tracing::debug!(
                %target,
                reason,
                "Degradation trigger held back by cooldown"
            );
            return;
        }
        self.apply(&mut state, target, reason);
    }

    fn try_recover(&self, snapshot: &SystemMetrics) {
        let mut state = self.lock();
        if state.level == DegradationLevel::Normal || !self.cooldown_elapsed(&state) {
            return;
        }
        let threshold = match state.level {
            DegradationLevel::Level1 => 60.0,
            DegradationLevel::Level2 => 70.0,
            DegradationLevel::Level3 => 80.0,
            DegradationLevel::Normal => return,
        };
        // All three of these must look calm at once. A missing metric is
        // calm: zero traffic is no reason to stay degraded.
        let stable = [
            snapshot.resource_usage,
            snapshot.error_rate_pct,
            snapshot.open_circuit_ratio_pct(),
        ]
        .iter()
        .all(|metric| metric.unwrap_or(0.0) < threshold);
        if stable {
            let target = state.level.step_down();
            self.apply(&mut state, target, "metrics stable");
        }
    }

    fn cooldown_elapsed(&self, state: &ManagerState) -> bool {
        state
            .last_change
            .map_or(true, |at| at.elapsed() >= self.cooldown)
    }

    fn apply(&self, state: &mut ManagerState, target: DegradationLevel, reason: &str) {
        let from = state.level;
        state.level = target;
        state.last_change = Some(Instant::now());
        state.history.push(Transition {
            at: Instant::now(),
            from,
            to: target,
            reason: reason.to_string(),
        });

        self.apply_level(target);
        metrics::record_degradation_level(target.as_u8());

        if target > from {
            tracing::warn!(%from, to = %target, reason, "Degradation level raised");
            self.bus.send(Signal::DegradationApplied {
                level: target,
                reason: reason.to_string(),
            });
        } else {
            tracing::info!(%from, to = %target, reason, "Degradation level lowered");
            self.bus.send(Signal::RecoveryApplied { level: target });
        }
    }

    /// Cumulative application from the NORMAL baseline.
    fn apply_level(&self, level: DegradationLevel) {
        self.flags.store(Arc::new(FeatureFlags::for_level(level)));
        match level {
            DegradationLevel::Normal | DegradationLevel::Level1 => {
                self.coordinator.set_strategy(AggregationStrategy::Weighted);
                self.breakers.set_recovery_override(None);
            }
            DegradationLevel::Level2 => {
                self.coordinator.set_strategy(AggregationStrategy::Fallback);
                self.breakers
                    .set_recovery_override(Some(RecoveryStrategy::Fixed));
            }
            DegradationLevel::Level3 => {
                // Single best source, minimum cost.
                self.coordinator
                    .set_strategy(AggregationStrategy::FirstSuccess);
                self.breakers
                    .set_recovery_override(Some(RecoveryStrategy::Fixed));
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManagerState> {
        self.state.lock().expect("degradation state poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{CircuitBreakerConfig, CoordinatorConfig};
    use crate::degradation::level::OperationPriority::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct FixedProbe(Option<f64>);

    impl ResourceProbe for FixedProbe {
        fn usage(&self) -> Option<f64> {
            self.0
        }
    }

    struct AdjustableProbe(AtomicU64);

    impl ResourceProbe for AdjustableProbe {
        fn usage(&self) -> Option<f64> {
            Some(self.0.load(Ordering::SeqCst) as f64)
        }
    }

    fn manager_with_probe(probe: Arc<dyn ResourceProbe>) -> Arc<GracefulDegradationManager> {
        let bus = SignalBus::default();
        let breakers = Arc::new(CircuitBreakerRegistry::new(
            CircuitBreakerConfig::default(),
            bus.clone(),
        ));
        let sources = Arc::new(SourceRegistry::new(Vec::new()));
        let coordinator = Arc::new(MultiSourceCoordinator::new(
            sources.clone(),
            breakers.clone(),
            &CoordinatorConfig::default(),
        ));
        Arc::new(GracefulDegradationManager::new(
            &DegradationConfig::default(),
            coordinator,
            breakers,
            sources,
            probe,
            bus,
        ))
    }

    fn manager() -> Arc<GracefulDegradationManager> {
        manager_with_probe(Arc::new(NoopResourceProbe))
    }

    #[tokio::test]
    async fn starts_at_normal_with_all_features() {
        let m = manager();
        assert_eq!(m.current_level(), DegradationLevel::Normal);
        assert!(m.is_feature_enabled(Feature::AdvancedAggregation));
        assert!(m.filter_operation(Low));
    }

    #[tokio::test]
    async fn no_metrics_means_no_change() {
        let m = manager();
        m.evaluate();
        assert_eq!(m.current_level(), DegradationLevel::Normal);
        assert!(m.history().is_empty());
    }

    #[tokio::test]
    async fn resource_pressure_escalates_one_level_per_tick() {
        let m = manager_with_probe(Arc::new(FixedProbe(Some(96.0))));
        m.evaluate();
        // The critical trigger targets Level3, applied in one shot.
        assert_eq!(m.current_level(), DegradationLevel::Level3);
        assert_eq!(m.history().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_damps_repeated_escalation() {
        let probe = Arc::new(AdjustableProbe(AtomicU64::new(72)));
        let m = manager_with_probe(probe.clone());
        m.evaluate();
        assert_eq!(m.current_level(), DegradationLevel::Level1);

        // Pressure keeps climbing, but the cooldown has not elapsed: a
        // second trigger-worthy tick produces no change.
        probe.0.store(87, Ordering::SeqCst);
        m.evaluate();
        assert_eq!(m.current_level(), DegradationLevel::Level1);
        assert_eq!(m.history().len(), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        m.evaluate();
        assert_eq!(m.current_level(), DegradationLevel::Level2);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_one_level_at_a_time() {
        let m = manager();
        m.force_degrade(DegradationLevel::Level3);
        assert_eq!(m.current_level(), DegradationLevel::Level3);
        assert!(!m.is_feature_enabled(Feature::BackgroundTasks));

        tokio::time::advance(Duration::from_secs(61)).await;
        m.evaluate();
        assert_eq!(m.current_level(), DegradationLevel::Level2);

        // Second step needs its own cooldown window.
        m.evaluate();
        assert_eq!(m.current_level(), DegradationLevel::Level2);
        tokio::time::advance(Duration::from_secs(61)).await;
        m.evaluate();
        assert_eq!(m.current_level(), DegradationLevel::Level1);
        // Higher-tier restrictions lifted, Level1's remain.
        assert!(m.is_feature_enabled(Feature::AdvancedAggregation));
        assert!(!m.is_feature_enabled(Feature::DetailedAnalytics));
    }

    #[tokio::test(start_paused = true)]
    async fn hot_metrics_block_recovery() {
        let m = manager_with_probe(Arc::new(FixedProbe(Some(85.0))));
        m.force_degrade(DegradationLevel::Level1);
        tokio::time::advance(Duration::from_secs(61)).await;
        // 85 >= the Level1 recovery threshold of 60, so no step down;
        // the resource-high trigger escalates instead.
        m.evaluate();
        assert_eq!(m.current_level(), DegradationLevel::Level2);
    }

    #[tokio::test]
    async fn filter_operation_matrix() {
        let m = manager();
        m.force_degrade(DegradationLevel::Level1);
        assert!(!m.filter_operation(Low));
        assert!(m.filter_operation(Medium));
        assert!(m.filter_operation(High));

        m.force_degrade(DegradationLevel::Level2);
        assert!(!m.filter_operation(Medium));
        assert!(m.filter_operation(High));

        m.force_degrade(DegradationLevel::Level3);
        assert!(!m.filter_operation(High));
        assert!(m.filter_operation(Critical));
    }

    #[tokio::test]
    async fn level_application_reconfigures_coordinator() {
        let m = manager();
        m.force_degrade(DegradationLevel::Level2);
        assert_eq!(m.coordinator.strategy(), AggregationStrategy::Fallback);

        m.force_degrade(DegradationLevel::Level3);
        assert_eq!(m.coordinator.strategy(), AggregationStrategy::FirstSuccess);

        m.force_recover();
        assert_eq!(m.coordinator.strategy(), AggregationStrategy::Weighted);
        assert!(m.is_feature_enabled(Feature::VerboseLogging));
    }

    #[tokio::test]
    async fn cascading_failure_bypasses_cooldown() {
        let m = manager();
        m.force_degrade(DegradationLevel::Level1);
        // Cooldown from the forced change has not elapsed.
        m.handle_cascading_failure(3, 4);
        assert_eq!(m.current_level(), DegradationLevel::Level2);
        let history = m.history();
        assert_eq!(history.last().unwrap().reason, "cascading-failure");
    }

    #[tokio::test]
    async fn fallback_strategy_follows_level() {
        let m = manager();
        assert_eq!(m.get_fallback_strategy("deep_analysis"), None);
        m.force_degrade(DegradationLevel::Level2);
        assert_eq!(m.get_fallback_strategy("deep_analysis"), Some("quick_analysis"));
        m.force_degrade(DegradationLevel::Level3);
        assert_eq!(m.get_fallback_strategy("deep_analysis"), Some("skip"));
    }
}
