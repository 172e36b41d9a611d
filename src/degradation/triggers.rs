//! System metrics and the static degradation trigger table.

use crate::degradation::level::DegradationLevel;

/// Snapshot of the system metrics the degradation manager evaluates.
///
/// A `None` or non-finite metric never matches a trigger; the monitor
/// loop must be unkillable.
#[derive(Debug, Clone, Default)]
pub struct SystemMetrics {
    /// External resource pressure mapped onto 0-100.
    pub resource_usage: Option<f64>,

    /// Failed / total logical requests over the tracked window, 0-100.
    pub error_rate_pct: Option<f64>,

    pub avg_latency_ms: Option<f64>,

    pub open_circuits: usize,
    pub total_circuits: usize,

    pub unhealthy_sources: usize,

    /// Diagnostics only; escalation keys off `resource_usage`.
    pub memory_pct: Option<f64>,
    pub cpu_pct: Option<f64>,
}

impl SystemMetrics {
    /// Open circuits as a percentage; `None` with no circuits registered.
    pub fn open_circuit_ratio_pct(&self) -> Option<f64> {
        if self.total_circuits == 0 {
            None
        } else {
            Some(self.open_circuits as f64 / self.total_circuits as f64 * 100.0)
        }
    }

    fn value(&self, kind: MetricKind) -> Option<f64> {
        let raw = match kind {
            MetricKind::ResourceUsage => self.resource_usage,
            MetricKind::OpenCircuitRatio => self.open_circuit_ratio_pct(),
            MetricKind::ErrorRate => self.error_rate_pct,
            MetricKind::AvgLatency => self.avg_latency_ms,
        };
        raw.filter(|v| v.is_finite())
    }
}

/// The metric family a trigger watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    ResourceUsage,
    OpenCircuitRatio,
    ErrorRate,
    AvgLatency,
}

/// One (metric, threshold, target level) escalation rule.
#[derive(Debug, Clone, Copy)]
pub struct DegradationTrigger {
    pub name: &'static str,
    pub metric: MetricKind,
    pub threshold: f64,
    pub target: DegradationLevel,
    pub priority: u8,
}

/// The static trigger table: four metric families at three thresholds
/// each, most severe first.
pub fn default_triggers() -> Vec<DegradationTrigger> {
    use DegradationLevel::*;
    use MetricKind::*;

    let mut triggers = vec![
        trigger("resource-critical", ResourceUsage, 95.0, Level3, 120),
        trigger("circuit-critical", OpenCircuitRatio, 75.0, Level3, 115),
        trigger("error-critical", ErrorRate, 50.0, Level3, 110),
        trigger("latency-critical", AvgLatency, 5_000.0, Level3, 105),
        trigger("resource-high", ResourceUsage, 85.0, Level2, 90),
        trigger("circuit-high", OpenCircuitRatio, 50.0, Level2, 85),
        trigger("error-high", ErrorRate, 25.0, Level2, 80),
        trigger("latency-high", AvgLatency, 3_000.0, Level2, 75),
        trigger("resource-elevated", ResourceUsage, 70.0, Level1, 60),
        trigger("circuit-elevated", OpenCircuitRatio, 30.0, Level1, 55),
        trigger("error-elevated", ErrorRate, 10.0, Level1, 50),
        trigger("latency-elevated", AvgLatency, 1_500.0, Level1, 45),
    ];
    triggers.sort_by(|a, b| b.priority.cmp(&a.priority));
    triggers
}

fn trigger(
    name: &'static str,
    metric: MetricKind,
    threshold: f64,
    target: DegradationLevel,
    priority: u8,
) -> DegradationTrigger {
    DegradationTrigger {
        name,
        metric,
        threshold,
        target,
        priority,
    }
}

/// First trigger (descending priority) whose predicate holds and whose
/// target is strictly above the current level.
pub fn evaluate_triggers<'a>(
    triggers: &'a [DegradationTrigger],
    metrics: &SystemMetrics,
    current: DegradationLevel,
) -> Option<&'a DegradationTrigger> {
    triggers.iter().find(|t| {
        t.target > current
            && metrics
                .value(t.metric)
                .is_some_and(|value| value >= t.threshold)
    })
}

/// Simplified-strategy lookup for the scheduler layer: what to run
/// instead of `op_kind` at the given level.
pub fn fallback_strategy(op_kind: &str, level: DegradationLevel) -> Option<&'static str> {
    use DegradationLevel::*;
    match (op_kind, level) {
        ("deep_analysis", Level2) => Some("quick_analysis"),
        ("deep_analysis", Level3) => Some("skip"),
        ("enrichment", Level2) => Some("essential_only"),
        ("enrichment", Level3) => Some("skip"),
        ("batch_scan", Level1) => Some("reduced_batch"),
        ("batch_scan", Level2) => Some("single_pass"),
        ("batch_scan", Level3) => Some("skip"),
        ("validation", Level3) => Some("skip"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use DegradationLevel::*;

    #[test]
    fn missing_metrics_match_nothing() {
        let triggers = default_triggers();
        let metrics = SystemMetrics::default();
        assert!(evaluate_triggers(&triggers, &metrics, Normal).is_none());
    }

    #[test]
    fn nan_metrics_match_nothing() {
        let triggers = default_triggers();
        let metrics = SystemMetrics {
            resource_usage: Some(f64::NAN),
            ..Default::default()
        };
        assert!(evaluate_triggers(&triggers, &metrics, Normal).is_none());
    }

    #[test]
    fn most_severe_trigger_wins() {
        let triggers = default_triggers();
        let metrics = SystemMetrics {
            resource_usage: Some(96.0),
            error_rate_pct: Some(12.0),
            ..Default::default()
        };
        let hit = evaluate_triggers(&triggers, &metrics, Normal).unwrap();
        assert_eq!(hit.name, "resource-critical");
        assert_eq!(hit.target, Level3);
    }

    #[test]
    fn triggers_at_or_below_current_level_are_skipped() {
        let triggers = default_triggers();
        let metrics = SystemMetrics {
            error_rate_pct: Some(12.0),
            ..Default::default()
        };
        // error-elevated targets Level1, which is not above Level1.
        assert!(evaluate_triggers(&triggers, &metrics, Level1).is_none());
        let hit = evaluate_triggers(&triggers, &metrics, Normal).unwrap();
        assert_eq!(hit.name, "error-elevated");
    }

    #[test]
    fn circuit_ratio_uses_registered_population() {
        let metrics = SystemMetrics {
            open_circuits: 3,
            total_circuits: 4,
            ..Default::default()
        };
        assert_eq!(metrics.open_circuit_ratio_pct(), Some(75.0));
        let triggers = default_triggers();
        let hit = evaluate_triggers(&triggers, &metrics, Normal).unwrap();
        assert_eq!(hit.name, "circuit-critical");
    }

    #[test]
    fn fallback_table_degrades_by_level() {
        assert_eq!(fallback_strategy("deep_analysis", Normal), None);
        assert_eq!(
            fallback_strategy("deep_analysis", Level2),
            Some("quick_analysis")
        );
        assert_eq!(fallback_strategy("deep_analysis", Level3), Some("skip"));
        assert_eq!(fallback_strategy("unknown_op", Level3), None);
    }
}
