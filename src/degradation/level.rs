//! Degradation levels, feature flags, and operation priorities.

use serde::{Deserialize, Serialize};

/// System-wide capability-reduction tier, totally ordered.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum DegradationLevel {
    #[default]
    Normal,
    Level1,
    Level2,
    Level3,
}

impl DegradationLevel {
    pub fn as_u8(self) -> u8 {
        match self {
            DegradationLevel::Normal => 0,
            DegradationLevel::Level1 => 1,
            DegradationLevel::Level2 => 2,
            DegradationLevel::Level3 => 3,
        }
    }

    /// One step towards NORMAL.
    pub fn step_down(self) -> Self {
        match self {
            DegradationLevel::Normal | DegradationLevel::Level1 => DegradationLevel::Normal,
            DegradationLevel::Level2 => DegradationLevel::Level1,
            DegradationLevel::Level3 => DegradationLevel::Level2,
        }
    }
}

impl std::fmt::Display for DegradationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DegradationLevel::Normal => write!(f, "normal"),
            DegradationLevel::Level1 => write!(f, "level1"),
            DegradationLevel::Level2 => write!(f, "level2"),
            DegradationLevel::Level3 => write!(f, "level3"),
        }
    }
}

/// Operation admission priority.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum OperationPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// Named feature toggle, for external queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    VerboseLogging,
    DetailedAnalytics,
    ExtendedCaching,
    ParallelRequests,
    AdvancedAggregation,
    DeepAnalysis,
    MultiSourceAggregation,
    NonCriticalOperations,
    BackgroundTasks,
    Enrichment,
    ResponseValidation,
}

/// Fixed set of feature toggles, gated by degradation level.
///
/// Built cumulatively from the NORMAL baseline: whatever LEVEL1 disables
/// stays disabled at LEVEL2 and LEVEL3, and so on. A flag comes back only
/// when recovery drops below the level that disabled it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeatureFlags {
    pub verbose_logging: bool,
    pub detailed_analytics: bool,
    pub extended_caching: bool,
    pub parallel_requests: bool,
    pub advanced_aggregation: bool,
    pub deep_analysis: bool,
    pub multi_source_aggregation: bool,
    pub non_critical_operations: bool,
    pub background_tasks: bool,
    pub enrichment: bool,
    pub response_validation: bool,
}

impl FeatureFlags {
    pub fn normal() -> Self {
        Self {
            verbose_logging: true,
            detailed_analytics: true,
            extended_caching: true,
            parallel_requests: true,
            advanced_aggregation: true,
            deep_analysis: true,
            multi_source_aggregation: true,
            non_critical_operations: true,
            background_tasks: true,
            enrichment: true,
            response_validation: true,
        }
    }

    pub fn for_level(level: DegradationLevel) -> Self {
        let mut flags = Self::normal();
        if level >= DegradationLevel::Level1 {
            flags.verbose_logging = false;
            flags.detailed_analytics = false;
            flags.extended_caching = false;
        }
        if level >= DegradationLevel::Level2 {
            flags.parallel_requests = false;
            flags.advanced_aggregation = false;
            flags.deep_analysis = false;
            flags.multi_source_aggregation = false;
        }
        if level >= DegradationLevel::Level3 {
            flags.non_critical_operations = false;
            flags.background_tasks = false;
            flags.enrichment = false;
            flags.response_validation = false;
        }
        flags
    }

    pub fn get(&self, feature: Feature) -> bool {
        match feature {
            Feature::VerboseLogging => self.verbose_logging,
            Feature::DetailedAnalytics => self.detailed_analytics,
            Feature::ExtendedCaching => self.extended_caching,
            Feature::ParallelRequests => self.parallel_requests,
            Feature::AdvancedAggregation => self.advanced_aggregation,
            Feature::DeepAnalysis => self.deep_analysis,
            Feature::MultiSourceAggregation => self.multi_source_aggregation,
            Feature::NonCriticalOperations => self.non_critical_operations,
            Feature::BackgroundTasks => self.background_tasks,
            Feature::Enrichment => self.enrichment,
            Feature::ResponseValidation => self.response_validation,
        }
    }
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self::normal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_totally_ordered() {
        assert!(DegradationLevel::Normal < DegradationLevel::Level1);
        assert!(DegradationLevel::Level1 < DegradationLevel::Level2);
        assert!(DegradationLevel::Level2 < DegradationLevel::Level3);
    }

    #[test]
    fn step_down_never_skips() {
        assert_eq!(
            DegradationLevel::Level3.step_down(),
            DegradationLevel::Level2
        );
        assert_eq!(
            DegradationLevel::Level2.step_down(),
            DegradationLevel::Level1
        );
        assert_eq!(DegradationLevel::Level1.step_down(), DegradationLevel::Normal);
        assert_eq!(DegradationLevel::Normal.step_down(), DegradationLevel::Normal);
    }

    #[test]
    fn restrictions_are_monotonic_in_level() {
        let l2 = FeatureFlags::for_level(DegradationLevel::Level2);
        let l3 = FeatureFlags::for_level(DegradationLevel::Level3);
        assert!(!l2.advanced_aggregation);
        assert!(!l3.advanced_aggregation);
        // L2 keeps L1 restrictions too.
        assert!(!l2.verbose_logging);
        // L2 has not yet touched L3's set.
        assert!(l2.background_tasks);
        assert!(!l3.background_tasks);
    }

    #[test]
    fn recovery_re_enables_higher_tiers() {
        let l1 = FeatureFlags::for_level(DegradationLevel::Level1);
        assert!(l1.advanced_aggregation);
        assert!(!l1.detailed_analytics);
        let normal = FeatureFlags::for_level(DegradationLevel::Normal);
        assert_eq!(normal, FeatureFlags::normal());
    }

    #[test]
    fn priorities_order_correctly() {
        assert!(OperationPriority::Low < OperationPriority::Medium);
        assert!(OperationPriority::High < OperationPriority::Critical);
    }
}
