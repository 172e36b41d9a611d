//! A single upstream data source and its live health.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use crate::config::schema::SourceConfig;
use crate::observability::metrics;
use crate::sources::client::SourceClient;
use crate::sources::quota::QuotaTracker;

/// Derived source status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Offline,
}

impl std::fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceStatus::Healthy => write!(f, "healthy"),
            SourceStatus::Degraded => write!(f, "degraded"),
            SourceStatus::Unhealthy => write!(f, "unhealthy"),
            SourceStatus::Offline => write!(f, "offline"),
        }
    }
}

/// Snapshot of a source's health.
#[derive(Debug, Clone)]
pub struct SourceHealth {
    pub status: SourceStatus,
    pub uptime_percent: f64,
    pub avg_latency_ms: f64,
    pub error_rate: f64,
    pub remaining_quota: Option<u32>,
    pub quota_resets_in: Duration,
    pub last_checked: Option<Instant>,
}

struct HealthInner {
    status: SourceStatus,
    avg_latency_ms: f64,
    error_rate: f64,
    checks: u64,
    failures: u64,
    offline: bool,
    last_checked: Option<Instant>,
}

/// A ranked, capability-tagged upstream provider.
pub struct Source {
    config: SourceConfig,
    client: Arc<dyn SourceClient>,
    health: Mutex<HealthInner>,
    quota: QuotaTracker,
}

impl Source {
    pub fn new(config: SourceConfig, client: Arc<dyn SourceClient>) -> Self {
        let quota = QuotaTracker::new(&config.rate_limit);
        Self {
            config,
            client,
            health: Mutex::new(HealthInner {
                status: SourceStatus::Healthy,
                avg_latency_ms: 0.0,
                error_rate: 0.0,
                checks: 0,
                failures: 0,
                offline: false,
                last_checked: None,
            }),
            quota,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    pub fn client(&self) -> Arc<dyn SourceClient> {
        self.client.clone()
    }

    pub fn quota(&self) -> &QuotaTracker {
        &self.quota
    }

    /// Record a live call or probe outcome.
    ///
    /// Exponential smoothing rather than plain averages: one blip moves
    /// the needle a little, a streak moves it a lot.
    pub fn record_outcome(&self, success: bool, latency: Duration) {
        let mut health = self.lock();
        health.checks += 1;
        if success {
            health.error_rate *= 0.95;
        } else {
            health.failures += 1;
            health.error_rate = (health.error_rate * 1.05 + 0.05).min(1.0);
        }
        let latency_ms = latency.as_secs_f64() * 1_000.0;
        health.avg_latency_ms = if health.checks == 1 {
            latency_ms
        } else {
            health.avg_latency_ms * 0.9 + latency_ms * 0.1
        };
        health.last_checked = Some(Instant::now());
        self.derive_status(&mut health);
    }

    /// Prober verdict: the endpoint did not answer at all.
    pub fn mark_offline(&self) {
        let mut health = self.lock();
        health.offline = true;
        self.derive_status(&mut health);
        tracing::warn!(source = %self.config.name, "Source marked offline");
    }

    /// Prober verdict: the endpoint answered a probe.
    pub fn mark_reachable(&self) {
        let mut health = self.lock();
        if health.offline {
            tracing::info!(source = %self.config.name, "Source reachable again");
        }
        health.offline = false;
        self.derive_status(&mut health);
    }

    /// Offline sources are excluded from routing entirely.
    pub fn is_available(&self) -> bool {
        !self.lock().offline
    }

    pub fn health(&self) -> SourceHealth {
        let health = self.lock();
        let uptime_percent = if health.checks > 0 {
            (health.checks - health.failures) as f64 / health.checks as f64 * 100.0
        } else {
            100.0
        };
        SourceHealth {
            status: health.status,
            uptime_percent,
            avg_latency_ms: health.avg_latency_ms,
            error_rate: health.error_rate,
            remaining_quota: self.quota.remaining(),
            quota_resets_in: self.quota.resets_in(),
            last_checked: health.last_checked,
        }
    }

    pub fn status(&self) -> SourceStatus {
        self.lock().status
    }

    fn derive_status(&self, health: &mut HealthInner) {
        let slow_at = self.config.timeout_ms as f64 * 0.5;
        health.status = if health.offline {
            SourceStatus::Offline
        } else if health.error_rate > 0.5 {
            SourceStatus::Unhealthy
        } else if health.avg_latency_ms >= slow_at {
            SourceStatus::Degraded
        } else {
            SourceStatus::Healthy
        };
        metrics::record_source_health(
            &self.config.name,
            matches!(health.status, SourceStatus::Healthy | SourceStatus::Degraded),
        );
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HealthInner> {
        self.health.lock().expect("source health poisoned")
    }
}
