//! Request outcome tracking for system metrics.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Default)]
pub struct TrackerSnapshot {
    pub window_total: usize,
    pub window_failed: usize,
    /// Percent in [0, 100]; `None` with no traffic in the window.
    pub error_rate_pct: Option<f64>,
    pub avg_latency_ms: Option<f64>,
    pub lifetime_total: u64,
    pub lifetime_failed: u64,
}

/// Rolling window of logical-request outcomes.
pub struct RequestTracker {
    window: Duration,
    samples: Mutex<VecDeque<(Instant, bool, u64)>>,
    total: AtomicU64,
    failed: AtomicU64,
}

impl RequestTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            samples: Mutex::new(VecDeque::new()),
            total: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    pub fn record(&self, success: bool, latency_ms: u64) {
        self.total.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        let mut samples = self.lock();
        samples.push_back((Instant::now(), success, latency_ms));
        Self::prune(&mut samples, self.window);
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        let mut samples = self.lock();
        Self::prune(&mut samples, self.window);
        let window_total = samples.len();
        let window_failed = samples.iter().filter(|(_, success, _)| !success).count();
        let (error_rate_pct, avg_latency_ms) = if window_total > 0 {
            let latency_sum: u64 = samples.iter().map(|(_, _, ms)| ms).sum();
            (
                Some(window_failed as f64 / window_total as f64 * 100.0),
                Some(latency_sum as f64 / window_total as f64),
            )
        } else {
            (None, None)
        };
        TrackerSnapshot {
            window_total,
            window_failed,
            error_rate_pct,
            avg_latency_ms,
            lifetime_total: self.total.load(Ordering::Relaxed),
            lifetime_failed: self.failed.load(Ordering::Relaxed),
        }
    }

    fn prune(samples: &mut VecDeque<(Instant, bool, u64)>, window: Duration) {
        let now = Instant::now();
        while let Some((at, _, _)) = samples.front() {
            if now.duration_since(*at) > window {
                samples.pop_front();
            } else {
                break;
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<(Instant, bool, u64)>> {
        self.samples.lock().expect("request tracker poisoned")
    }
}
