//! Per-source request quota tracking.
//!
//! Fixed windows (second/minute/day) rather than a token bucket: sources
//! advertise remaining quota and a reset time, which fixed windows expose
//! directly.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::schema::RateLimitConfig;

#[derive(Debug)]
struct Window {
    limit: Option<u32>,
    used: u32,
    started: Instant,
    span: Duration,
}

impl Window {
    fn new(limit: Option<u32>, span: Duration) -> Self {
        Self {
            limit,
            used: 0,
            started: Instant::now(),
            span,
        }
    }

    fn roll(&mut self, now: Instant) {
        if now.duration_since(self.started) >= self.span {
            self.used = 0;
            self.started = now;
        }
    }

    fn exhausted(&self) -> bool {
        matches!(self.limit, Some(limit) if self.used >= limit)
    }

    fn remaining(&self) -> Option<u32> {
        self.limit.map(|limit| limit.saturating_sub(self.used))
    }

    fn resets_in(&self, now: Instant) -> Duration {
        (self.started + self.span).saturating_duration_since(now)
    }
}

/// Tracks request usage against per-second/minute/day limits.
#[derive(Debug)]
pub struct QuotaTracker {
    windows: Mutex<[Window; 3]>,
}

impl QuotaTracker {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            windows: Mutex::new([
                Window::new(config.per_second, Duration::from_secs(1)),
                Window::new(config.per_minute, Duration::from_secs(60)),
                Window::new(config.per_day, Duration::from_secs(86_400)),
            ]),
        }
    }

    /// True while every limited window has quota left.
    pub fn has_quota(&self) -> bool {
        let now = Instant::now();
        let mut windows = self.lock();
        windows.iter_mut().for_each(|w| w.roll(now));
        !windows.iter().any(|w| w.exhausted())
    }

    /// Count one attempt against every window.
    pub fn record(&self) {
        let now = Instant::now();
        let mut windows = self.lock();
        for window in windows.iter_mut() {
            window.roll(now);
            window.used = window.used.saturating_add(1);
        }
    }

    /// Tightest remaining quota across limited windows, if any limit is set.
    pub fn remaining(&self) -> Option<u32> {
        let now = Instant::now();
        let mut windows = self.lock();
        windows.iter_mut().for_each(|w| w.roll(now));
        windows.iter().filter_map(|w| w.remaining()).min()
    }

    /// How long until quota becomes available again; zero when it already is.
    pub fn resets_in(&self) -> Duration {
        let now = Instant::now();
        let mut windows = self.lock();
        windows.iter_mut().for_each(|w| w.roll(now));
        windows
            .iter()
            .filter(|w| w.exhausted())
            .map(|w| w.resets_in(now))
            .max()
            .unwrap_or(Duration::ZERO)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, [Window; 3]> {
        self.windows.lock().expect("quota windows poisoned")
    }
}
