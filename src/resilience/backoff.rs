//! Cool-down computation for open circuits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the cool-down grows after failed half-open recoveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    /// `base * 2^min(retries, 10)`
    Exponential,
    /// `base * (retries + 1)`
    Linear,
    /// `base`
    Fixed,
    /// `base * ceil(error_rate * 10)`, at least `base`
    Adaptive,
}

impl RecoveryStrategy {
    /// Compute the cool-down before the next half-open probe round.
    ///
    /// `retry_count` is the number of failed recoveries since the circuit
    /// last closed; `error_rate` is the window error rate in [0, 1].
    /// A 0-10% jitter is added to desynchronize probe rounds across
    /// breakers that opened together.
    pub fn cooldown(&self, base_ms: u64, retry_count: u32, error_rate: f64) -> Duration {
        let delay_ms = match self {
            RecoveryStrategy::Exponential => {
                base_ms.saturating_mul(2u64.saturating_pow(retry_count.min(10)))
            }
            RecoveryStrategy::Linear => base_ms.saturating_mul(retry_count as u64 + 1),
            RecoveryStrategy::Fixed => base_ms,
            RecoveryStrategy::Adaptive => {
                let multiplier = (error_rate.clamp(0.0, 1.0) * 10.0).ceil() as u64;
                base_ms.saturating_mul(multiplier.max(1))
            }
        };
        Duration::from_millis(delay_ms.saturating_add(jitter(delay_ms)))
    }
}

/// 0 to 10% of the delay.
fn jitter(delay_ms: u64) -> u64 {
    let range = delay_ms / 10;
    if range > 0 {
        fastrand::u64(0..range)
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn millis(d: Duration) -> u64 {
        d.as_millis() as u64
    }

    #[test]
    fn exponential_doubles_per_retry() {
        let s = RecoveryStrategy::Exponential;
        assert!(millis(s.cooldown(1_000, 0, 0.0)) >= 1_000);
        assert!(millis(s.cooldown(1_000, 1, 0.0)) >= 2_000);
        // Two failed recoveries: third cool-down is at least 4x base.
        let third = millis(s.cooldown(1_000, 2, 0.0));
        assert!(third >= 4_000);
        assert!(third < 4_400);
    }

    #[test]
    fn exponential_caps_the_exponent() {
        let s = RecoveryStrategy::Exponential;
        let capped = millis(s.cooldown(1_000, 40, 0.0));
        assert!(capped < 1_024_000 + 102_400 + 1);
    }

    #[test]
    fn linear_grows_with_retries() {
        let s = RecoveryStrategy::Linear;
        assert!(millis(s.cooldown(500, 0, 0.0)) >= 500);
        let fourth = millis(s.cooldown(500, 3, 0.0));
        assert!(fourth >= 2_000 && fourth < 2_200);
    }

    #[test]
    fn fixed_ignores_retries() {
        let s = RecoveryStrategy::Fixed;
        assert!(millis(s.cooldown(700, 9, 0.9)) < 770 + 1);
    }

    #[test]
    fn adaptive_scales_with_error_rate() {
        let s = RecoveryStrategy::Adaptive;
        let low = millis(s.cooldown(1_000, 0, 0.05));
        assert!(low >= 1_000 && low < 1_100);
        let high = millis(s.cooldown(1_000, 0, 0.95));
        assert!(high >= 10_000 && high < 11_000);
        // Zero error rate still waits at least the base.
        assert!(millis(s.cooldown(1_000, 0, 0.0)) >= 1_000);
    }
}
