//! Backoff policy shared by readiness probing and delivery retries

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Strategy for calculating delays between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Same delay every time
    #[default]
    Fixed,
    /// Delay grows by `multiplier` each attempt, capped at `max`
    Exponential,
}

/// Delay schedule between consecutive failed attempts
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub strategy: BackoffStrategy,
    /// Delay after the first failure
    pub initial: Duration,
    /// Upper bound for any delay
    pub max: Duration,
    /// Growth factor for exponential backoff
    pub multiplier: f64,
    /// Randomization fraction in [0, 1]; 0 disables jitter
    pub jitter: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(1))
    }
}

impl BackoffPolicy {
    /// Constant delay between attempts
    pub fn fixed(interval: Duration) -> Self {
        Self {
            strategy: BackoffStrategy::Fixed,
            initial: interval,
            max: interval,
            multiplier: 1.0,
            jitter: 0.0,
        }
    }

    /// Doubling delay starting at `initial`, capped at `max`
    pub fn exponential(initial: Duration, max: Duration) -> Self {
        Self {
            strategy: BackoffStrategy::Exponential,
            initial,
            max: max.max(initial),
            multiplier: 2.0,
            jitter: 0.0,
        }
    }

    /// Add ±`jitter` randomization
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = match self.strategy {
            BackoffStrategy::Fixed => self.initial,
            BackoffStrategy::Exponential => {
                let exponent = attempt.saturating_sub(1).min(32) as i32;
                let factor = self.multiplier.max(1.0).powi(exponent);
                let nanos = (self.initial.as_nanos() as f64 * factor).round();
                if nanos.is_finite() && nanos < self.max.as_nanos() as f64 {
                    Duration::from_nanos(nanos as u64)
                } else {
                    self.max
                }
            }
        };

        let capped = base.min(self.max.max(self.initial));
        apply_jitter(capped, self.jitter)
    }
}

fn apply_jitter(duration: Duration, jitter: f64) -> Duration {
    if jitter <= 0.0 || duration.is_zero() {
        return duration;
    }

    let range = duration.as_secs_f64() * jitter.clamp(0.0, 1.0);
    let offset = rand::rng().random_range(-range..=range);
    Duration::from_secs_f64((duration.as_secs_f64() + offset).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_delay_is_constant() {
        let policy = BackoffPolicy::fixed(Duration::from_secs(1));
        for attempt in 1..10 {
            assert_eq!(policy.delay_for(attempt), Duration::from_secs(1));
        }
    }

    #[test]
    fn test_exponential_doubles_and_caps() {
        let policy =
            BackoffPolicy::exponential(Duration::from_millis(100), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(800));
        assert_eq!(policy.delay_for(5), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_millis(1000));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = BackoffPolicy::fixed(Duration::from_secs(10)).with_jitter(0.25);
        for _ in 0..100 {
            let d = policy.delay_for(1).as_secs_f64();
            assert!((7.49..=12.51).contains(&d), "delay {d} out of range");
        }
    }

    #[test]
    fn test_strategy_serde() {
        let s: BackoffStrategy = serde_json::from_str("\"exponential\"").unwrap();
        assert_eq!(s, BackoffStrategy::Exponential);
    }
}
