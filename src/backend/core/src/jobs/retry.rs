//! Retry decisions and backoff between attempts.

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════════
// Backoff Strategy
// ═══════════════════════════════════════════════════════════════════════════════

/// Strategy for calculating retry delays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Same delay before every retry
    Fixed {
        #[serde(with = "humantime_serde")]
        delay: Duration,
    },
    /// `initial + increment * (n - 1)`
    Linear {
        #[serde(with = "humantime_serde")]
        initial: Duration,
        #[serde(with = "humantime_serde")]
        increment: Duration,
    },
    /// `initial * multiplier^(n - 1)`, capped at `max`
    Exponential {
        #[serde(with = "humantime_serde")]
        initial: Duration,
        #[serde(with = "humantime_serde")]
        max: Duration,
        multiplier: f64,
    },
    /// Exponential with random jitter
    ExponentialWithJitter {
        #[serde(with = "humantime_serde")]
        initial: Duration,
        #[serde(with = "humantime_serde")]
        max: Duration,
        multiplier: f64,
        jitter_factor: f64,
    },
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(5))
    }
}

impl BackoffStrategy {
    /// Delay after the `failures`-th failed attempt (1-indexed).
    pub fn delay_after(&self, failures: u32) -> Duration {
        let step = failures.saturating_sub(1);

        match self {
            Self::Fixed { delay } => *delay,
            Self::Linear { initial, increment } => {
                initial.saturating_add(increment.saturating_mul(step))
            }
            Self::Exponential {
                initial,
                max,
                multiplier,
            } => scaled(*initial, *multiplier, step).min(*max),
            Self::ExponentialWithJitter {
                initial,
                max,
                multiplier,
                jitter_factor,
            } => {
                let capped = scaled(*initial, *multiplier, step).min(*max).as_secs_f64();
                // delay * (1 +/- jitter_factor * random)
                let jitter = (rand::random::<f64>() * 2.0 - 1.0) * capped * jitter_factor;
                Duration::try_from_secs_f64((capped + jitter).max(0.0)).unwrap_or(*max)
            }
        }
    }

    /// Create a fixed backoff strategy.
    pub fn fixed(delay: Duration) -> Self {
        Self::Fixed { delay }
    }

    /// No wait between attempts.
    pub fn immediate() -> Self {
        Self::fixed(Duration::ZERO)
    }

    /// Exponential backoff starting at 5s, capped at one hour.
    pub fn exponential() -> Self {
        Self::Exponential {
            initial: Duration::from_secs(5),
            max: Duration::from_secs(3600),
            multiplier: 2.0,
        }
    }

    /// Create an exponential backoff with jitter.
    pub fn exponential_with_jitter() -> Self {
        Self::ExponentialWithJitter {
            initial: Duration::from_secs(5),
            max: Duration::from_secs(3600),
            multiplier: 2.0,
            jitter_factor: 0.2,
        }
    }
}

fn scaled(initial: Duration, multiplier: f64, step: u32) -> Duration {
    let secs = initial.as_secs_f64() * multiplier.powi(step.min(i32::MAX as u32) as i32);
    if secs.is_finite() {
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    } else {
        Duration::MAX
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Retry Policy
// ═══════════════════════════════════════════════════════════════════════════════

/// Decides whether a failed job gets another attempt, and how long to wait first.
///
/// The maximum number of attempts is not part of the policy: the executor is
/// configured with it and passes it in on every decision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default)]
    pub backoff: BackoffStrategy,
}

impl RetryPolicy {
    pub fn new(backoff: BackoffStrategy) -> Self {
        Self { backoff }
    }

    /// Retry while fewer than `max_retries` attempts have been made.
    pub fn should_retry(&self, retry_count: u32, max_retries: u32) -> bool {
        retry_count < max_retries
    }

    /// Wait before the attempt following `retry_count` failures.
    pub fn delay_before_retry(&self, retry_count: u32) -> Duration {
        self.backoff.delay_after(retry_count)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_retry() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(0, 3));
        assert!(policy.should_retry(2, 3));
        assert!(!policy.should_retry(3, 3));
        assert!(!policy.should_retry(4, 3));
        assert!(!policy.should_retry(0, 0));
    }

    #[test]
    fn test_default_delay_is_five_seconds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_before_retry(1), Duration::from_secs(5));
        assert_eq!(policy.delay_before_retry(2), Duration::from_secs(5));
    }

    #[test]
    fn test_backoff_linear() {
        let backoff = BackoffStrategy::Linear {
            initial: Duration::from_secs(5),
            increment: Duration::from_secs(3),
        };
        assert_eq!(backoff.delay_after(1), Duration::from_secs(5));
        assert_eq!(backoff.delay_after(2), Duration::from_secs(8));
        assert_eq!(backoff.delay_after(3), Duration::from_secs(11));
    }

    #[test]
    fn test_backoff_exponential() {
        let backoff = BackoffStrategy::Exponential {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(100),
            multiplier: 2.0,
        };
        assert_eq!(backoff.delay_after(1), Duration::from_secs(1));
        assert_eq!(backoff.delay_after(2), Duration::from_secs(2));
        assert_eq!(backoff.delay_after(4), Duration::from_secs(8));
        // Should cap at max
        assert_eq!(backoff.delay_after(11), Duration::from_secs(100));
        assert_eq!(backoff.delay_after(u32::MAX), Duration::from_secs(100));
    }

    #[test]
    fn test_backoff_jitter_stays_in_range() {
        let backoff = BackoffStrategy::ExponentialWithJitter {
            initial: Duration::from_secs(10),
            max: Duration::from_secs(100),
            multiplier: 2.0,
            jitter_factor: 0.5,
        };
        for _ in 0..50 {
            let delay = backoff.delay_after(1);
            assert!(delay >= Duration::from_secs(5));
            assert!(delay <= Duration::from_secs(15));
        }
    }

    #[test]
    fn test_backoff_jitter_saturates_instead_of_overflowing() {
        let uncapped = BackoffStrategy::ExponentialWithJitter {
            initial: Duration::from_secs(5),
            max: Duration::MAX,
            multiplier: 2.0,
            jitter_factor: 0.0,
        };
        assert_eq!(uncapped.delay_after(100), Duration::MAX);
        assert_eq!(uncapped.delay_after(u32::MAX), Duration::MAX);

        let wild = BackoffStrategy::ExponentialWithJitter {
            initial: Duration::from_secs(5),
            max: Duration::from_secs(60),
            multiplier: 2.0,
            jitter_factor: 1e308,
        };
        for failures in 1..=64 {
            assert!(wild.delay_after(failures) <= Duration::from_secs(60));
        }
    }

    #[test]
    fn test_backoff_deserialize() {
        let backoff: BackoffStrategy =
            serde_json::from_str(r#"{"kind": "fixed", "delay": "250ms"}"#).unwrap();
        assert_eq!(backoff, BackoffStrategy::fixed(Duration::from_millis(250)));

        let backoff: BackoffStrategy = serde_json::from_str(
            r#"{"kind": "exponential", "initial": "1s", "max": "1m", "multiplier": 3.0}"#,
        )
        .unwrap();
        assert_eq!(backoff.delay_after(3), Duration::from_secs(9));
    }
}
