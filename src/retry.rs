//! Retry policy for lease renewal.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::duration_ms;

/// Retry policy applied to transient transport failures during lease
/// renewal.
///
/// Conflict results (a mismatched token) are never retried; only the
/// transport class of errors goes through this policy before the refresher
/// reports a terminal failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts per renewal tick, including the first.
    pub max_attempts: u32,
    /// Backoff between attempts.
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::Exponential {
                initial: Duration::from_millis(100),
                max: Duration::from_secs(2),
                multiplier: 2.0,
            },
        }
    }
}

impl RetryPolicy {
    /// Create a retry policy with exponential backoff.
    pub fn exponential(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Exponential {
                initial: initial_delay,
                max: Duration::from_secs(2),
                multiplier: 2.0,
            },
        }
    }

    /// Create a retry policy with a constant delay.
    pub fn constant(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Constant(delay),
        }
    }

    /// Create a retry policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Backoff::None,
        }
    }

    /// Calculate the delay before the retry following `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay_for_attempt(attempt)
    }
}

/// Backoff strategy for retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Backoff {
    /// No delay between retries.
    None,
    /// Constant delay between retries.
    Constant(#[serde(with = "duration_ms")] Duration),
    /// Exponential backoff: delay grows by a multiplier each attempt.
    Exponential {
        /// Initial delay.
        #[serde(with = "duration_ms")]
        initial: Duration,
        /// Maximum delay.
        #[serde(with = "duration_ms")]
        max: Duration,
        /// Multiplier (typically 2.0).
        multiplier: f64,
    },
}

impl Backoff {
    /// Calculate delay for a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Constant(d) => *d,
            Self::Exponential {
                initial,
                max,
                multiplier,
            } => {
                let factor = multiplier.powi(attempt as i32);
                let millis = (initial.as_millis() as f64 * factor) as u64;
                Duration::from_millis(millis).min(*max)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff() {
        let backoff = Backoff::Exponential {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(10),
            multiplier: 2.0,
        };

        assert_eq!(backoff.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(backoff.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(backoff.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(backoff.delay_for_attempt(3), Duration::from_millis(800));
    }

    #[test]
    fn test_exponential_backoff_is_capped() {
        let backoff = Backoff::Exponential {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(2),
            multiplier: 2.0,
        };

        assert_eq!(backoff.delay_for_attempt(10), Duration::from_secs(2));
    }

    #[test]
    fn test_constant_backoff() {
        let backoff = Backoff::Constant(Duration::from_millis(500));

        assert_eq!(backoff.delay_for_attempt(0), Duration::from_millis(500));
        assert_eq!(backoff.delay_for_attempt(5), Duration::from_millis(500));
    }

    #[test]
    fn test_default_policy_is_bounded() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert!(policy.delay_for_attempt(0) > Duration::ZERO);
    }
}
