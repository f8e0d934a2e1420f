//! Retry policy for tile fetch jobs.
//!
//! A policy decides how many attempts a fetch job makes and how long it
//! sleeps between them. Retries happen inside the job that was submitted;
//! nothing is ever resubmitted to the worker pool.
//!
//! # Example
//!
//! ```ignore
//! use mapsampler::executor::RetryPolicy;
//!
//! // One initial attempt plus up to five retries with exponential backoff
//! let retry_policy = RetryPolicy::with_retries(5);
//! assert_eq!(retry_policy.max_attempts(), 6);
//! ```

use std::time::Duration;

// =============================================================================
// Retry Policy Constants
// =============================================================================

/// Default initial delay for exponential backoff (100ms).
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 100;

/// Default maximum delay for exponential backoff (30 seconds).
pub const DEFAULT_MAX_DELAY_SECS: u64 = 30;

/// Default multiplier for exponential backoff.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Default number of retries after the first failed attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// How a fetch job handles transient failures.
///
/// Every failure consumes one retry credit. Once the credits are used up the
/// tile stays in the error state.
#[derive(Clone, Debug, PartialEq)]
pub enum RetryPolicy {
    /// No retries - fail immediately on error.
    None,

    /// Fixed number of attempts with constant delay between them.
    Fixed {
        /// Maximum number of attempts (including the initial attempt).
        max_attempts: u32,
        /// Delay between retry attempts.
        delay: Duration,
    },

    /// Exponential backoff with configurable parameters.
    ///
    /// The delay doubles after each failed attempt, up to a maximum delay.
    ExponentialBackoff {
        /// Maximum number of attempts (including the initial attempt).
        max_attempts: u32,
        /// Initial delay after the first failure.
        initial_delay: Duration,
        /// Maximum delay cap (delay won't exceed this).
        max_delay: Duration,
        /// Multiplier applied to delay after each failure (typically 2.0).
        multiplier: f64,
    },
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::with_retries(DEFAULT_MAX_RETRIES)
    }
}

impl RetryPolicy {
    /// Creates an exponential backoff policy with sensible defaults.
    ///
    /// Uses:
    /// - Initial delay: 100ms ([`DEFAULT_INITIAL_DELAY_MS`])
    /// - Max delay: 30 seconds ([`DEFAULT_MAX_DELAY_SECS`])
    /// - Multiplier: 2.0 ([`DEFAULT_BACKOFF_MULTIPLIER`])
    ///
    /// # Arguments
    ///
    /// * `max_attempts` - Maximum number of attempts (including initial)
    pub fn exponential(max_attempts: u32) -> Self {
        Self::ExponentialBackoff {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            max_delay: Duration::from_secs(DEFAULT_MAX_DELAY_SECS),
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }

    /// Exponential backoff allowing `max_retries` retries after the first attempt.
    pub fn with_retries(max_retries: u32) -> Self {
        if max_retries == 0 {
            Self::None
        } else {
            Self::exponential(max_retries.saturating_add(1))
        }
    }

    /// Creates a fixed retry policy.
    ///
    /// # Arguments
    ///
    /// * `max_attempts` - Maximum number of attempts (including initial)
    /// * `delay` - Fixed delay between attempts
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self::Fixed {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Calculates the delay before a given retry.
    ///
    /// # Arguments
    ///
    /// * `attempt` - The number of the attempt that just failed (1-based)
    ///
    /// # Returns
    ///
    /// The delay to wait before the retry, or `None` if no more retries are allowed.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        match self {
            Self::None => None,
            Self::Fixed {
                max_attempts,
                delay,
            } => (attempt < *max_attempts).then_some(*delay),
            Self::ExponentialBackoff {
                max_attempts,
                initial_delay,
                max_delay,
                multiplier,
            } => {
                if attempt >= *max_attempts {
                    return None;
                }
                // initial_delay * multiplier^(attempt-1), capped
                let factor = multiplier.powi(attempt.saturating_sub(1) as i32);
                let delay_ms = (initial_delay.as_millis() as f64 * factor)
                    .min(max_delay.as_millis() as f64);
                Some(Duration::from_millis(delay_ms as u64).min(*max_delay))
            }
        }
    }

    /// Returns the maximum number of attempts for this policy.
    pub fn max_attempts(&self) -> u32 {
        match self {
            Self::None => 1,
            Self::Fixed { max_attempts, .. } => *max_attempts,
            Self::ExponentialBackoff { max_attempts, .. } => *max_attempts,
        }
    }

    /// Number of retry credits after the first attempt.
    pub fn max_retries(&self) -> u32 {
        self.max_attempts().saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_none() {
        let policy = RetryPolicy::None;
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.max_retries(), 0);
        assert_eq!(policy.delay_for_attempt(1), None);
    }

    #[test]
    fn test_retry_policy_fixed() {
        let policy = RetryPolicy::fixed(3, Duration::from_millis(100));
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_millis(100)));
        assert_eq!(policy.delay_for_attempt(2), Some(Duration::from_millis(100)));
        assert_eq!(policy.delay_for_attempt(3), None); // No more retries
    }

    #[test]
    fn test_retry_policy_exponential() {
        let policy = RetryPolicy::ExponentialBackoff {
            max_attempts: 4,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        };

        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_millis(100)));
        assert_eq!(policy.delay_for_attempt(2), Some(Duration::from_millis(200)));
        assert_eq!(policy.delay_for_attempt(3), Some(Duration::from_millis(400)));
        assert_eq!(policy.delay_for_attempt(4), None);
    }

    #[test]
    fn test_retry_policy_exponential_respects_max_delay() {
        let policy = RetryPolicy::ExponentialBackoff {
            max_attempts: 10,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
        };

        assert_eq!(policy.delay_for_attempt(5), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_with_retries_counts_credits() {
        let policy = RetryPolicy::with_retries(5);
        assert_eq!(policy.max_attempts(), 6);
        assert_eq!(policy.max_retries(), 5);
        assert!(policy.delay_for_attempt(5).is_some());
        assert!(policy.delay_for_attempt(6).is_none());

        assert_eq!(RetryPolicy::with_retries(0), RetryPolicy::None);
    }

    #[test]
    fn test_default_uses_default_retries() {
        assert_eq!(RetryPolicy::default().max_retries(), DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn test_retry_policy_exponential_convenience() {
        let policy = RetryPolicy::exponential(3);
        assert_eq!(policy.max_attempts(), 3);
        if let RetryPolicy::ExponentialBackoff {
            initial_delay,
            max_delay,
            multiplier,
            ..
        } = policy
        {
            assert_eq!(initial_delay, Duration::from_millis(DEFAULT_INITIAL_DELAY_MS));
            assert_eq!(max_delay, Duration::from_secs(DEFAULT_MAX_DELAY_SECS));
            assert_eq!(multiplier, DEFAULT_BACKOFF_MULTIPLIER);
        } else {
            panic!("Expected ExponentialBackoff");
        }
    }
}
