//! Retry policy for compensating actions.

use std::time::Duration;

/// Default number of attempts per compensating action.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay after the first failed attempt.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Bounded exponential backoff.
///
/// The delay after failed attempt `a` (1-based) is `base_delay * 2^(a-1)`.
/// No delay follows the last attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy. `max_attempts` is clamped to at least 1.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// A policy that tries once and never sleeps.
    pub fn single_attempt() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Returns the delay to wait after failed attempt `attempt`, or `None`
    /// if no further attempt is allowed.
    pub fn backoff_after(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt >= self.max_attempts {
            return None;
        }
        let factor = 2u32.saturating_pow(attempt - 1);
        Some(self.base_delay.saturating_mul(factor))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_BASE_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.base_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_backoff_doubles_between_attempts() {
        let policy = RetryPolicy::new(4, Duration::from_millis(100));
        assert_eq!(policy.backoff_after(1), Some(Duration::from_millis(100)));
        assert_eq!(policy.backoff_after(2), Some(Duration::from_millis(200)));
        assert_eq!(policy.backoff_after(3), Some(Duration::from_millis(400)));
        assert_eq!(policy.backoff_after(4), None);
    }

    #[test]
    fn test_delays_are_non_decreasing() {
        let policy = RetryPolicy::new(10, Duration::from_millis(7));
        let delays: Vec<_> = (1..10).filter_map(|a| policy.backoff_after(a)).collect();
        assert_eq!(delays.len(), 9);
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_single_attempt_never_waits() {
        let policy = RetryPolicy::single_attempt();
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.backoff_after(1), None);
    }

    #[test]
    fn test_zero_attempts_is_clamped() {
        assert_eq!(RetryPolicy::new(0, Duration::from_secs(1)).max_attempts(), 1);
    }
}
