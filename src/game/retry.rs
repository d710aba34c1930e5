//! Bounded retry policy with exponential backoff and jitter.

use std::time::Duration;

use rand::Rng;

/// How often and how patiently a failing call is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per call, including the first one.
    pub max_attempts: usize,
    /// Delay before the second attempt; doubles afterwards.
    pub base_delay: Duration,
    /// Upper bound for a single delay (before jitter).
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy from attempt count and base delay.
    #[must_use]
    pub fn new(max_attempts: usize, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            ..Self::default()
        }
    }

    /// A policy that never waits between attempts.
    #[must_use]
    pub fn immediate(max_attempts: usize) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    /// Whether another attempt is allowed after `attempt` attempts.
    #[must_use]
    pub const fn allows_retry(&self, attempt: usize) -> bool {
        attempt < self.max_attempts
    }

    /// Delay after the given (1-based) attempt: `base * 2^(attempt-1)`,
    /// capped, plus up to half of it as random jitter.
    pub fn delay_for<R: Rng + ?Sized>(&self, attempt: usize, rng: &mut R) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let exponent = u32::try_from(attempt.saturating_sub(1).min(10)).unwrap_or(10);
        let delay = self
            .base_delay
            .saturating_mul(1_u32 << exponent)
            .min(self.max_delay);

        let jitter_ms = u64::try_from(delay.as_millis() / 2).unwrap_or(u64::MAX);
        if jitter_ms == 0 {
            return delay;
        }
        delay + Duration::from_millis(rng.random_range(0..=jitter_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_delay_grows_and_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
        };
        let mut rng = StdRng::seed_from_u64(1);

        let first = policy.delay_for(1, &mut rng);
        assert!(first >= Duration::from_millis(100) && first <= Duration::from_millis(150));

        let second = policy.delay_for(2, &mut rng);
        assert!(second >= Duration::from_millis(200) && second <= Duration::from_millis(300));

        let capped = policy.delay_for(8, &mut rng);
        assert!(capped >= Duration::from_millis(350) && capped <= Duration::from_millis(525));
    }

    #[test]
    fn test_immediate_policy() {
        let policy = RetryPolicy::immediate(2);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(policy.delay_for(3, &mut rng), Duration::ZERO);
        assert!(policy.allows_retry(1));
        assert!(!policy.allows_retry(2));
    }

    #[test]
    fn test_at_least_one_attempt() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }
}
