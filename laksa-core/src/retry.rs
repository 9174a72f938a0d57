//! Retry policy: attempt budget and backoff math.
//!
//! The policy is pure configuration; the loop that applies it lives in
//! [`crate::execution::executor`].

use std::time::Duration;

use rand::Rng;

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempt budget, including the first request.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_backoff: Duration,
    /// Upper bound for any backoff delay.
    pub max_backoff: Duration,
    /// Jitter fraction applied as `delay * (1 ± jitter)`.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            jitter: 0.25,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub const fn with_base_backoff(mut self, delay: Duration) -> Self {
        self.base_backoff = delay;
        self
    }

    pub const fn with_max_backoff(mut self, delay: Duration) -> Self {
        self.max_backoff = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Backoff before retrying after the given 1-based failed attempt:
    /// `min(base * 2^(attempt-1), max) * (1 ± jitter)`.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let base = self
            .base_backoff
            .saturating_mul(1u32 << exp)
            .min(self.max_backoff);
        self.apply_jitter(base)
    }

    fn apply_jitter(&self, delay: Duration) -> Duration {
        if self.jitter <= 0.0 {
            return delay;
        }
        let range = delay.as_millis() as f64 * self.jitter;
        let offset = rand::thread_rng().gen_range(-range..=range);
        let millis = (delay.as_millis() as f64 + offset).max(0.0);
        Duration::from_millis(millis as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::new()
            .with_base_backoff(Duration::from_millis(500))
            .with_max_backoff(Duration::from_secs(8))
            .with_jitter(0.0);

        assert_eq!(policy.backoff_after(1), Duration::from_millis(500));
        assert_eq!(policy.backoff_after(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff_after(3), Duration::from_millis(2000));
        assert_eq!(policy.backoff_after(10), Duration::from_secs(8));
    }

    #[test]
    fn jitter_stays_within_band() {
        let policy = RetryPolicy::new()
            .with_base_backoff(Duration::from_millis(1000))
            .with_jitter(0.25);

        for _ in 0..100 {
            let d = policy.backoff_after(1);
            assert!(d >= Duration::from_millis(750), "{d:?}");
            assert!(d <= Duration::from_millis(1250), "{d:?}");
        }
    }
}
