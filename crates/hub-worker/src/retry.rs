//! Retry pacing: exponential backoff with jitter.
//!
//! The Event Store only counts attempts; the delay between them is chosen
//! here and applied by the pool after an event has been claimed, so a waiting
//! retry is never visible to other workers.

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before the second attempt; doubles per further attempt.
    pub base_delay: Duration,
    /// Upper bound on the deterministic part of the delay.
    pub max_delay: Duration,
    /// Uniform random addition in `0..=jitter`, de-synchronizing retries that
    /// failed together.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// No jitter, for deterministic tests.
    pub fn fixed(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            jitter: Duration::ZERO,
        }
    }

    /// Delay to wait before dispatching the given attempt number. The first
    /// attempt is immediate.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exponent = (attempt - 2).min(16);
        let backoff = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max_delay);

        if self.jitter.is_zero() {
            backoff
        } else {
            let jitter_ms = rand::thread_rng().gen_range(0..=self.jitter.as_millis() as u64);
            backoff + Duration::from_millis(jitter_ms)
        }
    }
}
