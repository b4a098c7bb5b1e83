//! Backoff policy for the Download Manager's per-task retry loop (§4.10).
//!
//! This is the crate's one retry loop: catalog adapters surface a failed
//! query once (`Core::search` logs it and moves on to the next catalog)
//! rather than retrying, so the policy lives here rather than behind a
//! generic retry harness.

use rand::Rng;
use std::time::Duration;

/// Exponential backoff with decorrelated jitter, bounded by `max_attempts`.
#[derive(Debug, Clone)]
pub struct TransferBackoff {
    /// Total attempts allowed, including the first (non-retry) one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl TransferBackoff {
    /// `retries` is `download.retries` from config: the number of retries
    /// *after* the first attempt, so `max_attempts` is one more than that.
    pub fn new(retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: retries + 1,
            base_delay,
            max_delay,
        }
    }

    /// Delay before retrying `attempt` (0-indexed). Decorrelated jitter
    /// (0.5x-1.5x of the exponential delay) keeps several download workers
    /// failing against the same host from retrying in lockstep.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponential = self.base_delay.as_secs_f64() * 2f64.powi(attempt as i32);
        let capped = exponential.min(self.max_delay.as_secs_f64());
        let jitter_factor = rand::rng().random_range(0.5..1.5);
        Duration::from_secs_f64((capped * jitter_factor).min(self.max_delay.as_secs_f64()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_attempts_is_retries_plus_one() {
        let backoff = TransferBackoff::new(3, Duration::from_secs(1), Duration::from_secs(30));
        assert_eq!(backoff.max_attempts, 4);
    }

    #[test]
    fn delay_is_capped_at_max_delay() {
        let backoff = TransferBackoff::new(5, Duration::from_secs(10), Duration::from_secs(30));
        for _ in 0..50 {
            assert!(backoff.delay_for(3) <= Duration::from_secs(30));
        }
    }

    #[test]
    fn delay_stays_within_decorrelated_jitter_band() {
        let backoff = TransferBackoff::new(3, Duration::from_secs(2), Duration::from_secs(60));
        for _ in 0..50 {
            let delay = backoff.delay_for(0);
            assert!(delay >= Duration::from_secs(1) && delay <= Duration::from_secs(3));
        }
    }

    #[test]
    fn first_attempt_delay_doubles_the_second() {
        let backoff = TransferBackoff {
            max_attempts: 4,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300),
        };
        // With jitter disabled by construction (base well under the cap, but
        // we only assert the exponent relationship holds on average across
        // many samples to avoid a flaky single-sample comparison).
        let mut first_total = Duration::ZERO;
        let mut second_total = Duration::ZERO;
        for _ in 0..200 {
            first_total += backoff.delay_for(0);
            second_total += backoff.delay_for(1);
        }
        assert!(second_total > first_total);
    }
}
