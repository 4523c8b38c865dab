//! Backoff policy: how long the dispatch loop waits when it cannot make progress.
//!
//! The loop waits only when it is saturated at the global concurrency limit,
//! when the queue is empty, or when a whole pass over the queue only
//! re-enqueued deferred tasks and unsatisfied barriers.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::config::duration_ms;

/// Bounded exponential backoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    /// Delay for the first wait.
    #[serde(with = "duration_ms")]
    pub base_delay: Duration,

    pub multiplier: f64,

    /// Upper bound for any single wait.
    #[serde(with = "duration_ms")]
    pub max_delay: Duration,

    /// Scale each wait by a random factor in `[0.5, 1.0]`.
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1),
            multiplier: 2.0,
            max_delay: Duration::from_millis(50),
            jitter: true,
        }
    }
}

impl BackoffPolicy {
    /// Delay before the next poll after `attempts` consecutive waits (1-indexed).
    ///
    /// delay = min(base_delay * multiplier^(attempts - 1), max_delay)
    ///
    /// Example with base_delay=1ms, multiplier=2.0, max_delay=50ms:
    /// 1ms, 2ms, 4ms, ... 32ms, 50ms, 50ms
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let base_secs = self.base_delay.as_secs_f64();
        let exponent = attempts.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay_secs = (base_secs * self.multiplier.powi(exponent))
            .min(self.max_delay.as_secs_f64())
            .max(0.0);
        let delay = Duration::from_secs_f64(delay_secs);
        if self.jitter {
            delay.mul_f64(rand::thread_rng().gen_range(0.5..=1.0))
        } else {
            delay
        }
    }
}

/// Consecutive-wait tracker used by the loop.
#[derive(Debug)]
pub(crate) struct Backoff {
    policy: BackoffPolicy,
    attempts: u32,
}

impl Backoff {
    pub(crate) fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
        }
    }

    pub(crate) fn next_delay(&mut self) -> Duration {
        self.attempts = self.attempts.saturating_add(1);
        self.policy.next_delay(self.attempts)
    }

    /// Call after the loop made progress.
    pub(crate) fn reset(&mut self) {
        self.attempts = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn no_jitter() -> BackoffPolicy {
        BackoffPolicy {
            jitter: false,
            ..BackoffPolicy::default()
        }
    }

    #[rstest]
    #[case(0, 1)]
    #[case(1, 1)]
    #[case(2, 2)]
    #[case(3, 4)]
    #[case(6, 32)]
    #[case(7, 50)]
    #[case(40, 50)]
    fn exponential_backoff_is_capped(#[case] attempts: u32, #[case] expected_ms: u64) {
        assert_eq!(
            no_jitter().next_delay(attempts),
            Duration::from_millis(expected_ms)
        );
    }

    #[test]
    fn jitter_stays_within_half_and_full_delay() {
        let policy = BackoffPolicy::default();
        for _ in 0..100 {
            let delay = policy.next_delay(7);
            assert!(delay >= Duration::from_millis(25));
            assert!(delay <= Duration::from_millis(50));
        }
    }

    #[test]
    fn tracker_grows_and_resets() {
        let mut backoff = Backoff::new(no_jitter());
        assert_eq!(backoff.next_delay(), Duration::from_millis(1));
        assert_eq!(backoff.next_delay(), Duration::from_millis(2));
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(1));
    }
}
