//! Retry policies.
//!
//! Two separate budgets live here:
//! - `RetryPolicy`: how many deliveries a failing job gets before it is
//!   abandoned. Driven entirely by the queue's receive count.
//! - `Backoff`: how long the worker waits after a transport error before it
//!   talks to the queue again.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Job retry budget.
///
/// The counter is the queue's approximate receive count, so the cap is
/// best-effort: under pathological redelivery a job can run a few extra times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// A failed job whose receive count exceeds this is abandoned.
    pub max_retry_attempts: u32,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 5;

    pub fn new(max_retry_attempts: u32) -> Self {
        Self { max_retry_attempts }
    }

    /// Has a failed delivery with this receive count used up the budget?
    ///
    /// Strictly greater: with a max of 5 the job runs on deliveries 1..=5 and
    /// is abandoned when delivery 6 fails.
    pub fn is_exhausted(&self, receive_count: u32) -> bool {
        receive_count > self.max_retry_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_RETRY_ATTEMPTS)
    }
}

/// Backoff for transport errors (exponential, capped, with a little jitter).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backoff {
    /// Delay after the first consecutive failure.
    #[serde(with = "crate::config::duration_secs")]
    pub base_delay: Duration,

    /// Growth factor per consecutive failure.
    pub multiplier: f64,

    /// Upper bound for any single delay.
    #[serde(with = "crate::config::duration_secs")]
    pub max_delay: Duration,
}

impl Backoff {
    /// Calculate the delay after `failures` consecutive failures (1-indexed).
    ///
    /// delay = min(base_delay * multiplier^(failures - 1), max_delay)
    ///
    /// With base=1s, multiplier=2.0, max=60s:
    /// - failure 1: 1s
    /// - failure 2: 2s
    /// - failure 3: 4s
    /// - failure 7 and later: 60s
    pub fn next_delay(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        // NaN, infinite or negative (bad multiplier from config)
        Duration::try_from_secs_f64(secs).unwrap_or(self.max_delay)
    }

    /// `next_delay` plus up to 10% random jitter, so a fleet of workers does
    /// not hammer a recovering endpoint in lockstep.
    pub fn jittered_delay(&self, failures: u32) -> Duration {
        let delay = self.next_delay(failures);
        let spread = delay.as_secs_f64() * 0.1;
        if spread <= 0.0 {
            return delay;
        }
        let extra = rand::thread_rng().gen_range(0.0..spread);
        delay + Duration::from_secs_f64(extra)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1, false)]
    #[case(5, false)]
    #[case(6, true)]
    #[case(42, true)]
    fn exhausted_only_past_the_maximum(#[case] receive_count: u32, #[case] exhausted: bool) {
        let policy = RetryPolicy::default();
        assert_eq!(policy.is_exhausted(receive_count), exhausted);
    }

    #[test]
    fn zero_budget_abandons_after_first_redelivery() {
        let policy = RetryPolicy::new(0);
        assert!(policy.is_exhausted(1));
    }

    #[test]
    fn exponential_backoff_increases_until_cap() {
        let backoff = Backoff::default();

        assert_eq!(backoff.next_delay(1), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(2), Duration::from_secs(2));
        assert_eq!(backoff.next_delay(3), Duration::from_secs(4));
        assert_eq!(backoff.next_delay(7), Duration::from_secs(60));
        assert_eq!(backoff.next_delay(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn zero_failures_uses_base_delay() {
        assert_eq!(Backoff::default().next_delay(0), Duration::from_secs(1));
    }

    #[rstest]
    #[case(-2.0)]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    fn bad_multiplier_falls_back_to_cap(#[case] multiplier: f64) {
        let backoff = Backoff {
            multiplier,
            ..Backoff::default()
        };
        assert_eq!(backoff.next_delay(2), Duration::from_secs(60));
        assert!(backoff.jittered_delay(2) <= Duration::from_secs(66));
    }

    #[test]
    fn jitter_stays_within_ten_percent() {
        let backoff = Backoff::default();
        for _ in 0..100 {
            let d = backoff.jittered_delay(3);
            assert!(d >= Duration::from_secs(4));
            assert!(d < Duration::from_millis(4400));
        }
    }
}
