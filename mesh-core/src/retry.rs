//! Retry policy for queued sync items.
//!
//! The default policy retries forever with no delay: a failed item stays at
//! its queue position and is attempted again on the next drain. Deployments
//! that push over metered links can bound attempts or add exponential
//! backoff. Parked items are never deleted.

use mesh_types::Timestamp;

/// Delay schedule between attempts of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
    /// Attempt on every drain.
    #[default]
    None,
    /// Wait `min(max_ms, base_ms * 2^(attempts - 1))` after a failure.
    Exponential {
        /// Delay after the first failure.
        base_ms: u64,
        /// Upper bound on the delay.
        max_ms: u64,
    },
}

impl Backoff {
    /// Delay owed after `attempts` failed attempts.
    pub fn delay_ms(&self, attempts: u32) -> u64 {
        match *self {
            Backoff::None => 0,
            Backoff::Exponential { base_ms, max_ms } => {
                if attempts == 0 {
                    return 0;
                }
                let shift = (attempts - 1).min(63);
                base_ms
                    .checked_mul(1u64 << shift)
                    .unwrap_or(u64::MAX)
                    .min(max_ms)
            }
        }
    }
}

/// What a drain should do with one queued item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Send it now.
    Attempt,
    /// Leave it for a later drain; eligible again at `until`.
    Wait {
        /// Earliest retry time.
        until: Timestamp,
    },
    /// Attempts exhausted; skip it until an operator intervenes.
    Parked,
}

/// Bounds on how often a queued item is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    /// Maximum attempts before an item is parked. `None` means unbounded.
    pub max_attempts: Option<u32>,
    /// Delay schedule.
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Unbounded retries with no delay.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Decide whether an item with this history should be sent at `now`.
    pub fn decide(
        &self,
        attempts: u32,
        last_attempt_at: Option<Timestamp>,
        now: Timestamp,
    ) -> RetryDecision {
        if let Some(max) = self.max_attempts {
            if attempts >= max {
                return RetryDecision::Parked;
            }
        }

        let delay = self.backoff.delay_ms(attempts);
        match last_attempt_at {
            Some(last) if delay > 0 => {
                let until = last.saturating_add(delay);
                if now < until {
                    RetryDecision::Wait { until }
                } else {
                    RetryDecision::Attempt
                }
            }
            _ => RetryDecision::Attempt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_always_attempts() {
        let policy = RetryPolicy::default();
        for attempts in [0, 1, 5, 1_000] {
            assert_eq!(
                policy.decide(attempts, Some(100), 100),
                RetryDecision::Attempt
            );
        }
    }

    #[test]
    fn max_attempts_parks() {
        let policy = RetryPolicy {
            max_attempts: Some(3),
            backoff: Backoff::None,
        };
        assert_eq!(policy.decide(2, None, 0), RetryDecision::Attempt);
        assert_eq!(policy.decide(3, None, 0), RetryDecision::Parked);
        assert_eq!(policy.decide(4, None, 0), RetryDecision::Parked);
    }

    #[test]
    fn exponential_delays_double_and_cap() {
        let backoff = Backoff::Exponential {
            base_ms: 1_000,
            max_ms: 5_000,
        };
        assert_eq!(backoff.delay_ms(0), 0);
        assert_eq!(backoff.delay_ms(1), 1_000);
        assert_eq!(backoff.delay_ms(2), 2_000);
        assert_eq!(backoff.delay_ms(3), 4_000);
        assert_eq!(backoff.delay_ms(4), 5_000);
        assert_eq!(backoff.delay_ms(200), 5_000);
    }

    #[test]
    fn backoff_window_waits() {
        let policy = RetryPolicy {
            max_attempts: None,
            backoff: Backoff::Exponential {
                base_ms: 1_000,
                max_ms: 60_000,
            },
        };

        assert_eq!(
            policy.decide(2, Some(10_000), 11_000),
            RetryDecision::Wait { until: 12_000 }
        );
        assert_eq!(policy.decide(2, Some(10_000), 12_000), RetryDecision::Attempt);
    }

    #[test]
    fn never_attempted_item_goes_immediately() {
        let policy = RetryPolicy {
            max_attempts: Some(1),
            backoff: Backoff::Exponential {
                base_ms: 500,
                max_ms: 500,
            },
        };
        assert_eq!(policy.decide(0, None, 0), RetryDecision::Attempt);
    }
}
