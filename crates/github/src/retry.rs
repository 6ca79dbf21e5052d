//! Retry policy with exponential backoff and jitter.
//!
//! The policy is a pure function of the attempt number and the error; it
//! does no I/O and no sleeping, so it can be tested in isolation. The
//! dispatcher owns the loop and the sleeps.
//!
//! Retryable: network failures, 5xx responses, and rate-limit errors that
//! say how long to wait. Everything else surfaces immediately. Requests
//! not marked idempotent are never retried.

use std::time::Duration;

use hubkit_config::RetryConfig;
use rand::Rng;

use crate::error::{Error, ErrorKind};

/// Outcome of consulting the policy after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for `delay`, then try again.
    Retry {
        /// How long to wait first.
        delay: Duration,
    },
    /// Surface the error.
    GiveUp,
}

/// Exponential backoff policy.
///
/// `attempt` is always the number of attempts already made (1 after the
/// first failure).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Creates a policy.
    ///
    /// `max_attempts` is clamped to at least 1 and `max_delay` to at least
    /// `base_delay`.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: max_delay.max(base_delay),
        }
    }

    /// Creates a policy from validated configuration.
    #[must_use]
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, config.base_delay(), config.max_delay())
    }

    /// Total attempts allowed, the first one included.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns whether an error of `kind` may be retried after `attempt`
    /// attempts.
    #[must_use]
    pub fn should_retry(&self, attempt: u32, kind: ErrorKind) -> bool {
        attempt < self.max_attempts && kind.is_transient()
    }

    /// The un-jittered delay after `attempt` attempts:
    /// `min(max_delay, base_delay * 2^(attempt - 1))`.
    #[must_use]
    pub fn ceiling_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1 << exponent)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// The jittered delay after `attempt` attempts.
    ///
    /// Uniform in `[ceiling / 2, ceiling]`, so it never exceeds the maximum
    /// delay and its expectation grows with `attempt` until the cap.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let ceiling = self.ceiling_for(attempt);
        let half = ceiling / 2;
        let spread = u64::try_from((ceiling - half).as_millis()).unwrap_or(u64::MAX);
        let jitter = rand::rng().random_range(0..=spread);
        half.saturating_add(Duration::from_millis(jitter)).min(ceiling)
    }

    /// Decides what to do after `attempt` attempts failed with `error`.
    #[must_use]
    pub fn decide(&self, attempt: u32, error: &Error, idempotent: bool) -> RetryDecision {
        if !idempotent || !self.should_retry(attempt, error.kind()) {
            return RetryDecision::GiveUp;
        }
        match error.kind() {
            ErrorKind::RateLimited => match error.retry_after() {
                Some(wait) => RetryDecision::Retry { delay: wait },
                None => RetryDecision::GiveUp,
            },
            _ => RetryDecision::Retry {
                delay: self.delay_for(attempt),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LimitScope;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(4, Duration::from_millis(100), Duration::from_millis(1000))
    }

    fn server_error() -> Error {
        Error::ServerError {
            status: 502,
            message: "bad gateway".into(),
        }
    }

    #[test]
    fn ceiling_doubles_then_caps() {
        let p = policy();
        assert_eq!(p.ceiling_for(1), Duration::from_millis(100));
        assert_eq!(p.ceiling_for(2), Duration::from_millis(200));
        assert_eq!(p.ceiling_for(3), Duration::from_millis(400));
        assert_eq!(p.ceiling_for(4), Duration::from_millis(800));
        assert_eq!(p.ceiling_for(5), Duration::from_millis(1000));
        assert_eq!(p.ceiling_for(40), Duration::from_millis(1000));
    }

    #[test]
    fn huge_attempt_numbers_do_not_overflow() {
        let p = RetryPolicy::new(3, Duration::from_secs(u64::MAX / 4), Duration::MAX);
        assert_eq!(p.ceiling_for(u32::MAX), Duration::MAX);
    }

    #[test]
    fn delay_stays_within_bounds() {
        let p = policy();
        for attempt in 1..=10 {
            let ceiling = p.ceiling_for(attempt);
            for _ in 0..50 {
                let delay = p.delay_for(attempt);
                assert!(delay >= ceiling / 2, "{delay:?} below half of {ceiling:?}");
                assert!(delay <= ceiling);
                assert!(delay <= Duration::from_millis(1000));
            }
        }
    }

    #[test]
    fn ceiling_is_non_decreasing() {
        let p = policy();
        for attempt in 1..20 {
            assert!(p.ceiling_for(attempt) <= p.ceiling_for(attempt + 1));
        }
    }

    #[test]
    fn retry_stops_exactly_at_max_attempts() {
        let p = policy();
        assert!(p.should_retry(1, ErrorKind::ServerError));
        assert!(p.should_retry(3, ErrorKind::ServerError));
        assert!(!p.should_retry(4, ErrorKind::ServerError));
        assert!(!p.should_retry(5, ErrorKind::ServerError));
    }

    #[test]
    fn permanent_kinds_are_not_retried() {
        let p = policy();
        for kind in [
            ErrorKind::NotFound,
            ErrorKind::ValidationFailed,
            ErrorKind::AuthenticationFailed,
        ] {
            assert!(!p.should_retry(1, kind));
        }
    }

    #[test]
    fn decide_backs_off_on_server_errors() {
        let decision = policy().decide(2, &server_error(), true);
        let RetryDecision::Retry { delay } = decision else {
            panic!("expected retry");
        };
        assert!(delay >= Duration::from_millis(100));
        assert!(delay <= Duration::from_millis(200));
    }

    #[test]
    fn decide_never_retries_non_idempotent_requests() {
        assert_eq!(
            policy().decide(1, &server_error(), false),
            RetryDecision::GiveUp
        );
    }

    #[test]
    fn decide_honors_rate_limit_wait() {
        let err = Error::RateLimited {
            scope: LimitScope::Secondary,
            reset_at: None,
            retry_after: Some(Duration::from_secs(42)),
        };
        assert_eq!(
            policy().decide(1, &err, true),
            RetryDecision::Retry {
                delay: Duration::from_secs(42)
            }
        );
    }

    #[test]
    fn decide_gives_up_on_rate_limit_without_wait() {
        let err = Error::RateLimited {
            scope: LimitScope::Secondary,
            reset_at: None,
            retry_after: None,
        };
        assert_eq!(policy().decide(1, &err, true), RetryDecision::GiveUp);
    }

    #[test]
    fn single_attempt_policy_never_retries() {
        let p = RetryPolicy::new(0, Duration::from_millis(1), Duration::from_millis(1));
        assert_eq!(p.max_attempts(), 1);
        assert_eq!(p.decide(1, &server_error(), true), RetryDecision::GiveUp);
    }
}
