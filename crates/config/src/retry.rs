//! Retry and backoff configuration.
//!
//! Transient failures are retried with exponential backoff. The values here
//! bound how many attempts are made and how long the client sleeps between
//! them.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Default total number of attempts, the first one included.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;

/// Default base delay for exponential backoff.
pub const DEFAULT_BASE_DELAY_MS: u64 = 500;

/// Default ceiling for a single backoff delay.
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

/// Upper bound on `max_attempts`.
pub const MAX_ATTEMPTS_LIMIT: u32 = 10;

/// Configuration for retry behavior.
///
/// # Examples
///
/// ```
/// use hubkit_config::RetryConfig;
///
/// let config = RetryConfig::default();
/// assert_eq!(config.max_attempts, 4);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per logical call, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay multiplied by `2^attempt`.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// No single backoff delay exceeds this value.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}

fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl RetryConfig {
    /// Returns the base delay as a [`Duration`].
    #[must_use]
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Returns the maximum delay as a [`Duration`].
    #[must_use]
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Validates the retry configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_attempts` is outside `1..=10` or if the
    /// maximum delay is smaller than the base delay.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 || self.max_attempts > MAX_ATTEMPTS_LIMIT {
            return Err(ConfigError::invalid(
                "retry.max_attempts",
                format!(
                    "{} is outside the range 1..={MAX_ATTEMPTS_LIMIT}",
                    self.max_attempts
                ),
            ));
        }

        if self.max_delay_ms < self.base_delay_ms {
            return Err(ConfigError::invalid(
                "retry.max_delay_ms",
                format!(
                    "{} is smaller than base_delay_ms ({})",
                    self.max_delay_ms, self.base_delay_ms
                ),
            ));
        }

        Ok(())
    }
}
