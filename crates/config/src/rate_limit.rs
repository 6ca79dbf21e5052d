//! Rate-limit policy configuration.
//!
//! When a resource class has no quota left, the client either waits for the
//! window to reset or fails immediately. The policy is chosen here.
//!
//! # Format
//!
//! ```json5
//! {
//!   // Either "wait" or "fail_fast"
//!   rate_limit: { policy: "wait", max_wait_ms: 900000 },
//! }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default ceiling on a single rate-limit wait (15 minutes).
pub const DEFAULT_MAX_WAIT_MS: u64 = 15 * 60 * 1000;

/// What to do when a call would exceed the remaining quota.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitPolicy {
    /// Sleep until the quota window resets, then proceed.
    #[default]
    Wait,
    /// Return a rate-limit error immediately.
    FailFast,
}

/// Configuration for rate-limit handling.
///
/// # Examples
///
/// ```
/// use hubkit_config::{RateLimitConfig, RateLimitPolicy};
///
/// let config: RateLimitConfig = serde_json::from_str(r#"{"policy": "fail_fast"}"#).unwrap();
/// assert_eq!(config.policy, RateLimitPolicy::FailFast);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Wait or fail fast.
    #[serde(default)]
    pub policy: RateLimitPolicy,

    /// Under [`RateLimitPolicy::Wait`], waits longer than this fail fast.
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
}

fn default_max_wait_ms() -> u64 {
    DEFAULT_MAX_WAIT_MS
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            policy: RateLimitPolicy::default(),
            max_wait_ms: DEFAULT_MAX_WAIT_MS,
        }
    }
}

impl RateLimitConfig {
    /// A fail-fast configuration.
    #[must_use]
    pub fn fail_fast() -> Self {
        Self {
            policy: RateLimitPolicy::FailFast,
            ..Self::default()
        }
    }

    /// Returns the wait ceiling as a [`Duration`].
    #[must_use]
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    /// Returns whether a required wait of `wait` may be slept through.
    #[must_use]
    pub fn permits_wait(&self, wait: Duration) -> bool {
        self.policy == RateLimitPolicy::Wait && wait <= self.max_wait()
    }
}
