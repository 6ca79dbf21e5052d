//! Response cache configuration.
//!
//! Bounds the in-memory response cache by entry count and sets the default
//! freshness window applied to every stored response.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Default maximum number of cached responses.
pub const DEFAULT_MAX_SIZE: usize = 1024;

/// Default freshness window for cached responses (1 minute).
pub const DEFAULT_MAX_AGE_MS: u64 = 60_000;

/// Configuration for the response cache.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use hubkit_config::CacheConfig;
///
/// let config = CacheConfig::default();
/// assert_eq!(config.max_age(), Duration::from_secs(60));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of entries held before least-recently-used eviction.
    #[serde(default = "default_max_size")]
    pub max_size: usize,

    /// How long a stored response is served without revalidation.
    ///
    /// Zero disables caching of fresh hits, though ETags are still kept so
    /// that every call becomes a conditional request.
    #[serde(default = "default_max_age_ms")]
    pub max_age_ms: u64,
}

fn default_max_size() -> usize {
    DEFAULT_MAX_SIZE
}

fn default_max_age_ms() -> u64 {
    DEFAULT_MAX_AGE_MS
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            max_age_ms: DEFAULT_MAX_AGE_MS,
        }
    }
}

impl CacheConfig {
    /// Returns the freshness window as a [`Duration`].
    #[must_use]
    pub fn max_age(&self) -> Duration {
        Duration::from_millis(self.max_age_ms)
    }

    /// Validates the cache configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_size` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(ConfigError::invalid(
                "cache.max_size",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(CacheConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_size_is_rejected() {
        let config = CacheConfig {
            max_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn deserialize_partial() {
        let config: CacheConfig = serde_json::from_str(r#"{"max_size": 8}"#).unwrap();
        assert_eq!(config.max_size, 8);
        assert_eq!(config.max_age_ms, DEFAULT_MAX_AGE_MS);
    }
}
