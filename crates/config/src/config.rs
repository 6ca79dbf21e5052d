//! Core configuration struct and loading logic.
//!
//! This module provides the main [`Config`] struct which aggregates every
//! option recognized by the hubkit GitHub client.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::CacheConfig;
use crate::error::{ConfigError, Result};
use crate::persistence::{find_config_file, read_config_file, write_config_file};
use crate::rate_limit::RateLimitConfig;
use crate::retry::RetryConfig;
use crate::token::TokenSourceConfig;

/// Default GitHub REST/GraphQL API root.
pub const DEFAULT_BASE_URL: &str = "https://api.github.com";

/// Default per-call timeout (30 seconds).
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Upper bound on the per-call timeout (5 minutes).
pub const MAX_TIMEOUT_MS: u64 = 300_000;

/// Environment variable overriding the API base URL.
pub const ENV_BASE_URL: &str = "HUBKIT_BASE_URL";

/// Environment variables consulted, in order, for a static token.
pub const ENV_TOKENS: &[&str] = &["HUBKIT_TOKEN", "GITHUB_TOKEN"];

/// The main configuration struct for the hubkit client.
///
/// # Examples
///
/// ```
/// use hubkit_config::{Config, RateLimitConfig, TokenSourceConfig};
///
/// // Create a default config
/// let config = Config::default();
/// assert_eq!(config.base_url, "https://api.github.com");
/// assert!(config.token.is_none());
///
/// // Create a custom config
/// let config = Config {
///     rate_limit: RateLimitConfig::fail_fast(),
///     token: Some(TokenSourceConfig::StaticToken("ghp_xxx".to_string())),
///     ..Config::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// API root; override for GitHub Enterprise or test servers.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Value of the `User-Agent` header (GitHub rejects requests without one).
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-call network timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Response cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Retry and backoff settings.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Rate-limit policy.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Credential source. `None` means unauthenticated access.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<TokenSourceConfig>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_user_agent() -> String {
    format!("hubkit/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            cache: CacheConfig::default(),
            retry: RetryConfig::default(),
            rate_limit: RateLimitConfig::default(),
            token: None,
        }
    }
}

impl Config {
    /// Creates a new default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from the default file locations, then applies
    /// environment overrides.
    ///
    /// Searches for configuration files in the following order:
    ///
    /// 1. Local: `./hubkit.json5` or `./hubkit.json`
    /// 2. User: `~/.config/hubkit/config.json5` or `~/.config/hubkit/config.json`
    ///
    /// If no configuration file is found, starts from the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is found but cannot be
    /// read, parsed, or validated.
    pub async fn load() -> Result<Self> {
        let mut config = match find_config_file() {
            Some(path) => read_config_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let config: Config = read_config_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves the configuration to a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        write_config_file(path, self)
    }

    /// Applies environment overrides using the given lookup.
    ///
    /// A token from the environment only fills in a missing credential; an
    /// explicitly configured source wins. The base URL override always wins.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            self.base_url = url;
        }

        if self.token.is_none() {
            self.token = ENV_TOKENS
                .iter()
                .filter_map(|key| lookup(key))
                .find(|v| !v.trim().is_empty())
                .map(TokenSourceConfig::StaticToken);
        }
    }

    /// Returns the per-call timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Returns whether a credential source is configured.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure found.
    pub fn validate(&self) -> Result<()> {
        let base = self.base_url.trim();
        if !(base.starts_with("https://") || base.starts_with("http://")) {
            return Err(ConfigError::invalid(
                "base_url",
                format!("`{}` is not an http(s) URL", self.base_url),
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::invalid("user_agent", "must not be empty"));
        }
        if self.timeout_ms == 0 || self.timeout_ms > MAX_TIMEOUT_MS {
            return Err(ConfigError::invalid(
                "timeout_ms",
                format!("{} is outside the range 1..={MAX_TIMEOUT_MS}", self.timeout_ms),
            ));
        }
        self.cache.validate()?;
        self.retry.validate()?;
        if let Some(token) = &self.token {
            token.validate()?;
        }
        Ok(())
    }
}
