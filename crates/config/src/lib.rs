//! Configuration management for hubkit.
//!
//! This crate turns configuration files and environment variables into
//! typed, validated records consumed by the GitHub client core. Loosely
//! typed option bags never reach the client: everything is checked here,
//! at the boundary.
//!
//! # Overview
//!
//! - [`config`]: The top-level [`Config`] struct and loading logic
//! - [`cache`]: Response cache bounds
//! - [`retry`]: Retry attempts and backoff delays
//! - [`rate_limit`]: Wait versus fail-fast policy
//! - [`token`]: Static token or GitHub App credentials
//! - [`auth`]: Credential fallback chain (config, `gh` CLI, anonymous)
//! - [`persistence`]: Config file discovery, reading, and writing
//! - [`error`]: Error types for configuration operations
//!
//! # Configuration Sources (Priority)
//!
//! 1. Environment variables (`HUBKIT_BASE_URL`, `HUBKIT_TOKEN`, `GITHUB_TOKEN`)
//! 2. Local config (`./hubkit.json5` or `./hubkit.json`)
//! 3. User config (`~/.config/hubkit/config.json5` or `~/.config/hubkit/config.json`)
//! 4. Built-in defaults
//!
//! Environment tokens only fill in a credential when none is configured.
//!
//! # Example
//!
//! ```json5
//! {
//!   base_url: "https://api.github.com",
//!   cache: { max_size: 1024, max_age_ms: 60000 },
//!   retry: { max_attempts: 4, base_delay_ms: 500, max_delay_ms: 30000 },
//!   rate_limit: { policy: "wait" },
//!   token: { static_token: "ghp_xxx" },
//! }
//! ```

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod persistence;
pub mod rate_limit;
pub mod retry;
pub mod token;

pub use cache::CacheConfig;
pub use config::Config;
pub use error::{ConfigError, Result};
pub use rate_limit::{RateLimitConfig, RateLimitPolicy};
pub use retry::RetryConfig;
pub use token::{AppCredentialsConfig, TokenSourceConfig};
