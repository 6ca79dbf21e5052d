//! GitHub API client core for hubkit.
//!
//! This crate provides a typed REST/GraphQL client that coordinates
//! response caching, rate-limit accounting, retries with backoff,
//! deduplication of concurrent identical calls, and credential rotation.
//!
//! # Overview
//!
//! - [`GitHubClient`]: The dispatcher every call goes through, plus the
//!   typed calls ([`get_repository`](GitHubClient::get_repository),
//!   [`list_issues`](GitHubClient::list_issues),
//!   [`search_repositories`](GitHubClient::search_repositories),
//!   [`get_pull_request`](GitHubClient::get_pull_request),
//!   [`current_user`](GitHubClient::current_user),
//!   [`fetch_rate_limits`](GitHubClient::fetch_rate_limits),
//!   [`graphql`](GitHubClient::graphql))
//! - [`Fingerprint`]: Canonical request identity
//! - [`ResponseCache`]: Bounded LRU cache with per-entry TTL and ETags
//! - [`RateLimitTracker`]: Primary and secondary rate-limit state
//! - [`RetryPolicy`]: Exponential backoff with jitter
//! - [`TokenManager`]: Static tokens and rotating installation tokens
//! - [`SingleFlight`]: Collapsing concurrent identical work
//! - [`Transport`]: The HTTP seam, with [`ReqwestTransport`] for production
//! - [`Error`] and [`ErrorKind`]: One closed error taxonomy for REST and
//!   GraphQL
//!
//! # Authentication
//!
//! The client supports three credential sources:
//!
//! - **Anonymous**: 60 requests/hour, public data only
//! - **Static token**: 5,000 requests/hour, never refreshed
//! - **GitHub App installation**: short-lived tokens minted from the app's
//!   private key and refreshed before they expire
//!
//! Tokens are handled securely using [`secrecy::SecretString`] to prevent
//! accidental logging of sensitive credentials.
//!
//! # Examples
//!
//! ```no_run
//! use hubkit_config::Config;
//! use hubkit_github::{ErrorKind, GitHubClient, IssueFilters, SearchQuery, SearchSort};
//!
//! # async fn example() -> hubkit_github::Result<()> {
//! let client = GitHubClient::new(&Config::default())?;
//!
//! let issues = client
//!     .list_issues("rust-lang", "rust", &IssueFilters::default())
//!     .await?;
//! println!("{} open issues on the first page", issues.len());
//!
//! let hits = client
//!     .search_repositories(&SearchQuery::new("http client").sort(SearchSort::Stars))
//!     .await?;
//! println!("{} matches", hits.total_count);
//!
//! match client.get_repository("octocat", "does-not-exist").await {
//!     Err(e) if e.kind() == ErrorKind::NotFound => println!("no such repository"),
//!     other => println!("{other:?}"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod client;
pub mod error;
pub mod fingerprint;
pub mod issue;
pub mod models;
pub mod rate_limit;
pub mod repos;
pub mod request;
pub mod retry;
pub mod search;
pub mod single_flight;
pub mod token;
pub mod transport;

mod response;

pub use cache::{CacheEntry, CacheStats, Lookup, ResponseCache};
pub use client::{ClientBuilder, ClientStats, GitHubClient};
pub use error::{Error, ErrorKind, LimitScope, Result, ValidationOrigin};
pub use fingerprint::{Fingerprint, canonical_json};
pub use issue::{IssueFilters, IssueState};
pub use models::{BranchRef, Issue, Label, PullRequest, Repository, SearchResults, State, User};
pub use rate_limit::{
    Permit, RateLimitOverview, RateLimitState, RateLimitTracker, Resource, ResourceQuota,
};
pub use request::Request;
pub use reqwest::Method;
pub use retry::{RetryDecision, RetryPolicy};
pub use search::{SearchQuery, SearchSort, SortOrder};
pub use single_flight::{Role, SingleFlight};
pub use token::{AccessToken, AppTokenMinter, TokenManager, TokenMinter, TokenPhase};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
