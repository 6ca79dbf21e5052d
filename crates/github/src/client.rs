//! GitHub API client implementation.
//!
//! This module provides the [`GitHubClient`] struct, the request dispatcher
//! that every typed call goes through. Per call it:
//!
//! 1. computes the request fingerprint
//! 2. serves a fresh cache hit without touching the network
//! 3. joins an identical call already in flight instead of sending another
//! 4. waits for (or refuses on) exhausted rate limits
//! 5. attaches a valid token
//! 6. sends the request under the per-call timeout, retrying transient
//!    failures with backoff
//! 7. validates the payload, then updates the cache and the rate-limit
//!    state
//!
//! All shared state (cache, rate limits, tokens, in-flight calls) lives in
//! one client instance. Clones of a [`GitHubClient`] share it; separately
//! built clients do not.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use hubkit_config::{Config, RateLimitConfig};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, ETAG, HeaderMap, HeaderValue, IF_NONE_MATCH};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::cache::{Lookup, ResponseCache};
use crate::error::{Error, ErrorKind, LimitScope, Result};
use crate::fingerprint::Fingerprint;
use crate::models::User;
use crate::rate_limit::{RateLimitOverview, RateLimitState, RateLimitTracker, Resource};
use crate::request::Request;
use crate::response::{classify_failure, decode, graphql_data, parse_body, validate_as};
use crate::retry::{RetryDecision, RetryPolicy};
use crate::single_flight::{Role, SingleFlight};
use crate::token::{TokenManager, TokenMinter};
use crate::transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};

const GITHUB_JSON: &str = "application/vnd.github+json";
const API_VERSION_HEADER: &str = "x-github-api-version";
const API_VERSION: &str = "2022-11-28";

/// Checks that a payload has the shape the caller expects.
type Validator = fn(&Value) -> Result<()>;

/// A revalidatable cache entry carried into the dispatch loop.
struct Stale {
    value: Arc<Value>,
    etag: String,
}

/// Point-in-time client counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientStats {
    /// Calls answered from a fresh cache entry.
    pub cache_hits: u64,
    /// Calls that found no fresh cache entry.
    pub cache_misses: u64,
    /// Entries currently cached.
    pub cache_size: usize,
    /// Requests handed to the transport.
    pub network_calls: u64,
    /// Attempts repeated after a retryable failure.
    pub retries: u64,
    /// Calls that joined an identical call already in flight.
    pub deduplicated: u64,
}

#[derive(Debug, Default)]
struct Counters {
    network_calls: AtomicU64,
    retries: AtomicU64,
    deduplicated: AtomicU64,
}

struct ClientInner {
    base_url: String,
    timeout: Duration,
    cache_ttl: Duration,
    transport: Arc<dyn Transport>,
    cache: ResponseCache,
    limits: RateLimitTracker,
    retry: RetryPolicy,
    rate_limit: RateLimitConfig,
    tokens: TokenManager,
    flights: SingleFlight<Fingerprint, Arc<Value>>,
    counters: Counters,
}

/// GitHub API client with caching, rate limiting, retries, request
/// deduplication, and token rotation.
///
/// Cloning is cheap and clones share all state.
///
/// # Security
///
/// Tokens are stored using [`SecretString`] and never appear in debug
/// output or logs.
///
/// # Examples
///
/// ```no_run
/// use hubkit_config::Config;
/// use hubkit_github::GitHubClient;
///
/// # async fn example() -> hubkit_github::Result<()> {
/// let client = GitHubClient::new(&Config::default())?;
///
/// let repo = client.get_repository("rust-lang", "rust").await?;
/// println!("{} has {} stars", repo.full_name, repo.stargazers_count);
///
/// // Served from the cache.
/// let again = client.get_repository("rust-lang", "rust").await?;
/// assert_eq!(repo.id, again.id);
/// assert_eq!(client.stats().cache_hits, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct GitHubClient {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("base_url", &self.inner.base_url)
            .field("tokens", &self.inner.tokens)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// Builds a [`GitHubClient`], optionally with an injected transport or
/// token minter.
pub struct ClientBuilder {
    config: Config,
    transport: Option<Arc<dyn Transport>>,
    minter: Option<Arc<dyn TokenMinter>>,
}

impl ClientBuilder {
    /// Starts from `config`.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            transport: None,
            minter: None,
        }
    }

    /// Sends requests through `transport` instead of the default HTTP
    /// client.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Mints installation tokens with `minter` instead of signing app JWTs.
    ///
    /// Only used when the configuration names app credentials.
    #[must_use]
    pub fn minter(mut self, minter: Arc<dyn TokenMinter>) -> Self {
        self.minter = Some(minter);
        self
    }

    /// Validates the configuration and builds the client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValidationFailed`] for invalid configuration, or
    /// [`Error::AuthenticationFailed`] if app credentials cannot be loaded.
    #[instrument(skip(self), fields(base_url = %self.config.base_url))]
    pub fn build(self) -> Result<GitHubClient> {
        let config = self.config;
        config.validate()?;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(&config.user_agent, config.timeout())?),
        };
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let tokens = TokenManager::from_config(
            config.token.as_ref(),
            &base_url,
            Arc::clone(&transport),
            self.minter,
        )?
        .with_mint_timeout(config.timeout());
        debug!(authenticated = tokens.is_authenticated(), "creating GitHub client");

        Ok(GitHubClient {
            inner: Arc::new(ClientInner {
                base_url,
                timeout: config.timeout(),
                cache_ttl: config.cache.max_age(),
                transport,
                cache: ResponseCache::new(config.cache.max_size),
                limits: RateLimitTracker::new(),
                retry: RetryPolicy::from_config(&config.retry),
                rate_limit: config.rate_limit,
                tokens,
                flights: SingleFlight::new(),
                counters: Counters::default(),
            }),
        })
    }
}

impl GitHubClient {
    /// Creates a client from validated configuration.
    ///
    /// # Errors
    ///
    /// See [`ClientBuilder::build`].
    pub fn new(config: &Config) -> Result<Self> {
        ClientBuilder::new(config.clone()).build()
    }

    /// Returns a builder for a client with injected collaborators.
    #[must_use]
    pub fn builder(config: Config) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    /// Returns whether requests carry a credential.
    ///
    /// Authenticated clients have access to:
    /// - Higher rate limits (5,000 requests/hour vs 60 requests/hour)
    /// - Private repositories (if the token has appropriate scopes)
    ///
    /// This does not verify the credential. Use
    /// [`current_user`](Self::current_user) for that.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.tokens.is_authenticated()
    }

    /// Returns the token manager.
    #[must_use]
    pub fn tokens(&self) -> &TokenManager {
        &self.inner.tokens
    }

    /// Returns a snapshot of the client counters.
    #[must_use]
    pub fn stats(&self) -> ClientStats {
        let cache = self.inner.cache.stats();
        let counters = &self.inner.counters;
        ClientStats {
            cache_hits: cache.hits,
            cache_misses: cache.misses,
            cache_size: cache.size,
            network_calls: counters.network_calls.load(Ordering::Relaxed),
            retries: counters.retries.load(Ordering::Relaxed),
            deduplicated: counters.deduplicated.load(Ordering::Relaxed),
        }
    }

    /// Returns the recorded primary quota of `resource`.
    #[must_use]
    pub fn rate_limit(&self, resource: Resource) -> Option<RateLimitState> {
        self.inner.limits.snapshot(resource)
    }

    /// Drops every cached response.
    pub fn clear_cache(&self) {
        self.inner.cache.clear();
    }

    /// Executes `request` and decodes the payload as `T`.
    ///
    /// This is the entry point the typed calls are built on; it can also be
    /// used directly for endpoints they do not cover.
    ///
    /// # Errors
    ///
    /// Returns a typed [`Error`] when the call fails after retries, or
    /// [`Error::ValidationFailed`] when the payload does not match `T`.
    #[instrument(skip(self, request), fields(operation = %request.operation()))]
    pub async fn execute<T: DeserializeOwned>(&self, request: Request) -> Result<T> {
        let value = self.fetch(request, validate_as::<T>).await?;
        decode(&value)
    }

    /// Validates the current credential by fetching the authenticated user.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AuthenticationFailed`] if the token is rejected, or
    /// when the client has no credential.
    #[instrument(skip(self))]
    pub async fn current_user(&self) -> Result<User> {
        if !self.is_authenticated() {
            return Err(Error::AuthenticationFailed {
                reason: "client has no credential".to_string(),
            });
        }
        let user: User = self
            .execute(Request::get("users.current", "/user").no_cache())
            .await?;
        debug!(login = %user.login, "token validated successfully");
        Ok(user)
    }

    /// Fetches the quota of every resource class and seeds the rate-limit
    /// tracker with it.
    ///
    /// This endpoint does not count against the core quota.
    ///
    /// # Errors
    ///
    /// Returns a typed [`Error`] if the call fails.
    #[instrument(skip(self))]
    pub async fn fetch_rate_limits(&self) -> Result<RateLimitOverview> {
        let overview: RateLimitOverview = self
            .execute(Request::get("rate_limit.get", "/rate_limit").no_cache())
            .await?;
        self.inner.limits.record_overview(&overview);
        Ok(overview)
    }

    /// Runs a GraphQL query and decodes its `data` as `T`.
    ///
    /// Errors reported in the response body map onto the same [`Error`]
    /// kinds as REST failures.
    ///
    /// # Errors
    ///
    /// Returns a typed [`Error`] if the call fails or reports errors.
    pub async fn graphql<T: DeserializeOwned>(
        &self,
        operation_name: &str,
        query: &str,
        variables: Value,
    ) -> Result<T> {
        if query.trim().is_empty() {
            return Err(Error::invalid_input("query", "must not be empty"));
        }
        self.execute(Request::graphql(operation_name, query, variables))
            .await
    }

    async fn fetch(&self, request: Request, validate: Validator) -> Result<Arc<Value>> {
        if !request.is_idempotent() {
            return self.inner.dispatch(&request, None, None, validate).await;
        }

        let key = request.fingerprint();
        let stale = match self.inner.cache.lookup(&key) {
            Lookup::Fresh(value) => return Ok(value),
            Lookup::Stale { value, etag } => Some(Stale { value, etag }),
            Lookup::Miss => None,
        };

        let inner = Arc::clone(&self.inner);
        let flight_key = key.clone();
        let (outcome, role) = self
            .inner
            .flights
            .run(key, move || async move {
                // A call that settled between our lookup and now may have
                // filled the cache already.
                if let Some(value) = inner.cache.peek_fresh(&flight_key) {
                    return Ok(value);
                }
                inner
                    .dispatch(&request, Some(&flight_key), stale, validate)
                    .await
            })
            .await;

        if role == Role::Joined {
            self.inner
                .counters
                .deduplicated
                .fetch_add(1, Ordering::Relaxed);
            debug!("joined in-flight request");
        }
        outcome
    }
}

impl ClientInner {
    /// The retry loop around single attempts.
    async fn dispatch(
        &self,
        request: &Request,
        key: Option<&Fingerprint>,
        stale: Option<Stale>,
        validate: Validator,
    ) -> Result<Arc<Value>> {
        let mut attempt = 0;
        let mut refreshed = false;

        loop {
            self.acquire(request.rate_limit_resource()).await?;
            attempt += 1;

            let (outcome, sent) = self.attempt(request, key, stale.as_ref(), validate).await;
            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            // Only a token GitHub actually rejected is worth refreshing.
            let rejected =
                sent.filter(|_| !refreshed && err.kind() == ErrorKind::AuthenticationFailed);
            if rejected.is_some_and(|token| self.tokens.invalidate(&token)) {
                warn!(error = %err, "credential rejected, forcing token refresh");
                refreshed = true;
                // The forced refresh is not a retry.
                attempt -= 1;
                continue;
            }

            if let Some(wait) = err.retry_after() {
                if !self.rate_limit.permits_wait(wait) {
                    debug!(wait_ms = wait.as_millis() as u64, "rate limited, failing fast");
                    return Err(err);
                }
            }

            match self.retry.decide(attempt, &err, request.is_idempotent()) {
                RetryDecision::Retry { delay } => {
                    self.counters.retries.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying request"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp => {
                    debug!(attempt, error = %err, "giving up");
                    return Err(err);
                }
            }
        }
    }

    /// Waits until the tracker admits a call against `resource`, or fails
    /// when the policy does not allow waiting that long.
    async fn acquire(&self, resource: Resource) -> Result<()> {
        loop {
            let permit = match self.limits.try_acquire(resource) {
                Ok(()) => return Ok(()),
                Err(permit) => permit,
            };
            let scope = permit.scope.unwrap_or(LimitScope::Primary(resource));
            if !self.rate_limit.permits_wait(permit.wait) {
                return Err(Error::RateLimited {
                    scope,
                    reset_at: permit.reset_at,
                    retry_after: Some(permit.wait),
                });
            }
            debug!(
                %scope,
                wait_ms = permit.wait.as_millis() as u64,
                "waiting for rate limit"
            );
            tokio::time::sleep(permit.wait).await;
        }
    }

    /// One network attempt.
    ///
    /// Alongside the outcome, returns the token the request carried once a
    /// response came back for it. Failures before that return `None`.
    async fn attempt(
        &self,
        request: &Request,
        key: Option<&Fingerprint>,
        stale: Option<&Stale>,
        validate: Validator,
    ) -> (Result<Arc<Value>>, Option<SecretString>) {
        let token = match self.tokens.token().await {
            Ok(token) => token,
            Err(err) => return (Err(err), None),
        };
        let http =
            match self.http_request(request, token.as_ref(), stale.map(|s| s.etag.as_str())) {
                Ok(http) => http,
                Err(err) => return (Err(err), None),
            };

        self.counters.network_calls.fetch_add(1, Ordering::Relaxed);
        let response = match tokio::time::timeout(self.timeout, self.transport.send(http)).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => return (Err(err), None),
            Err(_) => {
                let err = Error::Network {
                    message: format!("request timed out after {}ms", self.timeout.as_millis()),
                    timed_out: true,
                };
                return (Err(err), None);
            }
        };

        let outcome = self.settle(request, key, stale, validate, response);
        (outcome, token)
    }

    /// Turns a response into the payload, updating the rate-limit state and
    /// the cache.
    fn settle(
        &self,
        request: &Request,
        key: Option<&Fingerprint>,
        stale: Option<&Stale>,
        validate: Validator,
        response: HttpResponse,
    ) -> Result<Arc<Value>> {
        self.limits
            .record_headers(request.rate_limit_resource(), &response.headers);
        let ttl = request.cache_ttl().unwrap_or(self.cache_ttl);
        let etag = header_string(&response, ETAG.as_str());

        if response.status == StatusCode::NOT_MODIFIED {
            let (Some(key), Some(stale)) = (key, stale) else {
                return Err(Error::validation(
                    "response",
                    "unexpected 304 Not Modified without a cached entry",
                ));
            };
            debug!(fingerprint = %key, "not modified, cache entry revalidated");
            return Ok(match self.cache.revalidate(key, ttl, etag) {
                Some(value) => value,
                None => {
                    // Evicted while the request was out; the value is still good.
                    let value = Arc::clone(&stale.value);
                    self.cache.set_shared(
                        key.clone(),
                        Arc::clone(&value),
                        ttl,
                        Some(stale.etag.clone()),
                    );
                    value
                }
            });
        }

        if !response.status.is_success() {
            let err = classify_failure(&response, request.path(), request.rate_limit_resource());
            if let Error::RateLimited {
                scope: LimitScope::Secondary,
                retry_after: Some(wait),
                ..
            } = &err
            {
                self.limits.record_secondary(*wait);
            }
            return Err(err);
        }

        let mut value = parse_body(&response.body)?;
        if request.is_graphql() {
            value = graphql_data(value, &response.headers)?;
        }
        if let Err(err) = validate(&value) {
            warn!(error = %err, "response failed validation");
            return Err(err);
        }

        let value = Arc::new(value);
        if let Some(key) = key.filter(|_| request.is_cacheable()) {
            self.cache.set_shared(key.clone(), Arc::clone(&value), ttl, etag);
        }
        Ok(value)
    }

    fn http_request(
        &self,
        request: &Request,
        token: Option<&SecretString>,
        etag: Option<&str>,
    ) -> Result<HttpRequest> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_JSON));
        headers.insert(API_VERSION_HEADER, HeaderValue::from_static(API_VERSION));
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                .map_err(|_| Error::AuthenticationFailed {
                    reason: "token is not a valid header value".to_string(),
                })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        if let Some(etag) = etag {
            if let Ok(value) = HeaderValue::from_str(etag) {
                headers.insert(IF_NONE_MATCH, value);
            }
        }

        Ok(HttpRequest {
            method: request.method().clone(),
            url: format!("{}{}", self.base_url, request.path()),
            query: request.query_pairs().to_vec(),
            headers,
            body: request.body().cloned(),
        })
    }
}

fn header_string(response: &HttpResponse, name: &str) -> Option<String> {
    response.header(name).map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hubkit_config::TokenSourceConfig;

    #[test]
    fn new_unauthenticated_client() {
        let client = GitHubClient::new(&Config::default()).unwrap();
        assert!(!client.is_authenticated());
        assert_eq!(client.stats(), ClientStats::default());
    }

    #[test]
    fn new_authenticated_client() {
        let config = Config {
            token: Some(TokenSourceConfig::StaticToken(
                "fake_token_for_testing".to_string(),
            )),
            ..Config::default()
        };
        let client = GitHubClient::new(&config).unwrap();
        assert!(client.is_authenticated());
        assert!(!format!("{client:?}").contains("fake_token_for_testing"));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = Config::default();
        config.retry.max_attempts = 0;
        let err = GitHubClient::new(&config).unwrap_err();
        assert!(matches!(err, Error::ValidationFailed { .. }));
    }

    #[tokio::test]
    async fn current_user_requires_credential() {
        let client = GitHubClient::new(&Config::default()).unwrap();
        let err = client.current_user().await.unwrap_err();
        assert!(matches!(err, Error::AuthenticationFailed { .. }));
        assert_eq!(client.stats().network_calls, 0);
    }

    #[tokio::test]
    async fn empty_graphql_query_is_rejected() {
        let client = GitHubClient::new(&Config::default()).unwrap();
        let err = client
            .graphql::<Value>("Empty", "  ", Value::Null)
            .await
            .unwrap_err();
        assert_eq!(err, Error::invalid_input("query", "must not be empty"));
    }
}
