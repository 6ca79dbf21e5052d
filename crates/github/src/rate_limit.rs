//! Rate-limit accounting.
//!
//! GitHub enforces two independent regimes:
//!
//! - **Primary limits**: an hourly quota per resource class (`core`,
//!   `search`, `graphql`), reported on every response through the
//!   `x-ratelimit-*` headers.
//! - **Secondary limits**: short-window abuse protection, signalled by a
//!   403/429 response, usually with a `retry-after` header.
//!
//! The [`RateLimitTracker`] records both and answers whether a call may be
//! sent now and, if not, how long to wait. A secondary limit always imposes
//! its wait, whatever the primary quota says; when both apply, the longer
//! wait wins.
//!
//! Each dispatched call reserves one unit of the remaining quota, so that
//! concurrent callers cannot all pass the gate before the first response
//! updates the counters. A fresh header read overrides the reservation.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::Deserialize;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::LimitScope;

/// Waiting until the reported reset second has fully elapsed.
pub const RESET_GRACE: Duration = Duration::from_secs(1);

/// Wait imposed by a secondary limit that does not say how long to wait.
pub const DEFAULT_SECONDARY_WAIT: Duration = Duration::from_secs(60);

const HEADER_LIMIT: &str = "x-ratelimit-limit";
const HEADER_REMAINING: &str = "x-ratelimit-remaining";
const HEADER_RESET: &str = "x-ratelimit-reset";
const HEADER_RESOURCE: &str = "x-ratelimit-resource";

/// A rate-limited resource class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    /// Most REST endpoints.
    Core,
    /// The search API.
    Search,
    /// The GraphQL endpoint.
    GraphQl,
}

impl Resource {
    /// Returns the name GitHub uses for this class.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Search => "search",
            Self::GraphQl => "graphql",
        }
    }

    /// Parses the `x-ratelimit-resource` header value.
    ///
    /// Classes the client does not track separately return `None`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "core" => Some(Self::Core),
            "search" => Some(Self::Search),
            "graphql" => Some(Self::GraphQl),
            _ => None,
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Primary quota state of one resource class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitState {
    /// Requests allowed per window.
    pub limit: u32,
    /// Requests left in the current window.
    pub remaining: u32,
    /// When the window resets, as reported by GitHub.
    pub reset_at: DateTime<Utc>,
    /// The reset moment on the local monotonic clock, grace included.
    pub reset_instant: Instant,
    /// When this state was last corrected from headers.
    pub last_updated: Instant,
}

impl RateLimitState {
    fn is_exhausted_at(&self, now: Instant) -> bool {
        self.remaining == 0 && now < self.reset_instant
    }
}

/// The answer to "may a call be sent now?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permit {
    /// Whether the call may be sent immediately.
    pub allowed: bool,
    /// How long to wait before it may be sent.
    pub wait: Duration,
    /// The regime imposing the wait, if any.
    pub scope: Option<LimitScope>,
    /// The primary window reset, when the primary limit is the cause.
    pub reset_at: Option<DateTime<Utc>>,
}

impl Permit {
    fn granted() -> Self {
        Self {
            allowed: true,
            wait: Duration::ZERO,
            scope: None,
            reset_at: None,
        }
    }
}

/// Primary limit values read from response headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderLimits {
    /// The class named by `x-ratelimit-resource`, if recognized.
    pub resource: Option<Resource>,
    /// `x-ratelimit-limit`.
    pub limit: u32,
    /// `x-ratelimit-remaining`.
    pub remaining: u32,
    /// `x-ratelimit-reset`.
    pub reset_at: DateTime<Utc>,
}

impl HeaderLimits {
    /// Parses the `x-ratelimit-*` headers. Returns `None` when any of
    /// limit, remaining, or reset is missing or malformed.
    #[must_use]
    pub fn parse(headers: &HeaderMap) -> Option<Self> {
        let limit = header_str(headers, HEADER_LIMIT)?.parse().ok()?;
        let remaining = header_str(headers, HEADER_REMAINING)?.parse().ok()?;
        let reset_secs: i64 = header_str(headers, HEADER_RESET)?.parse().ok()?;
        let reset_at = DateTime::from_timestamp(reset_secs, 0)?;
        let resource = header_str(headers, HEADER_RESOURCE).and_then(Resource::from_name);
        Some(Self {
            resource,
            limit,
            remaining,
            reset_at,
        })
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}

/// Parses a `retry-after` header given in seconds or as an HTTP date.
#[must_use]
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = DateTime::parse_from_rfc2822(raw).ok()?.with_timezone(&Utc);
    Some((at - Utc::now()).to_std().unwrap_or(Duration::ZERO))
}

/// One entry of the `GET /rate_limit` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, serde::Serialize)]
pub struct ResourceQuota {
    /// Requests allowed per window.
    pub limit: u32,
    /// Requests left.
    pub remaining: u32,
    /// Reset time in epoch seconds.
    pub reset: i64,
    /// Requests used.
    #[serde(default)]
    pub used: u32,
}

/// The `GET /rate_limit` response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, serde::Serialize)]
pub struct RateLimitOverview {
    /// Quota per resource class name.
    pub resources: HashMap<String, ResourceQuota>,
}

#[derive(Debug, Default)]
struct TrackerState {
    primary: HashMap<Resource, RateLimitState>,
    secondary_until: Option<Instant>,
}

/// Tracks primary and secondary rate-limit state for one client.
#[derive(Debug, Default)]
pub struct RateLimitTracker {
    state: Mutex<TrackerState>,
}

impl RateLimitTracker {
    /// Creates a tracker with no recorded state (every call allowed).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records primary quota values for `resource`.
    pub fn record_response(
        &self,
        resource: Resource,
        limit: u32,
        remaining: u32,
        reset_at: DateTime<Utc>,
    ) {
        let now = Instant::now();
        let until_reset = (reset_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        let state = RateLimitState {
            limit,
            remaining,
            reset_at,
            reset_instant: now + until_reset + RESET_GRACE,
            last_updated: now,
        };
        if remaining == 0 {
            warn!(%resource, %reset_at, "primary rate limit exhausted");
        } else {
            debug!(%resource, remaining, limit, "rate limit updated");
        }
        self.state.lock().primary.insert(resource, state);
    }

    /// Records the `x-ratelimit-*` headers of a response.
    ///
    /// The class named by the headers wins over `fallback`. Returns the
    /// class that was updated, if the headers were present.
    pub fn record_headers(&self, fallback: Resource, headers: &HeaderMap) -> Option<Resource> {
        let limits = HeaderLimits::parse(headers)?;
        let resource = limits.resource.unwrap_or(fallback);
        self.record_response(resource, limits.limit, limits.remaining, limits.reset_at);
        Some(resource)
    }

    /// Records a secondary limit: nothing may be sent for `wait`.
    pub fn record_secondary(&self, wait: Duration) {
        let until = Instant::now() + wait;
        let mut state = self.state.lock();
        let extended = state.secondary_until.is_none_or(|current| current < until);
        if extended {
            state.secondary_until = Some(until);
        }
        warn!(wait_secs = wait.as_secs(), "secondary rate limit recorded");
    }

    /// Seeds every known class from a `GET /rate_limit` response.
    pub fn record_overview(&self, overview: &RateLimitOverview) {
        for (name, quota) in &overview.resources {
            let Some(resource) = Resource::from_name(name) else {
                continue;
            };
            if let Some(reset_at) = DateTime::from_timestamp(quota.reset, 0) {
                self.record_response(resource, quota.limit, quota.remaining, reset_at);
            }
        }
    }

    /// Returns whether a call against `resource` may be sent now.
    #[must_use]
    pub fn can_proceed(&self, resource: Resource) -> Permit {
        let now = Instant::now();
        let mut state = self.state.lock();
        Self::evaluate(&mut state, resource, now)
    }

    /// Like [`can_proceed`](Self::can_proceed), but also reserves one unit
    /// of quota when the call is allowed.
    ///
    /// # Errors
    ///
    /// Returns the refusing [`Permit`] when the call must wait.
    pub fn try_acquire(&self, resource: Resource) -> Result<(), Permit> {
        let now = Instant::now();
        let mut state = self.state.lock();
        let permit = Self::evaluate(&mut state, resource, now);
        if !permit.allowed {
            return Err(permit);
        }
        if let Some(primary) = state.primary.get_mut(&resource) {
            primary.remaining = primary.remaining.saturating_sub(1);
        }
        Ok(())
    }

    /// Returns the recorded primary state of `resource`.
    #[must_use]
    pub fn snapshot(&self, resource: Resource) -> Option<RateLimitState> {
        self.state.lock().primary.get(&resource).copied()
    }

    fn evaluate(state: &mut TrackerState, resource: Resource, now: Instant) -> Permit {
        if state.secondary_until.is_some_and(|until| now >= until) {
            state.secondary_until = None;
        }

        if let Some(primary) = state.primary.get_mut(&resource) {
            if now >= primary.reset_instant && primary.remaining < primary.limit {
                // The window rolled over; assume a full quota until headers say otherwise.
                primary.remaining = primary.limit;
            }
        }

        let secondary_wait = state
            .secondary_until
            .map(|until| until.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO);

        let primary = state
            .primary
            .get(&resource)
            .filter(|primary| primary.is_exhausted_at(now));
        let primary_wait = primary
            .map(|primary| primary.reset_instant.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO);

        if secondary_wait.is_zero() && primary_wait.is_zero() {
            return Permit::granted();
        }

        if secondary_wait >= primary_wait {
            Permit {
                allowed: false,
                wait: secondary_wait,
                scope: Some(LimitScope::Secondary),
                reset_at: None,
            }
        } else {
            Permit {
                allowed: false,
                wait: primary_wait,
                scope: Some(LimitScope::Primary(resource)),
                reset_at: primary.map(|p| p.reset_at),
            }
        }
    }
}
