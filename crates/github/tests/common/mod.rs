//! Shared test doubles for the dispatcher tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use hubkit_config::{Config, RetryConfig};
use hubkit_github::{
    AccessToken, Error, GitHubClient, HttpRequest, HttpResponse, Result, TokenMinter, Transport,
};
use parking_lot::Mutex;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use secrecy::SecretString;
use serde_json::{Value, json};

type Responder = dyn Fn(&HttpRequest, usize) -> Result<HttpResponse> + Send + Sync;
type Latency = dyn Fn(&HttpRequest) -> Duration + Send + Sync;

/// A scripted [`Transport`].
///
/// The responder receives each request and its 0-based call index.
pub struct MockTransport {
    responder: Box<Responder>,
    calls: AtomicUsize,
    latency: Box<Latency>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new(
        responder: impl Fn(&HttpRequest, usize) -> Result<HttpResponse> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            calls: AtomicUsize::new(0),
            latency: Box::new(|_| Duration::ZERO),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answers every request with `status` and `body`.
    pub fn always(status: u16, body: Value) -> Self {
        Self::new(move |_, _| Ok(respond(status, body.clone())))
    }

    /// Delays every response by `latency` (virtual time under a paused
    /// clock).
    pub fn with_latency(self, latency: Duration) -> Self {
        self.with_latency_by(move |_| latency)
    }

    /// Delays each response by a per-request latency.
    pub fn with_latency_by(
        mut self,
        latency: impl Fn(&HttpRequest) -> Duration + Send + Sync + 'static,
    ) -> Self {
        self.latency = Box::new(latency);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());
        let latency = (self.latency)(&request);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        (self.responder)(&request, index)
    }
}

/// A JSON response.
pub fn respond(status: u16, body: Value) -> HttpResponse {
    HttpResponse {
        status: StatusCode::from_u16(status).unwrap(),
        headers: HeaderMap::new(),
        body: serde_json::to_vec(&body).unwrap(),
    }
}

/// Adds headers to a response.
pub fn with_headers(mut response: HttpResponse, headers: &[(&str, &str)]) -> HttpResponse {
    for (name, value) in headers {
        response.headers.insert(
            HeaderName::from_bytes(name.as_bytes()).unwrap(),
            HeaderValue::from_str(value).unwrap(),
        );
    }
    response
}

/// Rate-limit headers reporting `remaining` calls until `reset_in` from now.
pub fn quota_headers(
    response: HttpResponse,
    resource: &str,
    remaining: u32,
    reset_in: Duration,
) -> HttpResponse {
    let reset = (Utc::now() + chrono::Duration::from_std(reset_in).unwrap())
        .timestamp()
        .to_string();
    with_headers(
        response,
        &[
            ("x-ratelimit-limit", "5000"),
            ("x-ratelimit-remaining", &remaining.to_string()),
            ("x-ratelimit-reset", &reset),
            ("x-ratelimit-resource", resource),
        ],
    )
}

/// A configuration with fast, small retry delays.
pub fn test_config() -> Config {
    Config {
        retry: RetryConfig {
            max_attempts: 4,
            base_delay_ms: 100,
            max_delay_ms: 1_000,
        },
        ..Config::default()
    }
}

pub fn client(transport: &Arc<MockTransport>, config: Config) -> GitHubClient {
    GitHubClient::builder(config)
        .transport(Arc::clone(transport) as Arc<dyn Transport>)
        .build()
        .unwrap()
}

pub fn user_json(login: &str) -> Value {
    json!({
        "id": 1,
        "login": login,
        "type": "User",
        "html_url": format!("https://github.com/{login}"),
    })
}

pub fn repo_json(owner: &str, name: &str) -> Value {
    json!({
        "id": 1296269,
        "name": name,
        "full_name": format!("{owner}/{name}"),
        "owner": user_json(owner),
        "private": false,
        "html_url": format!("https://github.com/{owner}/{name}"),
        "description": "This your first repo!",
        "default_branch": "main",
        "stargazers_count": 80,
        "forks_count": 9,
        "open_issues_count": 0,
        "topics": ["octocat"],
    })
}

pub fn issue_json(number: u64, pull_request: bool) -> Value {
    let mut issue = json!({
        "id": 1000 + number,
        "number": number,
        "title": format!("Issue {number}"),
        "body": null,
        "state": "open",
        "user": user_json("octocat"),
        "labels": [{"name": "bug", "color": "d73a4a"}],
        "comments": 2,
        "html_url": format!("https://github.com/octo/demo/issues/{number}"),
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-02T00:00:00Z",
    });
    if pull_request {
        issue["pull_request"] = json!({"url": "https://api.github.com/repos/octo/demo/pulls/1"});
    }
    issue
}

/// A minter handing out numbered tokens that expire after `lifetime`.
pub struct CountingMinter {
    mints: AtomicUsize,
    lifetime: chrono::Duration,
    latency: Duration,
}

impl CountingMinter {
    pub fn new(lifetime: chrono::Duration, latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            mints: AtomicUsize::new(0),
            lifetime,
            latency,
        })
    }

    pub fn mints(&self) -> usize {
        self.mints.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenMinter for CountingMinter {
    async fn mint(&self) -> Result<AccessToken> {
        let n = self.mints.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.latency).await;
        Ok(AccessToken::new(
            SecretString::from(format!("ghs_token_{n}")),
            Some(Utc::now() + self.lifetime),
        ))
    }
}

/// A minter whose every mint is rejected by GitHub.
pub struct RejectedMinter {
    mints: AtomicUsize,
}

impl RejectedMinter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            mints: AtomicUsize::new(0),
        })
    }

    pub fn mints(&self) -> usize {
        self.mints.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenMinter for RejectedMinter {
    async fn mint(&self) -> Result<AccessToken> {
        self.mints.fetch_add(1, Ordering::SeqCst);
        Err(Error::AuthenticationFailed {
            reason: "A JSON web token could not be decoded".into(),
        })
    }
}

/// Returns the bearer token a request carried.
pub fn bearer(request: &HttpRequest) -> Option<String> {
    request
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_owned)
}

/// Shorthand for asserting a typed error kind.
pub fn kind_of<T: std::fmt::Debug>(result: &std::result::Result<T, Error>) -> hubkit_github::ErrorKind {
    result.as_ref().unwrap_err().kind()
}
