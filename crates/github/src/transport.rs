//! The HTTP seam.
//!
//! The dispatcher talks to GitHub through the [`Transport`] trait so that
//! tests can script responses without a network. [`ReqwestTransport`] is
//! the production implementation.
//!
//! A transport performs exactly one exchange: no retries, no caching, no
//! status interpretation. Any response the server produced, 4xx and 5xx
//! included, is returned as `Ok`; only failures to obtain a response become
//! [`Error::Network`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::{instrument, trace};

use crate::error::{Error, Result};

/// One outgoing HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// The HTTP method.
    pub method: Method,
    /// The absolute URL, without query string.
    pub url: String,
    /// Query parameters, in order.
    pub query: Vec<(String, String)>,
    /// Request headers.
    pub headers: HeaderMap,
    /// JSON body, if any.
    pub body: Option<Value>,
}

/// One HTTP response, fully buffered.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// The status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// The raw body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Returns a header value as a string, if present and valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Sends HTTP requests.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs one request/response exchange.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// [`Transport`] backed by a pooled [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport sending `user_agent` on every request.
    ///
    /// `timeout` bounds connection setup; the per-call deadline is enforced
    /// by the dispatcher.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValidationFailed`] if the user agent is not a valid
    /// header value, or [`Error::Network`] if the TLS backend fails to
    /// initialize.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let agent = HeaderValue::from_str(user_agent)
            .map_err(|_| Error::invalid_input("user_agent", "not a valid header value"))?;
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, agent);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| Error::network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[instrument(skip_all, fields(method = %request.method, url = %request.url))]
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(network_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(network_error)?.to_vec();
        trace!(%status, bytes = body.len(), "received response");

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn network_error(err: reqwest::Error) -> Error {
    Error::Network {
        timed_out: err.is_timeout(),
        message: err.to_string(),
    }
}
