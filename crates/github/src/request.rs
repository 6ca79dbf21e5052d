//! Logical API requests.
//!
//! A [`Request`] describes one call independent of credentials and
//! conditional headers: the dispatcher adds those per attempt. Its
//! [`fingerprint`](Request::fingerprint) is what the cache and the
//! in-flight map are keyed on.

use std::time::Duration;

use reqwest::Method;
use serde_json::{Value, json};

use crate::fingerprint::Fingerprint;
use crate::rate_limit::Resource;

/// One logical API call.
///
/// # Examples
///
/// ```
/// use hubkit_github::{Request, Resource};
///
/// let request = Request::get("search.repositories", "/search/repositories")
///     .resource(Resource::Search)
///     .query("q", "tokio")
///     .query("per_page", 10);
///
/// assert!(request.is_idempotent());
/// assert!(request.fingerprint().as_str().starts_with("GET search.repositories:"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: Method,
    operation: String,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
    resource: Resource,
    idempotent: bool,
    cacheable: bool,
    ttl: Option<Duration>,
}

impl Request {
    fn new(method: Method, operation: impl Into<String>, path: impl Into<String>) -> Self {
        let idempotent = matches!(method, Method::GET | Method::HEAD);
        Self {
            method,
            operation: operation.into(),
            path: path.into(),
            query: Vec::new(),
            body: None,
            resource: Resource::Core,
            idempotent,
            cacheable: idempotent,
            ttl: None,
        }
    }

    /// A `GET` request against `path` (relative to the base URL).
    #[must_use]
    pub fn get(operation: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(Method::GET, operation, path)
    }

    /// A `POST` request with a JSON body.
    ///
    /// Not idempotent unless marked with [`idempotent`](Self::idempotent),
    /// so it is neither retried, cached, nor deduplicated by default.
    #[must_use]
    pub fn post(operation: impl Into<String>, path: impl Into<String>, body: Value) -> Self {
        let mut request = Self::new(Method::POST, operation, path);
        request.body = Some(body);
        request
    }

    /// A GraphQL query against `/graphql`, charged to the `graphql` class.
    ///
    /// Queries are reads, so they are treated as idempotent.
    #[must_use]
    pub fn graphql(operation_name: impl Into<String>, query: &str, variables: Value) -> Self {
        let body = json!({ "query": query, "variables": variables });
        Self::post(operation_name, "/graphql", body)
            .resource(Resource::GraphQl)
            .idempotent(true)
    }

    /// Appends a query parameter.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Sets the rate-limit class this call is charged to.
    #[must_use]
    pub fn resource(mut self, resource: Resource) -> Self {
        self.resource = resource;
        self
    }

    /// Marks the call as safe to repeat. Idempotent calls may be retried,
    /// deduplicated, and cached.
    #[must_use]
    pub fn idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = idempotent;
        self.cacheable = idempotent;
        self
    }

    /// Keeps the response out of the cache. Concurrent identical calls are
    /// still deduplicated.
    #[must_use]
    pub fn no_cache(mut self) -> Self {
        self.cacheable = false;
        self
    }

    /// Overrides the cache time-to-live for this call.
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// The HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The logical operation name.
    #[must_use]
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// The path relative to the base URL.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The query parameters, in insertion order.
    #[must_use]
    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    /// The JSON body, if any.
    #[must_use]
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// The rate-limit class.
    #[must_use]
    pub fn rate_limit_resource(&self) -> Resource {
        self.resource
    }

    /// Whether the call may be repeated.
    #[must_use]
    pub fn is_idempotent(&self) -> bool {
        self.idempotent
    }

    /// Whether a successful response is stored in the cache.
    #[must_use]
    pub fn is_cacheable(&self) -> bool {
        self.cacheable
    }

    /// The cache time-to-live override, if any.
    #[must_use]
    pub fn cache_ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Whether this call goes to the GraphQL endpoint.
    #[must_use]
    pub fn is_graphql(&self) -> bool {
        self.resource == Resource::GraphQl && self.path == "/graphql"
    }

    /// The canonical identity of this call.
    ///
    /// The order of distinct query keys does not matter. Every value of a
    /// repeated key counts, in the order it was added, since all of them are
    /// sent.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        let mut pairs: Vec<&(String, String)> = self.query.iter().collect();
        // Stable, so values of one key keep their relative order.
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        let query: Vec<Value> = pairs.into_iter().map(|(k, v)| json!([k, v])).collect();
        let params = json!({
            "path": self.path,
            "query": query,
            "body": self.body,
        });
        Fingerprint::compute(&self.method, &self.operation, &params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_is_idempotent_and_cacheable() {
        let request = Request::get("repos.get", "/repos/octo/demo");
        assert!(request.is_idempotent());
        assert!(request.is_cacheable());
        assert_eq!(request.rate_limit_resource(), Resource::Core);
    }

    #[test]
    fn post_is_not_idempotent_by_default() {
        let request = Request::post("issues.create", "/repos/octo/demo/issues", json!({}));
        assert!(!request.is_idempotent());
        assert!(!request.is_cacheable());
    }

    #[test]
    fn graphql_is_a_cacheable_read() {
        let request = Request::graphql("Viewer", "query { viewer { login } }", json!({}));
        assert!(request.is_graphql());
        assert!(request.is_idempotent());
        assert!(request.is_cacheable());
        assert_eq!(request.method(), &Method::POST);
        assert_eq!(request.rate_limit_resource(), Resource::GraphQl);
    }

    #[test]
    fn query_order_does_not_change_fingerprint() {
        let a = Request::get("issues.list", "/repos/o/r/issues")
            .query("state", "open")
            .query("per_page", 30);
        let b = Request::get("issues.list", "/repos/o/r/issues")
            .query("per_page", 30)
            .query("state", "open");
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn repeated_query_keys_keep_every_value() {
        let both = Request::get("search.code", "/search/code")
            .query("k", 1)
            .query("k", 2);
        let last = Request::get("search.code", "/search/code").query("k", 2);
        let swapped = Request::get("search.code", "/search/code")
            .query("k", 2)
            .query("k", 1);
        assert_ne!(both.fingerprint(), last.fingerprint());
        assert_ne!(both.fingerprint(), swapped.fingerprint());
    }

    #[test]
    fn repeated_keys_interleaved_with_others_are_stable() {
        let a = Request::get("search.code", "/search/code")
            .query("k", 1)
            .query("q", "x")
            .query("k", 2);
        let b = Request::get("search.code", "/search/code")
            .query("q", "x")
            .query("k", 1)
            .query("k", 2);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn different_paths_differ() {
        let a = Request::get("repos.get", "/repos/octo/a");
        let b = Request::get("repos.get", "/repos/octo/b");
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn graphql_variables_participate() {
        let query = "query($n: Int!) { viewer { login } }";
        let a = Request::graphql("Q", query, json!({"n": 1}));
        let b = Request::graphql("Q", query, json!({"n": 2}));
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn no_cache_keeps_dedup() {
        let request = Request::get("rate_limit", "/rate_limit").no_cache();
        assert!(request.is_idempotent());
        assert!(!request.is_cacheable());
    }
}
