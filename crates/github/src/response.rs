//! Turning HTTP responses into payloads or typed errors.
//!
//! Status classification, REST error bodies, and GraphQL `errors` arrays all
//! land on the same [`Error`] variants, so callers never need to know which
//! protocol produced a failure.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, LimitScope, Result};
use crate::rate_limit::{DEFAULT_SECONDARY_WAIT, HeaderLimits, RESET_GRACE, Resource, parse_retry_after};
use crate::transport::HttpResponse;

/// Extracts the `message` of a GitHub error body, falling back to the
/// status reason.
fn error_message(response: &HttpResponse) -> String {
    serde_json::from_slice::<Value>(&response.body)
        .ok()
        .and_then(|body| body.get("message").and_then(Value::as_str).map(str::to_owned))
        .unwrap_or_else(|| {
            response
                .status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        })
}

fn is_secondary_message(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("secondary rate limit") || message.contains("abuse")
}

fn until(reset_at: DateTime<Utc>) -> Duration {
    (reset_at - Utc::now()).to_std().unwrap_or(Duration::ZERO) + RESET_GRACE
}

/// Classifies a non-success response.
///
/// `what` names the requested resource for [`Error::NotFound`]; `fallback`
/// is the rate-limit class charged when the headers do not name one.
pub(crate) fn classify_failure(response: &HttpResponse, what: &str, fallback: Resource) -> Error {
    let status = response.status;
    let message = error_message(response);

    match status {
        StatusCode::UNAUTHORIZED => Error::AuthenticationFailed { reason: message },
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
            rate_limit_failure(status, &response.headers, &message, fallback)
                .unwrap_or(Error::AuthenticationFailed { reason: message })
        }
        StatusCode::NOT_FOUND | StatusCode::GONE => Error::NotFound {
            resource: what.to_string(),
        },
        s if s.is_server_error() => Error::ServerError {
            status: s.as_u16(),
            message,
        },
        s if s.is_client_error() => Error::validation("request", message),
        s => Error::validation("response", format!("unexpected status {s}")),
    }
}

/// Recognizes the rate-limit flavors of a 403/429 response.
fn rate_limit_failure(
    status: StatusCode,
    headers: &HeaderMap,
    message: &str,
    fallback: Resource,
) -> Option<Error> {
    if let Some(wait) = parse_retry_after(headers) {
        return Some(Error::RateLimited {
            scope: LimitScope::Secondary,
            reset_at: None,
            retry_after: Some(wait),
        });
    }

    if let Some(limits) = HeaderLimits::parse(headers).filter(|l| l.remaining == 0) {
        return Some(Error::RateLimited {
            scope: LimitScope::Primary(limits.resource.unwrap_or(fallback)),
            reset_at: Some(limits.reset_at),
            retry_after: Some(until(limits.reset_at)),
        });
    }

    if status == StatusCode::TOO_MANY_REQUESTS || is_secondary_message(message) {
        return Some(Error::RateLimited {
            scope: LimitScope::Secondary,
            reset_at: None,
            retry_after: Some(DEFAULT_SECONDARY_WAIT),
        });
    }

    None
}

/// Parses a success body. An empty body is `null`.
pub(crate) fn parse_body(body: &[u8]) -> Result<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|e| Error::validation("body", e.to_string()))
}

/// Unwraps a GraphQL envelope, mapping a top-level `errors` array onto the
/// error taxonomy.
pub(crate) fn graphql_data(mut envelope: Value, headers: &HeaderMap) -> Result<Value> {
    if let Some(first) = envelope
        .get("errors")
        .and_then(Value::as_array)
        .and_then(|errors| errors.first())
    {
        return Err(graphql_error(first, headers));
    }
    match envelope.get_mut("data") {
        Some(data) if !data.is_null() => Ok(data.take()),
        _ => Err(Error::validation("data", "GraphQL response carried no data")),
    }
}

fn graphql_error(error: &Value, headers: &HeaderMap) -> Error {
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("GraphQL error")
        .to_string();

    match error.get("type").and_then(Value::as_str) {
        Some("NOT_FOUND") => Error::NotFound { resource: message },
        Some("RATE_LIMITED") => {
            let reset_at = HeaderLimits::parse(headers).map(|l| l.reset_at);
            Error::RateLimited {
                scope: LimitScope::Primary(Resource::GraphQl),
                reset_at,
                retry_after: reset_at.map(until),
            }
        }
        _ => Error::validation(graphql_path(error), message),
    }
}

/// Joins a GraphQL error `path` (`["repository", "issues", 0]`) into
/// `repository.issues[0]`.
fn graphql_path(error: &Value) -> String {
    let Some(segments) = error.get("path").and_then(Value::as_array) else {
        return "errors[0]".to_string();
    };
    let mut path = String::new();
    for segment in segments {
        match segment {
            Value::Number(index) => path.push_str(&format!("[{index}]")),
            Value::String(field) => {
                if !path.is_empty() {
                    path.push('.');
                }
                path.push_str(field);
            }
            _ => {}
        }
    }
    if path.is_empty() {
        "errors[0]".to_string()
    } else {
        path
    }
}

/// Deserializes `value` as `T`, reporting the path of the first field that
/// does not fit.
pub(crate) fn decode<T: DeserializeOwned>(value: &Value) -> Result<T> {
    serde_path_to_error::deserialize(value).map_err(|err| {
        let path = err.path().to_string();
        Error::validation(path, err.into_inner().to_string())
    })
}

/// Checks that `value` decodes as `T` without keeping the result.
pub(crate) fn validate_as<T: DeserializeOwned>(value: &Value) -> Result<()> {
    decode::<T>(value).map(drop)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use serde::Deserialize;
    use serde_json::json;

    fn response(status: u16, headers: &[(&'static str, &str)], body: Value) -> HttpResponse {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        HttpResponse {
            status: StatusCode::from_u16(status).unwrap(),
            headers: map,
            body: serde_json::to_vec(&body).unwrap(),
        }
    }

    fn classify(status: u16, headers: &[(&'static str, &str)], body: Value) -> Error {
        classify_failure(&response(status, headers, body), "repos/octo/demo", Resource::Core)
    }

    #[test]
    fn not_found() {
        let err = classify(404, &[], json!({"message": "Not Found"}));
        assert_eq!(
            err,
            Error::NotFound {
                resource: "repos/octo/demo".into()
            }
        );
    }

    #[test]
    fn unauthorized_is_authentication_failure() {
        let err = classify(401, &[], json!({"message": "Bad credentials"}));
        assert_eq!(
            err,
            Error::AuthenticationFailed {
                reason: "Bad credentials".into()
            }
        );
    }

    #[test]
    fn forbidden_without_limit_signal_is_authentication_failure() {
        let err = classify(403, &[], json!({"message": "Resource not accessible by integration"}));
        assert!(matches!(err, Error::AuthenticationFailed { .. }));
    }

    #[test]
    fn retry_after_is_a_secondary_limit() {
        let err = classify(403, &[("retry-after", "30")], json!({"message": "slow down"}));
        assert_eq!(
            err,
            Error::RateLimited {
                scope: LimitScope::Secondary,
                reset_at: None,
                retry_after: Some(Duration::from_secs(30)),
            }
        );
    }

    #[test]
    fn exhausted_quota_is_a_primary_limit() {
        let reset = (Utc::now() + chrono::Duration::seconds(120)).timestamp().to_string();
        let err = classify(
            403,
            &[
                ("x-ratelimit-limit", "30"),
                ("x-ratelimit-remaining", "0"),
                ("x-ratelimit-reset", &reset),
                ("x-ratelimit-resource", "search"),
            ],
            json!({"message": "API rate limit exceeded"}),
        );
        let Error::RateLimited {
            scope,
            reset_at,
            retry_after,
        } = err
        else {
            panic!("expected rate limit, got {err:?}");
        };
        assert_eq!(scope, LimitScope::Primary(Resource::Search));
        assert!(reset_at.is_some());
        assert!(retry_after.unwrap() > Duration::from_secs(100));
    }

    #[test]
    fn secondary_message_without_retry_after_waits_a_minute() {
        let err = classify(
            403,
            &[],
            json!({"message": "You have exceeded a secondary rate limit."}),
        );
        assert_eq!(err.retry_after(), Some(DEFAULT_SECONDARY_WAIT));
    }

    #[test]
    fn bare_429_is_a_secondary_limit() {
        let err = classify(429, &[], json!({}));
        assert!(matches!(
            err,
            Error::RateLimited {
                scope: LimitScope::Secondary,
                ..
            }
        ));
    }

    #[test]
    fn server_and_client_errors() {
        assert!(matches!(
            classify(502, &[], json!({"message": "Bad Gateway"})),
            Error::ServerError { status: 502, .. }
        ));
        assert_eq!(
            classify(422, &[], json!({"message": "Validation Failed"})),
            Error::validation("request", "Validation Failed")
        );
    }

    #[test]
    fn non_json_error_body_uses_reason_phrase() {
        let mut resp = response(503, &[], json!(null));
        resp.body = b"<html>oops</html>".to_vec();
        let err = classify_failure(&resp, "x", Resource::Core);
        assert_eq!(
            err,
            Error::ServerError {
                status: 503,
                message: "Service Unavailable".into()
            }
        );
    }

    #[test]
    fn empty_body_is_null() {
        assert_eq!(parse_body(b"").unwrap(), Value::Null);
        assert!(parse_body(b"{not json").is_err());
    }

    #[test]
    fn graphql_data_is_unwrapped() {
        let data = graphql_data(json!({"data": {"viewer": {"login": "octo"}}}), &HeaderMap::new());
        assert_eq!(data.unwrap(), json!({"viewer": {"login": "octo"}}));
    }

    #[test]
    fn graphql_errors_share_the_taxonomy() {
        let not_found = graphql_data(
            json!({"data": null, "errors": [{"type": "NOT_FOUND", "message": "Could not resolve to a Repository"}]}),
            &HeaderMap::new(),
        )
        .unwrap_err();
        assert!(matches!(not_found, Error::NotFound { .. }));

        let limited = graphql_data(
            json!({"errors": [{"type": "RATE_LIMITED", "message": "API rate limit exceeded"}]}),
            &HeaderMap::new(),
        )
        .unwrap_err();
        assert!(matches!(
            limited,
            Error::RateLimited {
                scope: LimitScope::Primary(Resource::GraphQl),
                ..
            }
        ));

        let invalid = graphql_data(
            json!({"errors": [{"message": "Field 'nope' doesn't exist", "path": ["repository", "issues", 0, "nope"]}]}),
            &HeaderMap::new(),
        )
        .unwrap_err();
        assert_eq!(
            invalid,
            Error::validation("repository.issues[0].nope", "Field 'nope' doesn't exist")
        );
    }

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Repo {
        id: u64,
        owner: Owner,
    }

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Owner {
        login: String,
    }

    #[test]
    fn decode_reports_field_path() {
        let err = decode::<Repo>(&json!({"id": 1, "owner": {"login": 42}})).unwrap_err();
        let Error::ValidationFailed { path, .. } = err else {
            panic!("expected validation failure");
        };
        assert_eq!(path, "owner.login");
    }

    #[test]
    fn validate_as_accepts_matching_payload() {
        assert!(validate_as::<Repo>(&json!({"id": 1, "owner": {"login": "octo"}})).is_ok());
    }
}
