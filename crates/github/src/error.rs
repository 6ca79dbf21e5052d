//! Error types for GitHub API operations.
//!
//! Every failure the client can produce is folded into one closed set of
//! kinds, independent of whether the call went over REST or GraphQL. Callers
//! branch on [`Error::kind`] rather than on messages.
//!
//! [`Error`] is `Clone`: when concurrent callers share one in-flight request,
//! each of them receives its own copy of the same outcome.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::rate_limit::Resource;

/// Stable discriminant for [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The resource does not exist.
    NotFound,
    /// The credential was rejected.
    AuthenticationFailed,
    /// A primary or secondary rate limit was hit.
    RateLimited,
    /// Input or response data failed validation.
    ValidationFailed,
    /// The server answered with a 5xx status.
    ServerError,
    /// The transport failed (timeout, connection reset, DNS, ...).
    NetworkError,
}

impl ErrorKind {
    /// Returns whether errors of this kind are transient.
    #[must_use]
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::ServerError | Self::NetworkError
        )
    }
}

/// Which rate-limit regime produced a [`Error::RateLimited`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitScope {
    /// The hourly per-resource quota is exhausted.
    Primary(Resource),
    /// A short-window abuse limit was triggered.
    Secondary,
}

impl fmt::Display for LimitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary(resource) => write!(f, "primary, {resource}"),
            Self::Secondary => f.write_str("secondary"),
        }
    }
}

/// Where data that failed validation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOrigin {
    /// A caller-supplied parameter or configuration value.
    Input,
    /// A payload or status returned by GitHub.
    Response,
}

/// Errors that can occur during GitHub API operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The requested resource does not exist (or is hidden from the caller).
    #[error("not found: {resource}")]
    NotFound {
        /// What was requested.
        resource: String,
    },

    /// The credential was rejected, or could not be produced.
    #[error("authentication failed: {reason}")]
    AuthenticationFailed {
        /// A description of why authentication failed.
        reason: String,
    },

    /// Rate limit exceeded.
    #[error("rate limit exceeded ({scope}){}", format_wait(*.retry_after))]
    RateLimited {
        /// The regime that was hit.
        scope: LimitScope,
        /// When the primary window resets, if known.
        reset_at: Option<DateTime<Utc>>,
        /// How long to wait before trying again, if known.
        retry_after: Option<Duration>,
    },

    /// Data failed validation.
    ///
    /// Raised for malformed responses (with the offending field path) and
    /// for rejected input at the API boundary (with the parameter name).
    #[error("validation failed at `{path}`: {message}")]
    ValidationFailed {
        /// Path to the offending field or parameter.
        path: String,
        /// What was wrong with it.
        message: String,
        /// Whether the caller's input or GitHub's response was at fault.
        origin: ValidationOrigin,
    },

    /// The server failed to handle the request.
    #[error("server error (HTTP {status}): {message}")]
    ServerError {
        /// The HTTP status code.
        status: u16,
        /// The server's message, if any.
        message: String,
    },

    /// A transport-level failure.
    #[error("network error: {message}")]
    Network {
        /// A description of the failure.
        message: String,
        /// Whether the per-call timeout elapsed.
        timed_out: bool,
    },
}

/// Formats the wait time for the rate limit error message.
fn format_wait(retry_after: Option<Duration>) -> String {
    match retry_after {
        Some(duration) => format!(", retry in {} seconds", duration.as_secs()),
        None => String::new(),
    }
}

impl Error {
    /// Returns the stable discriminant of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AuthenticationFailed { .. } => ErrorKind::AuthenticationFailed,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::ValidationFailed { .. } => ErrorKind::ValidationFailed,
            Self::ServerError { .. } => ErrorKind::ServerError,
            Self::Network { .. } => ErrorKind::NetworkError,
        }
    }

    /// Returns the server-mandated wait for rate-limit errors.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Returns a message that is safe to show to end users.
    ///
    /// Internal detail (server messages, field paths) stays in the
    /// [`Display`](fmt::Display) output, which is meant for logs.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self.kind() {
            ErrorKind::NotFound => "The requested GitHub resource could not be found.",
            ErrorKind::AuthenticationFailed => {
                "GitHub rejected the configured credentials. Check the token and its permissions."
            }
            ErrorKind::RateLimited => {
                "GitHub's rate limit has been reached. Please try again in a few minutes."
            }
            ErrorKind::ValidationFailed => match self {
                Self::ValidationFailed {
                    origin: ValidationOrigin::Input,
                    ..
                } => "The request is invalid. Check the parameters and configuration.",
                _ => "GitHub returned data in an unexpected format.",
            },
            ErrorKind::ServerError => "GitHub is having trouble right now. Please try again later.",
            ErrorKind::NetworkError => "Could not reach GitHub. Check your network connection.",
        }
    }

    /// A response that failed validation.
    pub(crate) fn validation(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            path: path.into(),
            message: message.into(),
            origin: ValidationOrigin::Response,
        }
    }

    /// Caller input rejected before anything was sent.
    pub(crate) fn invalid_input(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            path: path.into(),
            message: message.into(),
            origin: ValidationOrigin::Input,
        }
    }

    pub(crate) fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            timed_out: false,
        }
    }
}

impl From<hubkit_config::ConfigError> for Error {
    fn from(err: hubkit_config::ConfigError) -> Self {
        match err {
            hubkit_config::ConfigError::InvalidValue { field, reason } => {
                Self::invalid_input(field, reason)
            }
            other => Self::invalid_input("config", other.to_string()),
        }
    }
}

/// A specialized Result type for GitHub API operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_rate_limited_with_wait() {
        let err = Error::RateLimited {
            scope: LimitScope::Primary(Resource::Core),
            reset_at: None,
            retry_after: Some(Duration::from_secs(3600)),
        };
        assert_eq!(
            err.to_string(),
            "rate limit exceeded (primary, core), retry in 3600 seconds"
        );
    }

    #[test]
    fn error_display_rate_limited_without_wait() {
        let err = Error::RateLimited {
            scope: LimitScope::Secondary,
            reset_at: None,
            retry_after: None,
        };
        assert_eq!(err.to_string(), "rate limit exceeded (secondary)");
    }

    #[test]
    fn error_display_validation() {
        let err = Error::validation("items[0].id", "invalid type: string, expected u64");
        assert_eq!(
            err.to_string(),
            "validation failed at `items[0].id`: invalid type: string, expected u64"
        );
    }

    #[test]
    fn kinds_are_stable() {
        let cases = [
            (
                Error::NotFound {
                    resource: "repos/a/b".into(),
                },
                ErrorKind::NotFound,
            ),
            (
                Error::AuthenticationFailed {
                    reason: "bad credentials".into(),
                },
                ErrorKind::AuthenticationFailed,
            ),
            (Error::validation("x", "y"), ErrorKind::ValidationFailed),
            (
                Error::ServerError {
                    status: 502,
                    message: String::new(),
                },
                ErrorKind::ServerError,
            ),
            (Error::network("reset"), ErrorKind::NetworkError),
        ];
        for (err, kind) in cases {
            assert_eq!(err.kind(), kind);
        }
    }

    #[test]
    fn transient_kinds() {
        assert!(ErrorKind::ServerError.is_transient());
        assert!(ErrorKind::NetworkError.is_transient());
        assert!(ErrorKind::RateLimited.is_transient());
        assert!(!ErrorKind::NotFound.is_transient());
        assert!(!ErrorKind::ValidationFailed.is_transient());
        assert!(!ErrorKind::AuthenticationFailed.is_transient());
    }

    #[test]
    fn user_message_hides_internal_detail() {
        let err = Error::ServerError {
            status: 500,
            message: "stack trace at frame 0x1234".into(),
        };
        assert!(!err.user_message().contains("0x1234"));
        assert!(err.to_string().contains("0x1234"));
    }

    #[test]
    fn config_errors_become_validation_failures() {
        let mut config = hubkit_config::Config::default();
        config.cache.max_size = 0;
        let err: Error = config.validate().unwrap_err().into();
        assert_eq!(
            err,
            Error::invalid_input("cache.max_size", "must be at least 1")
        );
    }

    #[test]
    fn user_message_tells_input_errors_from_response_errors() {
        let input = Error::invalid_input("owner", "must not be empty");
        let response = Error::validation("owner.id", "invalid type: string, expected u64");
        assert_eq!(input.kind(), response.kind());
        assert_ne!(input.user_message(), response.user_message());
        assert!(input.user_message().contains("request is invalid"));
        assert!(response.user_message().contains("unexpected format"));
    }
}
