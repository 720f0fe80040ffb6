use crate::response::Response;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Shared, type-erased error source.
///
/// Sources are reference counted so an [`HttpError`] can be cloned: a single
/// pending response is observed by every accessor called on it, and each of
/// them must be able to report the same failure.
pub type ErrorSource = Arc<dyn std::error::Error + Send + Sync>;

/// Classification of URL validation failures.
///
/// Provides programmatic matching for different failure modes without
/// relying on unstable error message strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum InvalidUriKind {
    /// URL could not be parsed (malformed syntax)
    ParseError,
    /// URL is missing required host/authority component
    MissingAuthority,
    /// URL is missing required scheme (http/https)
    MissingScheme,
}

/// Errors produced while executing a request or reading its response.
///
/// Only [`HttpError::HttpStatus`] originates in the request pipeline itself:
/// it is returned by the checked accessors (`success`, `json`, `text`, `blob`)
/// when the status is 400 or above. Every other variant is a transport or
/// decoding failure and is propagated through interceptors and postflights
/// unchanged.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum HttpError {
    /// A checked accessor observed a status of 400 or above.
    ///
    /// `response` is the response the status was read from, so callers can
    /// still inspect the body through the raw accessors.
    #[error("{message}")]
    HttpStatus {
        status: http::StatusCode,
        message: String,
        response: Response,
    },

    /// Request descriptor could not be turned into a wire request
    #[error("Failed to build request: {0}")]
    RequestBuild(#[source] ErrorSource),

    /// Header name or value rejected by the HTTP stack
    #[error("Invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },

    /// Single request attempt timed out
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Transport error (network, connection, etc)
    #[error("Transport error: {0}")]
    Transport(#[source] ErrorSource),

    /// TLS error
    #[error("TLS error: {0}")]
    Tls(#[source] ErrorSource),

    /// Response body exceeded size limit
    #[error("Response body too large: limit {limit} bytes, got {actual} bytes")]
    BodyTooLarge { limit: usize, actual: usize },

    /// Response body stream was lost by a read that was dropped before it finished
    #[error("Response body is no longer available")]
    BodyUnavailable,

    /// JSON encoding or decoding error
    #[error("JSON processing failed: {0}")]
    Json(#[source] Arc<serde_json::Error>),

    /// Invalid URL (failed to parse)
    ///
    /// Use the `kind` field for programmatic matching. The `reason` field is
    /// a diagnostic message intended for logging only.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUri {
        url: String,
        kind: InvalidUriKind,
        reason: String,
    },

    /// Invalid URL scheme for transport security configuration
    #[error("URL scheme '{scheme}' not allowed: {reason}")]
    InvalidScheme { scheme: String, reason: String },
}

impl HttpError {
    /// Build the status error raised by checked accessors.
    ///
    /// The message reads `Error <code>: <reason>`.
    #[must_use]
    pub fn status(status: http::StatusCode, response: Response) -> Self {
        let message = format!(
            "Error {}: {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown Status")
        );
        HttpError::HttpStatus {
            status,
            message,
            response,
        }
    }

    /// The response attached to a status error, if this is one.
    #[must_use]
    pub fn response(&self) -> Option<&Response> {
        match self {
            HttpError::HttpStatus { response, .. } => Some(response),
            _ => None,
        }
    }

    /// The HTTP status attached to a status error, if this is one.
    #[must_use]
    pub fn status_code(&self) -> Option<http::StatusCode> {
        match self {
            HttpError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for HttpError {
    fn from(err: serde_json::Error) -> Self {
        HttpError::Json(Arc::new(err))
    }
}

impl From<http::Error> for HttpError {
    fn from(err: http::Error) -> Self {
        HttpError::RequestBuild(Arc::new(err))
    }
}

impl From<hyper::Error> for HttpError {
    fn from(err: hyper::Error) -> Self {
        HttpError::Transport(Arc::new(err))
    }
}

impl From<hyper_util::client::legacy::Error> for HttpError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        HttpError::Transport(Arc::new(err))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::response::BufferedResponse;
    use std::error::Error;
    use std::fmt;

    #[derive(Debug)]
    struct TestError(&'static str);

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    impl Error for TestError {}

    #[test]
    fn test_transport_error_preserves_source() {
        let err = HttpError::Transport(Arc::new(TestError("connection refused")));

        let source = err.source().expect("transport error should have a source");
        assert_eq!(source.to_string(), "connection refused");
    }

    #[test]
    fn test_cloned_error_shares_source() {
        let err = HttpError::Tls(Arc::new(TestError("certificate expired")));
        let cloned = err.clone();

        assert_eq!(err.to_string(), cloned.to_string());
        assert_eq!(
            cloned.source().map(ToString::to_string).as_deref(),
            Some("certificate expired")
        );
    }

    #[test]
    fn test_status_error_message_and_accessors() {
        let response = Response::new(BufferedResponse::new(http::StatusCode::NOT_FOUND, "gone"));
        let err = HttpError::status(http::StatusCode::NOT_FOUND, response);

        assert_eq!(err.to_string(), "Error 404: Not Found");
        assert_eq!(err.status_code(), Some(http::StatusCode::NOT_FOUND));
        assert!(err.response().is_some());
    }

    #[test]
    fn test_non_status_error_has_no_response() {
        let err = HttpError::Timeout(Duration::from_secs(5));
        assert!(err.response().is_none());
        assert!(err.status_code().is_none());
    }

    #[test]
    fn test_json_error_conversion() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = HttpError::from(parse_err);
        assert!(matches!(err, HttpError::Json(_)));
        assert!(err.source().is_some());
    }
}
