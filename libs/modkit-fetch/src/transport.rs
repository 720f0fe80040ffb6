use crate::error::HttpError;
use crate::response::Response;
use async_trait::async_trait;
use bytes::Bytes;

/// Fully resolved request handed to a transport.
///
/// Built by the pipeline after preflight and interceptors have run: the URL
/// already carries the query string (unless the request is a form), the
/// headers include the resolved `Content-Type` when none was set explicitly,
/// and the body is serialized (JSON, or form-urlencoded parameters).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    pub method: http::Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl TransportRequest {
    /// First header matching `name`, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body decoded as UTF-8 (lossy), empty when there is no body.
    #[must_use]
    pub fn body_text(&self) -> String {
        self.body
            .as_ref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default()
    }
}

/// Network capability used by [`HttpRequest::fetch`].
///
/// `execute` resolves once the response head is available; body reads happen
/// later through the returned [`Response`]. Implementations must tolerate
/// concurrent calls, since many requests share one transport. Failures
/// (DNS, connect, TLS, timeouts) are returned as-is and travel through the
/// pipeline untouched.
///
/// [`HttpRequest::fetch`]: crate::HttpRequest::fetch
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Perform the network call for `request`.
    ///
    /// # Errors
    /// Returns the transport's own failure; status codes are not errors here.
    async fn execute(&self, request: TransportRequest) -> Result<Response, HttpError>;
}
