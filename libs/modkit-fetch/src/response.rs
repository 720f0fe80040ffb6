//! Response capability and its concrete forms.
//!
//! [`HttpResponse`] is the capability a transport (or a postflight) hands
//! back: a status, headers and a body that can be read any number of times.
//! [`Response`] is the cloneable handle callers hold; it adds the checked
//! accessors that fail with [`HttpError::HttpStatus`] for statuses of 400 and
//! above.
//!
//! Concrete forms:
//! - [`LiveResponse`] - backed by a hyper response, body buffered on first read
//! - [`BufferedResponse`] - fully in-memory, for custom transports and tests
//! - [`ResponseWrapper`] - deferred, delegates to a response still in flight

use crate::error::HttpError;
use async_trait::async_trait;
use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt, Shared};
use http::{HeaderMap, StatusCode};
use http_body_util::BodyExt;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// A response that has not resolved yet.
///
/// This is what flows through interceptors and postflights.
pub type PendingResponse = BoxFuture<'static, Result<Response, HttpError>>;

/// Type alias for the boxed response body that supports decompression.
pub type ResponseBody =
    http_body_util::combinators::BoxBody<Bytes, Box<dyn std::error::Error + Send + Sync>>;

/// Response capability.
///
/// Implementors provide the status, headers and body bytes. The raw
/// accessors are provided on top of them and apply the content rules shared
/// by every response: a `204 No Content` decodes to null without touching the
/// body, anything else is decoded regardless of status.
///
/// Wrappers installed by a postflight typically hold an inner [`Response`],
/// delegate everything and override only the accessor they transform.
#[async_trait]
pub trait HttpResponse: Send + Sync {
    /// Status of the response, regardless of success.
    async fn status(&self) -> Result<StatusCode, HttpError>;

    /// Response headers.
    async fn headers(&self) -> Result<HeaderMap, HttpError>;

    /// Undecoded body. Repeated calls must not repeat the network read.
    async fn body_bytes(&self) -> Result<Bytes, HttpError>;

    /// Body parsed as JSON; `Value::Null` for 204.
    async fn json_raw(&self) -> Result<Value, HttpError> {
        if self.status().await? == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }
        let bytes = self.body_bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Body as UTF-8 text (lossy); `None` for 204.
    async fn text_raw(&self) -> Result<Option<String>, HttpError> {
        if self.status().await? == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let bytes = self.body_bytes().await?;
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// Body bytes; `None` for 204.
    async fn blob_raw(&self) -> Result<Option<Bytes>, HttpError> {
        if self.status().await? == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        self.body_bytes().await.map(Some)
    }
}

/// Cloneable handle over any [`HttpResponse`].
///
/// Raw accessors (`*_raw`) never fail because of the status. Checked
/// accessors (`success`, `json`, `text`, `blob`) first await the status and
/// fail with [`HttpError::HttpStatus`] when it is 400 or above; the error
/// carries a clone of this handle so the body stays readable.
#[derive(Clone)]
pub struct Response {
    inner: Arc<dyn HttpResponse>,
}

impl Response {
    #[must_use]
    pub fn new(response: impl HttpResponse + 'static) -> Self {
        Self {
            inner: Arc::new(response),
        }
    }

    /// # Errors
    /// Returns the transport error if the response never arrived.
    pub async fn status(&self) -> Result<StatusCode, HttpError> {
        self.inner.status().await
    }

    /// # Errors
    /// Returns the transport error if the response never arrived.
    pub async fn headers(&self) -> Result<HeaderMap, HttpError> {
        self.inner.headers().await
    }

    /// # Errors
    /// Returns transport or body errors; never `HttpStatus`.
    pub async fn json_raw(&self) -> Result<Value, HttpError> {
        self.inner.json_raw().await
    }

    /// # Errors
    /// Returns transport or body errors; never `HttpStatus`.
    pub async fn text_raw(&self) -> Result<Option<String>, HttpError> {
        self.inner.text_raw().await
    }

    /// # Errors
    /// Returns transport or body errors; never `HttpStatus`.
    pub async fn blob_raw(&self) -> Result<Option<Bytes>, HttpError> {
        self.inner.blob_raw().await
    }

    /// Raw JSON body deserialized into `T`.
    ///
    /// # Errors
    /// Returns `HttpError::Json` if the body does not match `T`.
    pub async fn json_raw_as<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        let value = self.json_raw().await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Returns this response if its status is below 400.
    ///
    /// # Errors
    /// Returns `HttpError::HttpStatus` for statuses of 400 and above.
    pub async fn succeed(&self) -> Result<Response, HttpError> {
        let status = self.status().await?;
        if status.as_u16() >= 400 {
            return Err(HttpError::status(status, self.clone()));
        }
        Ok(self.clone())
    }

    /// Status of a successful response.
    ///
    /// # Errors
    /// Returns `HttpError::HttpStatus` for statuses of 400 and above.
    pub async fn success(&self) -> Result<StatusCode, HttpError> {
        self.succeed().await?.status().await
    }

    /// # Errors
    /// Returns `HttpError::HttpStatus` for statuses of 400 and above, or
    /// `HttpError::Json` if the body is not JSON.
    pub async fn json(&self) -> Result<Value, HttpError> {
        self.succeed().await?.json_raw().await
    }

    /// Checked JSON body deserialized into `T`.
    ///
    /// # Errors
    /// Returns `HttpError::HttpStatus` for statuses of 400 and above, or
    /// `HttpError::Json` if the body does not match `T`.
    pub async fn json_as<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        let value = self.json().await?;
        Ok(serde_json::from_value(value)?)
    }

    /// # Errors
    /// Returns `HttpError::HttpStatus` for statuses of 400 and above.
    pub async fn text(&self) -> Result<Option<String>, HttpError> {
        self.succeed().await?.text_raw().await
    }

    /// # Errors
    /// Returns `HttpError::HttpStatus` for statuses of 400 and above.
    pub async fn blob(&self) -> Result<Option<Bytes>, HttpError> {
        self.succeed().await?.blob_raw().await
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response").finish_non_exhaustive()
    }
}

/// Deferred response over a [`PendingResponse`].
///
/// The pending future is shared: it runs once and every accessor observes
/// the same outcome. Inside a Tokio runtime it is driven by a spawned task
/// from construction on, so it completes even if the wrapper is dropped
/// unread; outside one it runs on the first accessor call.
pub struct ResponseWrapper {
    pending: Shared<PendingResponse>,
}

impl ResponseWrapper {
    #[must_use]
    pub fn new(pending: PendingResponse) -> Self {
        let pending = pending.shared();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let driver = pending.clone();
            handle.spawn(async move {
                if let Err(e) = driver.await {
                    tracing::debug!(error = %e, "request pipeline failed");
                }
            });
        }
        Self { pending }
    }

    /// Wait for the upstream response.
    ///
    /// # Errors
    /// Returns whatever error the pipeline produced.
    pub async fn resolve(&self) -> Result<Response, HttpError> {
        self.pending.clone().await
    }
}

#[async_trait]
impl HttpResponse for ResponseWrapper {
    async fn status(&self) -> Result<StatusCode, HttpError> {
        self.resolve().await?.status().await
    }

    async fn headers(&self) -> Result<HeaderMap, HttpError> {
        self.resolve().await?.headers().await
    }

    async fn body_bytes(&self) -> Result<Bytes, HttpError> {
        self.resolve().await?.inner.body_bytes().await
    }

    async fn json_raw(&self) -> Result<Value, HttpError> {
        self.resolve().await?.json_raw().await
    }

    async fn text_raw(&self) -> Result<Option<String>, HttpError> {
        self.resolve().await?.text_raw().await
    }

    async fn blob_raw(&self) -> Result<Option<Bytes>, HttpError> {
        self.resolve().await?.blob_raw().await
    }
}

/// Fully buffered response.
#[derive(Debug, Clone)]
pub struct BufferedResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl BufferedResponse {
    #[must_use]
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// JSON body with a matching `content-type`.
    ///
    /// # Errors
    /// Returns `HttpError::Json` if `value` cannot be serialized.
    pub fn json<T: serde::Serialize + ?Sized>(
        status: StatusCode,
        value: &T,
    ) -> Result<Self, HttpError> {
        let body = serde_json::to_vec(value)?;
        Ok(Self::new(status, body).with_header(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("application/json"),
        ))
    }

    #[must_use]
    pub fn with_header(mut self, name: http::HeaderName, value: http::HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

#[async_trait]
impl HttpResponse for BufferedResponse {
    async fn status(&self) -> Result<StatusCode, HttpError> {
        Ok(self.status)
    }

    async fn headers(&self) -> Result<HeaderMap, HttpError> {
        Ok(self.headers.clone())
    }

    async fn body_bytes(&self) -> Result<Bytes, HttpError> {
        Ok(self.body.clone())
    }
}

/// Network-backed response.
///
/// Status and headers are available as soon as the response head arrives.
/// The body stream is read at most once, on the first body access, and its
/// outcome (bytes or error) is kept for every later accessor. Reads enforce
/// `max_body_size` on decompressed bytes.
pub struct LiveResponse {
    status: StatusCode,
    headers: HeaderMap,
    stream: Mutex<Option<ResponseBody>>,
    body: OnceCell<Result<Bytes, HttpError>>,
    max_body_size: usize,
}

impl LiveResponse {
    #[must_use]
    pub fn new(response: http::Response<ResponseBody>, max_body_size: usize) -> Self {
        let (parts, body) = response.into_parts();
        Self {
            status: parts.status,
            headers: parts.headers,
            stream: Mutex::new(Some(body)),
            body: OnceCell::new(),
            max_body_size,
        }
    }
}

#[async_trait]
impl HttpResponse for LiveResponse {
    async fn status(&self) -> Result<StatusCode, HttpError> {
        Ok(self.status)
    }

    async fn headers(&self) -> Result<HeaderMap, HttpError> {
        Ok(self.headers.clone())
    }

    async fn body_bytes(&self) -> Result<Bytes, HttpError> {
        self.body
            .get_or_init(|| async {
                let stream = self.stream.lock().take();
                match stream {
                    Some(stream) => read_body_limited(stream, self.max_body_size).await,
                    None => Err(HttpError::BodyUnavailable),
                }
            })
            .await
            .clone()
    }
}

/// Collect a body, failing once more than `limit` bytes have been read.
///
/// The limit applies to the bytes produced by the body, i.e. after
/// decompression.
///
/// # Errors
/// Returns `HttpError::BodyTooLarge` past the limit, or
/// `HttpError::Transport` if the stream fails.
pub async fn read_body_limited(body: ResponseBody, limit: usize) -> Result<Bytes, HttpError> {
    let mut collected = Vec::new();
    let mut body = std::pin::pin!(body);

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|e| HttpError::Transport(Arc::from(e)))?;
        if let Some(chunk) = frame.data_ref() {
            if collected.len() + chunk.len() > limit {
                return Err(HttpError::BodyTooLarge {
                    limit,
                    actual: collected.len() + chunk.len(),
                });
            }
            collected.extend_from_slice(chunk);
        }
    }

    Ok(Bytes::from(collected))
}
