#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Immutable HTTP requests with an interception pipeline for `ModKit`
//!
//! Requests are values: every builder call returns a new [`HttpRequest`] and
//! leaves the receiver untouched, so a partially configured request (base
//! URL, auth header, hooks) can be shared freely and extended per call.
//!
//! # Pipeline
//!
//! [`HttpRequest::fetch`] runs three stages:
//!
//! 1. **preflight** - a synchronous `HttpRequest -> HttpRequest` transform
//! 2. **interceptors** - onion-style layers around the transport call, the
//!    most recently added being the outermost
//! 3. **postflight** - a transform of the pending response
//!
//! and returns a [`Response`] immediately. Inside a Tokio runtime the rest of
//! the pipeline is spawned at once and runs to completion even if the
//! response is dropped unread; it runs once however many accessors are
//! called.
//!
//! # Responses
//!
//! Raw accessors (`json_raw`, `text_raw`, `blob_raw`) decode the body
//! whatever the status. Checked accessors (`success`, `json`, `text`, `blob`)
//! fail with [`HttpError::HttpStatus`] for statuses of 400 and above; the
//! error carries the response so its body stays readable. A `204 No Content`
//! decodes to null in both.
//!
//! # Transport
//!
//! [`HTTP`] dispatches through a hyper-based [`HyperTransport`] (rustls,
//! HTTPS only, transparent decompression, per-request timeout). Any
//! [`HttpTransport`] can be swapped in with [`HttpRequest::transport`].
//!
//! # Example
//!
//! ```ignore
//! use modkit_fetch::HTTP;
//!
//! let api = HTTP
//!     .url("https://api.example.com")
//!     .basic_auth("user", "secret")
//!     .intercept(|request, next| async move {
//!         tracing::info!(url = %request.to_url(), "calling api");
//!         next.run(request).await
//!     });
//!
//! let user: User = api.path("users").path("42").fetch().json_as().await?;
//! ```

mod builder;
mod client;
mod config;
mod encoding;
mod error;
mod layers;
mod otel;
mod pipeline;
mod request;
mod response;
mod tls;
mod transport;

use std::sync::{Arc, LazyLock};

pub use builder::HyperTransportBuilder;
pub use client::{DefaultTransport, HyperTransport, TransportService};
pub use config::{DEFAULT_USER_AGENT, TlsRootConfig, TransportConfig, TransportSecurity};
pub use encoding::{IntoParamValues, SearchParams};
pub use error::{ErrorSource, HttpError, InvalidUriKind};
pub use layers::{OtelLayer, OtelService, UserAgentLayer, UserAgentService};
pub use pipeline::{Interceptor, Next, Postflight, Preflight};
pub use request::{FORM_CONTENT_TYPE, HttpRequest, JSON_CONTENT_TYPE};
pub use response::{
    BufferedResponse, HttpResponse, LiveResponse, PendingResponse, Response, ResponseBody,
    ResponseWrapper,
};
pub use transport::{HttpTransport, TransportRequest};

/// Process-wide starting point for requests
///
/// A GET with an empty URL, no headers, parameters or body and identity
/// hooks, dispatched through a [`DefaultTransport`] with the default
/// [`TransportConfig`].
pub static HTTP: LazyLock<HttpRequest> =
    LazyLock::new(|| HttpRequest::new(Arc::new(DefaultTransport::default())));
