use crate::builder::HyperTransportBuilder;
use crate::config::{TransportConfig, TransportSecurity};
use crate::error::{HttpError, InvalidUriKind};
use crate::response::{LiveResponse, Response, ResponseBody};
use crate::transport::{HttpTransport, TransportRequest};
use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http_body_util::Full;
use std::sync::OnceLock;
use tower::ServiceExt;
use tower::util::BoxCloneSyncService;

/// Type-erased tower stack behind [`HyperTransport`]
pub type TransportService =
    BoxCloneSyncService<http::Request<Full<Bytes>>, http::Response<ResponseBody>, HttpError>;

/// [`HttpTransport`] backed by hyper, rustls and a tower middleware stack
///
/// The stack applies the per-request timeout, a default User-Agent and
/// transparent response decompression (gzip, brotli, deflate). Bodies are
/// read lazily by [`LiveResponse`] and limited to `max_body_size`
/// decompressed bytes.
///
/// Every HTTP status is a successful `execute`; only network, TLS, timeout
/// and URL validation failures are errors.
///
/// `HyperTransport` is `Clone + Send + Sync`; clones share the connection
/// pool.
#[derive(Clone)]
pub struct HyperTransport {
    pub(crate) service: TransportService,
    pub(crate) max_body_size: usize,
    pub(crate) transport_security: TransportSecurity,
}

impl HyperTransport {
    /// Create a transport with default configuration
    ///
    /// # Errors
    /// Returns an error if TLS initialization fails
    pub fn new() -> Result<Self, HttpError> {
        HyperTransportBuilder::new().build()
    }

    #[must_use]
    pub fn builder() -> HyperTransportBuilder {
        HyperTransportBuilder::new()
    }

    /// Validate URL and scheme against the transport security mode.
    fn validate_url(&self, url: &str) -> Result<http::Uri, HttpError> {
        let uri: http::Uri = url
            .parse()
            .map_err(|e: http::uri::InvalidUri| HttpError::InvalidUri {
                url: url.to_owned(),
                kind: InvalidUriKind::ParseError,
                reason: e.to_string(),
            })?;

        if uri.authority().is_none() {
            return Err(HttpError::InvalidUri {
                url: url.to_owned(),
                kind: InvalidUriKind::MissingAuthority,
                reason: "missing host/authority".to_owned(),
            });
        }

        match uri.scheme_str() {
            Some("https") => Ok(uri),
            Some("http") => match self.transport_security {
                TransportSecurity::AllowInsecureHttp => Ok(uri),
                TransportSecurity::TlsOnly => Err(HttpError::InvalidScheme {
                    scheme: "http".to_owned(),
                    reason: "HTTPS required (transport security is TlsOnly)".to_owned(),
                }),
            },
            Some(scheme) => Err(HttpError::InvalidScheme {
                scheme: scheme.to_owned(),
                reason: "only http:// and https:// schemes are supported".to_owned(),
            }),
            None => Err(HttpError::InvalidUri {
                url: url.to_owned(),
                kind: InvalidUriKind::MissingScheme,
                reason: "missing scheme".to_owned(),
            }),
        }
    }

    fn to_http_request(
        &self,
        request: TransportRequest,
    ) -> Result<http::Request<Full<Bytes>>, HttpError> {
        let uri = self.validate_url(&request.url)?;
        let mut builder = http::Request::builder().method(request.method).uri(uri);

        for (name, value) in &request.headers {
            let header_name =
                HeaderName::try_from(name.as_str()).map_err(|e| HttpError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            let header_value =
                HeaderValue::try_from(value.as_str()).map_err(|e| HttpError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            builder = builder.header(header_name, header_value);
        }

        Ok(builder.body(Full::new(request.body.unwrap_or_default()))?)
    }
}

#[async_trait]
impl HttpTransport for HyperTransport {
    async fn execute(&self, request: TransportRequest) -> Result<Response, HttpError> {
        let http_request = self.to_http_request(request)?;
        let method = http_request.method().clone();
        let uri = http_request.uri().clone();

        let response = self.service.clone().oneshot(http_request).await?;

        tracing::debug!(
            %method,
            uri = %uri,
            status = response.status().as_u16(),
            "received response head"
        );

        Ok(Response::new(LiveResponse::new(
            response,
            self.max_body_size,
        )))
    }
}

/// Transport used by [`HTTP`](crate::HTTP)
///
/// Builds a [`HyperTransport`] from its configuration on first use. A build
/// failure is kept and returned by every `execute`, so the process-wide
/// default request can be created without a fallible step.
pub struct DefaultTransport {
    config: TransportConfig,
    inner: OnceLock<Result<HyperTransport, HttpError>>,
}

impl DefaultTransport {
    #[must_use]
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            inner: OnceLock::new(),
        }
    }

    fn transport(&self) -> Result<&HyperTransport, HttpError> {
        self.inner
            .get_or_init(|| HyperTransportBuilder::with_config(self.config.clone()).build())
            .as_ref()
            .map_err(Clone::clone)
    }
}

impl Default for DefaultTransport {
    fn default() -> Self {
        Self::new(TransportConfig::default())
    }
}

#[async_trait]
impl HttpTransport for DefaultTransport {
    async fn execute(&self, request: TransportRequest) -> Result<Response, HttpError> {
        self.transport()?.execute(request).await
    }
}
