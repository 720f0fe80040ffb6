use crate::client::{HyperTransport, TransportService};
use crate::config::{TlsRootConfig, TransportConfig, TransportSecurity};
use crate::error::HttpError;
use crate::layers::{OtelLayer, UserAgentLayer};
use crate::response::ResponseBody;
use crate::tls;
use bytes::Bytes;
use http::Response;
use http_body_util::{BodyExt, Full};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use std::sync::Arc;
use std::time::Duration;
use tower::timeout::TimeoutLayer;
use tower::util::BoxCloneSyncService;
use tower::{Layer, ServiceBuilder, ServiceExt};
use tower_http::decompression::DecompressionLayer;

/// Builder for [`HyperTransport`]
pub struct HyperTransportBuilder {
    config: TransportConfig,
}

impl HyperTransportBuilder {
    /// Create a new builder with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: TransportConfig::default(),
        }
    }

    /// Create a builder with a specific configuration
    #[must_use]
    pub fn with_config(config: TransportConfig) -> Self {
        Self { config }
    }

    /// Set the per-request timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the user agent string
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set the maximum response body size
    #[must_use]
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    /// Set transport security mode
    ///
    /// Use `TransportSecurity::AllowInsecureHttp` only for testing with mock servers.
    #[must_use]
    pub fn transport(mut self, transport: TransportSecurity) -> Self {
        self.config.transport = transport;
        self
    }

    /// Allow insecure HTTP connections (for testing only)
    ///
    /// Equivalent to `.transport(TransportSecurity::AllowInsecureHttp)`.
    ///
    /// Only available in debug builds or with the `allow-insecure-http`
    /// feature.
    #[must_use]
    #[cfg(any(debug_assertions, feature = "allow-insecure-http"))]
    pub fn allow_insecure_http(mut self) -> Self {
        tracing::warn!(
            target: "modkit_fetch::security",
            "allow_insecure_http() called - HTTP traffic will NOT be encrypted"
        );
        self.config.transport = TransportSecurity::AllowInsecureHttp;
        self
    }

    /// Set the TLS root certificate strategy
    #[must_use]
    pub fn tls_roots(mut self, tls_roots: TlsRootConfig) -> Self {
        self.config.tls_roots = tls_roots;
        self
    }

    /// Enable the `outgoing_http` tracing span and trace context injection
    #[must_use]
    pub fn with_otel(mut self) -> Self {
        self.config.otel = true;
        self
    }

    /// Build the transport
    ///
    /// Does not need a running Tokio runtime; connections are only opened
    /// when a request executes.
    ///
    /// # Errors
    /// Returns an error if TLS initialization fails or the user agent is not
    /// a valid header value
    pub fn build(self) -> Result<HyperTransport, HttpError> {
        if self.config.transport == TransportSecurity::AllowInsecureHttp {
            tracing::warn!(
                "insecure HTTP enabled (TransportSecurity::AllowInsecureHttp); \
                 use only for testing with mock servers"
            );
        }

        let timeout = self.config.request_timeout;
        let https = build_https_connector(self.config.tls_roots, self.config.transport)?;
        let hyper_client = Client::builder(TokioExecutor::new()).build::<_, Full<Bytes>>(https);
        let ua_layer = UserAgentLayer::try_new(&self.config.user_agent)?;

        // Request flow (outer to inner):
        //   [Otel] -> Timeout -> UserAgent -> Decompression -> hyper_client
        let service = ServiceBuilder::new()
            .layer(TimeoutLayer::new(timeout))
            .layer(ua_layer)
            .layer(DecompressionLayer::new())
            .service(hyper_client)
            .map_response(map_decompression_response)
            .map_err(move |e: tower::BoxError| map_tower_error(e, timeout));

        let service: TransportService = if self.config.otel {
            BoxCloneSyncService::new(OtelLayer::new().layer(service))
        } else {
            BoxCloneSyncService::new(service)
        };

        Ok(HyperTransport {
            service,
            max_body_size: self.config.max_body_size,
            transport_security: self.config.transport,
        })
    }
}

impl Default for HyperTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Map tower errors to `HttpError` with the configured timeout
///
/// Typed `HttpError`s boxed by inner layers are unwrapped instead of being
/// wrapped again as `Transport`.
fn map_tower_error(err: tower::BoxError, timeout: Duration) -> HttpError {
    if err.is::<tower::timeout::error::Elapsed>() {
        return HttpError::Timeout(timeout);
    }

    match err.downcast::<HttpError>() {
        Ok(http_err) => *http_err,
        Err(other) => HttpError::Transport(Arc::from(other)),
    }
}

/// Box the decompression body into [`ResponseBody`].
fn map_decompression_response<B>(response: Response<B>) -> Response<ResponseBody>
where
    B: hyper::body::Body<Data = Bytes> + Send + Sync + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (parts, body) = response.into_parts();
    let boxed_body: ResponseBody = body.map_err(Into::into).boxed();
    Response::from_parts(parts, boxed_body)
}

/// Build the HTTPS connector for the given roots.
///
/// ALPN advertises both h2 and http/1.1.
///
/// # Errors
///
/// Returns `HttpError::Tls` if `TlsRootConfig::Native` is requested but no
/// valid root certificates are available from the OS certificate store.
fn build_https_connector(
    tls_roots: TlsRootConfig,
    transport: TransportSecurity,
) -> Result<HttpsConnector<HttpConnector>, HttpError> {
    let allow_http = transport == TransportSecurity::AllowInsecureHttp;

    let builder = match tls_roots {
        TlsRootConfig::WebPki => hyper_rustls::HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(tls::crypto_provider())
            .map_err(|e| HttpError::Tls(Arc::new(e)))?,
        TlsRootConfig::Native => {
            let client_config = tls::native_roots_client_config().map_err(|e| {
                let source: Box<dyn std::error::Error + Send + Sync> = e.into();
                HttpError::Tls(Arc::from(source))
            })?;
            hyper_rustls::HttpsConnectorBuilder::new().with_tls_config(client_config)
        }
    };

    let connector = if allow_http {
        builder.https_or_http().enable_all_versions().build()
    } else {
        builder.https_only().enable_all_versions().build()
    };
    Ok(connector)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::config::DEFAULT_USER_AGENT;

    #[test]
    fn test_builder_default() {
        let builder = HyperTransportBuilder::new();
        assert_eq!(builder.config.request_timeout, Duration::from_secs(30));
        assert_eq!(builder.config.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(builder.config.tls_roots, TlsRootConfig::WebPki);
        assert!(!builder.config.otel);
    }

    #[test]
    fn test_builder_setters() {
        let builder = HyperTransportBuilder::with_config(TransportConfig::minimal())
            .timeout(Duration::from_secs(3))
            .user_agent("custom/1.0")
            .max_body_size(512)
            .transport(TransportSecurity::AllowInsecureHttp)
            .tls_roots(TlsRootConfig::Native)
            .with_otel();

        assert_eq!(builder.config.request_timeout, Duration::from_secs(3));
        assert_eq!(builder.config.user_agent, "custom/1.0");
        assert_eq!(builder.config.max_body_size, 512);
        assert_eq!(builder.config.transport, TransportSecurity::AllowInsecureHttp);
        assert_eq!(builder.config.tls_roots, TlsRootConfig::Native);
        assert!(builder.config.otel);
    }

    #[test]
    fn test_build_without_runtime() {
        let transport = HyperTransportBuilder::new().build().unwrap();
        assert_eq!(transport.transport_security, TransportSecurity::TlsOnly);
    }

    #[test]
    fn test_build_with_otel() {
        assert!(HyperTransportBuilder::new().with_otel().build().is_ok());
    }

    #[test]
    fn test_build_invalid_user_agent() {
        let result = HyperTransportBuilder::new()
            .user_agent("invalid\x00agent")
            .build();
        assert!(matches!(result, Err(HttpError::InvalidHeader { .. })));
    }

    #[test]
    fn test_build_native_roots() {
        let result = HyperTransportBuilder::new()
            .tls_roots(TlsRootConfig::Native)
            .build();

        // Depends on OS certificate availability
        match &result {
            Ok(_) => {}
            Err(HttpError::Tls(err)) => {
                let msg = err.to_string();
                assert!(
                    msg.contains("native root") || msg.contains("certificate"),
                    "TLS error should mention certificates: {msg}"
                );
            }
            Err(other) => panic!("Unexpected error type: {other:?}"),
        }
    }

    #[test]
    fn test_insecure_http_warning_emitted() {
        use std::sync::Mutex;
        use tracing_subscriber::layer::SubscriberExt;

        #[derive(Clone, Default)]
        struct WarningCapture {
            warnings: Arc<Mutex<Vec<String>>>,
        }

        impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for WarningCapture {
            fn on_event(
                &self,
                event: &tracing::Event<'_>,
                _ctx: tracing_subscriber::layer::Context<'_, S>,
            ) {
                if *event.metadata().level() == tracing::Level::WARN {
                    let mut visitor = MessageVisitor(String::new());
                    event.record(&mut visitor);
                    self.warnings.lock().unwrap().push(visitor.0);
                }
            }
        }

        struct MessageVisitor(String);
        impl tracing::field::Visit for MessageVisitor {
            fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                if field.name() == "message" {
                    self.0 = format!("{value:?}");
                }
            }
        }

        let capture = WarningCapture::default();
        let warnings = capture.warnings.clone();
        let subscriber = tracing_subscriber::registry().with(capture);

        tracing::subscriber::with_default(subscriber, || {
            _ = HyperTransportBuilder::new().allow_insecure_http().build();
            _ = HyperTransportBuilder::new()
                .transport(TransportSecurity::TlsOnly)
                .build();
        });

        let captured = warnings.lock().unwrap();
        // One from allow_insecure_http() and one from build(); none for TlsOnly
        assert_eq!(captured.len(), 2, "unexpected warnings: {:?}", *captured);
        assert!(
            captured
                .iter()
                .all(|w| w.contains("insecure HTTP") || w.contains("HTTP traffic")),
            "warnings should mention insecure HTTP: {:?}",
            *captured
        );
    }

    #[test]
    fn test_map_tower_error_timeout() {
        let elapsed: tower::BoxError = Box::new(tower::timeout::error::Elapsed::new());
        let result = map_tower_error(elapsed, Duration::from_secs(7));
        assert!(matches!(result, HttpError::Timeout(d) if d == Duration::from_secs(7)));
    }

    #[test]
    fn test_map_tower_error_preserves_http_error() {
        let boxed: tower::BoxError = Box::new(HttpError::Timeout(Duration::from_secs(5)));
        let result = map_tower_error(boxed, Duration::from_secs(30));
        assert!(matches!(result, HttpError::Timeout(d) if d == Duration::from_secs(5)));
    }

    #[test]
    fn test_map_tower_error_wraps_unknown_as_transport() {
        let other: tower::BoxError = Box::new(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        ));
        let result = map_tower_error(other, Duration::from_secs(30));
        assert!(matches!(result, HttpError::Transport(_)));
    }
}
