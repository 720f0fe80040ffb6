use std::time::Duration;

/// Default User-Agent string for outbound requests
pub const DEFAULT_USER_AGENT: &str = concat!("modkit-fetch/", env!("CARGO_PKG_VERSION"));

/// TLS root certificate configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TlsRootConfig {
    /// Use Mozilla's root certificates (webpki-roots, no OS dependency)
    #[default]
    WebPki,
    /// Use OS native root certificate store
    Native,
}

/// Transport security configuration
///
/// Controls whether the transport enforces TLS or allows insecure HTTP.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportSecurity {
    /// Require TLS for all connections (HTTPS only) - default and recommended
    #[default]
    TlsOnly,
    /// Allow insecure HTTP connections (for testing with mock servers only)
    ///
    /// **WARNING**: This should only be used for local testing with mock servers.
    /// Never use in production as it exposes traffic to interception.
    AllowInsecureHttp,
}

/// Configuration of the hyper-backed transport
///
/// Retries, redirects and caching are not part of the transport; install an
/// interceptor on the request when they are needed.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Per-request timeout (default: 30 seconds)
    ///
    /// Covers the wait for the response head. Body reads are bounded by
    /// `max_body_size` instead.
    pub request_timeout: Duration,

    /// Maximum response body size in bytes, after decompression (default: 10 MB)
    pub max_body_size: usize,

    /// User-Agent header value, sent unless the request sets its own
    pub user_agent: String,

    /// Transport security mode (default: `TlsOnly`)
    pub transport: TransportSecurity,

    /// TLS root certificate strategy (default: `WebPki`)
    pub tls_roots: TlsRootConfig,

    /// Enable the `outgoing_http` tracing span (default: false)
    pub otel: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_body_size: 10 * 1024 * 1024, // 10 MB
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            transport: TransportSecurity::TlsOnly,
            tls_roots: TlsRootConfig::default(),
            otel: false,
        }
    }
}

impl TransportConfig {
    /// Create minimal configuration (small timeout and body limit)
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            max_body_size: 1024 * 1024, // 1 MB
            ..Self::default()
        }
    }

    /// Create configuration for testing with mock servers (allows insecure HTTP)
    ///
    /// **WARNING**: This configuration allows plain HTTP connections.
    /// Use only for local testing with mock servers, never in production.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            max_body_size: 1024 * 1024, // 1 MB
            transport: TransportSecurity::AllowInsecureHttp,
            ..Self::default()
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_transport_config_defaults() {
        let config = TransportConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.max_body_size, 10 * 1024 * 1024);
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.transport, TransportSecurity::TlsOnly);
        assert_eq!(config.tls_roots, TlsRootConfig::WebPki);
        assert!(!config.otel);
    }

    #[test]
    fn test_transport_config_minimal() {
        let config = TransportConfig::minimal();
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.max_body_size, 1024 * 1024);
        assert_eq!(config.transport, TransportSecurity::TlsOnly);
    }

    #[test]
    fn test_transport_config_for_testing() {
        let config = TransportConfig::for_testing();
        assert_eq!(config.transport, TransportSecurity::AllowInsecureHttp);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_default_user_agent_names_crate() {
        assert!(DEFAULT_USER_AGENT.starts_with("modkit-fetch/"));
    }
}
