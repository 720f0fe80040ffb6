use http::{Request, Response};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::Instrument;

/// Tower layer opening an `outgoing_http` span around each transport call
///
/// Span fields: `http.method`, `http.url` (without the query string, which
/// may carry credentials), `otel.kind = "client"`, and on completion
/// `http.status_code`. `error = true` is recorded for transport failures and
/// for 4xx/5xx statuses. With the `otel` feature the current trace context
/// is injected as W3C headers.
#[derive(Clone, Default)]
pub struct OtelLayer;

impl OtelLayer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for OtelLayer {
    type Service = OtelService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        OtelService { inner }
    }
}

#[derive(Clone)]
pub struct OtelService<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for OtelService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let method = req.method().clone();
        let uri = req.uri();
        let url = format!(
            "{}://{}{}",
            uri.scheme_str().unwrap_or("https"),
            uri.authority().map_or("", http::uri::Authority::as_str),
            uri.path()
        );

        let span = tracing::info_span!(
            "outgoing_http",
            http.method = %method,
            http.url = %url,
            otel.kind = "client",
            http.status_code = tracing::field::Empty,
            error = tracing::field::Empty,
        );

        // Inject while the new span is current so downstream sees it as parent
        span.in_scope(|| crate::otel::inject_current_span(req.headers_mut()));

        // Call the instance that was poll_ready'd and keep a fresh clone
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let result = inner.call(req).instrument(span.clone()).await;

            match &result {
                Ok(response) => {
                    let status = response.status();
                    span.record("http.status_code", status.as_u16());
                    if status.is_client_error() || status.is_server_error() {
                        span.record("error", true);
                    }
                }
                Err(_) => {
                    span.record("error", true);
                }
            }

            result
        })
    }
}
