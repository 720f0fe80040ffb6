use crate::encoding::{IntoParamValues, SearchParams, basic_credentials, concat_path};
use crate::error::HttpError;
use crate::pipeline::{
    Interceptor, Next, Postflight, Preflight, identity_postflight, identity_preflight,
    passthrough_interceptor,
};
use crate::response::{PendingResponse, Response, ResponseWrapper};
use crate::transport::{HttpTransport, TransportRequest};
use bytes::Bytes;
use http::{Method, StatusCode};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Content type used when a JSON body is present.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Content type used for a POST without a body.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

const FORM_CONTENT_TYPE_PREFIX: &str = "application/x-www-form-urlencoded";

/// Immutable HTTP request with a fluent builder API
///
/// Every builder method returns a new `HttpRequest`; the receiver is never
/// modified, so a partially configured request can be shared and extended
/// concurrently. Unchanged fields are shared by reference and maps are
/// copied on write.
///
/// Start from [`HTTP`](crate::HTTP) or [`HttpRequest::new`]:
///
/// ```ignore
/// use modkit_fetch::HTTP;
///
/// let api = HTTP
///     .url("https://api.example.com")
///     .header("x-request-id", "abc123");
///
/// let users = api.path("users").param("page", "1").json().await?;
///
/// let created = api
///     .post()
///     .path("/users/")
///     .body(serde_json::json!({"name": "Alice"}))
///     .fetch()
///     .success()
///     .await?;
/// ```
///
/// # Parameters and content type
///
/// Parameters go to the query string unless the request is a form
/// ([`is_form`](Self::is_form)), in which case they become the body. A POST
/// with no body and no explicit `Content-Type` is a form.
///
/// # Pipeline
///
/// [`fetch`](Self::fetch) runs the preflight hook, then the interceptor
/// chain around the transport, then the postflight hook. See
/// [`intercept`](Self::intercept) for the layer ordering.
#[derive(Clone)]
pub struct HttpRequest {
    transport: Arc<dyn HttpTransport>,
    method: Method,
    url: Arc<str>,
    headers: Arc<IndexMap<String, String>>,
    params: Arc<IndexMap<String, Vec<String>>>,
    body: Option<Arc<Value>>,
    preflight: Preflight,
    postflight: Postflight,
    interceptor: Interceptor,
}

impl HttpRequest {
    /// A GET request with an empty URL, no headers, parameters or body, and
    /// identity hooks, dispatched through `transport`.
    #[must_use]
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            method: Method::GET,
            url: Arc::from(""),
            headers: Arc::default(),
            params: Arc::default(),
            body: None,
            preflight: identity_preflight(),
            postflight: identity_postflight(),
            interceptor: passthrough_interceptor(),
        }
    }

    #[must_use]
    pub fn get_transport(&self) -> &Arc<dyn HttpTransport> {
        &self.transport
    }

    /// Replace the transport.
    #[must_use]
    pub fn transport(&self, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn get_method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn method(&self, method: Method) -> Self {
        Self {
            method,
            ..self.clone()
        }
    }

    /// Shortcut for `method(Method::GET)`
    #[must_use]
    pub fn get(&self) -> Self {
        self.method(Method::GET)
    }

    /// Shortcut for `method(Method::POST)`
    #[must_use]
    pub fn post(&self) -> Self {
        self.method(Method::POST)
    }

    /// Shortcut for `method(Method::PUT)`
    #[must_use]
    pub fn put(&self) -> Self {
        self.method(Method::PUT)
    }

    /// Shortcut for `method(Method::DELETE)`
    #[must_use]
    pub fn delete(&self) -> Self {
        self.method(Method::DELETE)
    }

    /// Shortcut for `method(Method::HEAD)`
    #[must_use]
    pub fn head(&self) -> Self {
        self.method(Method::HEAD)
    }

    /// Shortcut for `method(Method::PATCH)`
    #[must_use]
    pub fn patch(&self) -> Self {
        self.method(Method::PATCH)
    }

    /// URL built so far, including paths but not the query string.
    #[must_use]
    pub fn get_url(&self) -> &str {
        &self.url
    }

    /// Replace the URL (and any paths appended so far).
    #[must_use]
    pub fn url(&self, url: impl Into<String>) -> Self {
        Self {
            url: Arc::from(url.into()),
            ..self.clone()
        }
    }

    /// Append a path segment.
    ///
    /// Exactly one `/` separates the current URL from `path`, whether or not
    /// either side already carries one.
    #[must_use]
    pub fn path(&self, path: &str) -> Self {
        Self {
            url: Arc::from(concat_path(&self.url, path)),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn get_headers(&self) -> &IndexMap<String, String> {
        &self.headers
    }

    /// Set a header, replacing any header with exactly the same name.
    #[must_use]
    pub fn header(&self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        Arc::make_mut(&mut next.headers).insert(name.into(), value.into());
        next
    }

    /// Shortcut for `header("Content-Type", value)`
    #[must_use]
    pub fn content_type(&self, value: impl Into<String>) -> Self {
        self.header("Content-Type", value)
    }

    /// Set `Authorization: Basic base64(username:password)`.
    #[must_use]
    pub fn basic_auth(&self, username: &str, password: &str) -> Self {
        self.header("Authorization", basic_credentials(username, password))
    }

    #[must_use]
    pub fn get_params(&self) -> &IndexMap<String, Vec<String>> {
        &self.params
    }

    /// Set a parameter.
    ///
    /// Replaces every previous value of `key`. A sequence sets a repeated
    /// parameter in the given order; `None` removes the key. Keys and values
    /// are urlencoded when the request is sent.
    ///
    /// ```ignore
    /// HTTP.param("foo", "bar");              // foo=bar
    /// HTTP.param("foo", ["bar", "baz"]);     // foo=bar&foo=baz
    /// HTTP.param("foo", "bar").param("foo", None::<&str>); // (nothing)
    /// ```
    #[must_use]
    pub fn param(&self, key: impl Into<String>, values: impl IntoParamValues) -> Self {
        let mut next = self.clone();
        let params = Arc::make_mut(&mut next.params);
        let key = key.into();
        match values.into_param_values() {
            Some(values) => {
                params.insert(key, values);
            }
            None => {
                params.shift_remove(&key);
            }
        }
        next
    }

    /// Apply [`param`](Self::param) for each entry, in iteration order.
    ///
    /// Keys not mentioned keep their values.
    #[must_use]
    pub fn params<I, K, V>(&self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: IntoParamValues,
    {
        entries
            .into_iter()
            .fold(self.clone(), |request, (key, values)| {
                request.param(key, values)
            })
    }

    #[must_use]
    pub fn get_body(&self) -> Option<&Value> {
        self.body.as_deref()
    }

    /// Submit `value` as a JSON body.
    #[must_use]
    pub fn body(&self, value: impl Into<Value>) -> Self {
        Self {
            body: Some(Arc::new(value.into())),
            ..self.clone()
        }
    }

    /// Submit any serializable value as a JSON body.
    ///
    /// # Errors
    /// Returns `HttpError::Json` if `value` cannot be represented as JSON.
    pub fn try_body<T: Serialize + ?Sized>(&self, value: &T) -> Result<Self, HttpError> {
        Ok(self.body(serde_json::to_value(value)?))
    }

    /// Replace the preflight hook.
    ///
    /// The hook receives the request right before dispatch and returns the
    /// request to send. Pass `|req| req` to reset it.
    #[must_use]
    pub fn preflight<F>(&self, hook: F) -> Self
    where
        F: Fn(HttpRequest) -> HttpRequest + Send + Sync + 'static,
    {
        Self {
            preflight: Arc::new(hook),
            ..self.clone()
        }
    }

    /// Chain a preflight hook after the current one.
    #[must_use]
    pub fn preflight_and_then<F>(&self, hook: F) -> Self
    where
        F: Fn(HttpRequest) -> HttpRequest + Send + Sync + 'static,
    {
        let before = Arc::clone(&self.preflight);
        Self {
            preflight: Arc::new(move |request: HttpRequest| hook(before(request))),
            ..self.clone()
        }
    }

    /// Replace the postflight hook.
    ///
    /// The hook receives the pending response produced by the interceptor
    /// chain and returns the response handed to the caller, typically a
    /// wrapper implementing [`HttpResponse`](crate::HttpResponse).
    #[must_use]
    pub fn postflight<F, Fut>(&self, hook: F) -> Self
    where
        F: Fn(PendingResponse) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, HttpError>> + Send + 'static,
    {
        Self {
            postflight: Arc::new(move |pending: PendingResponse| -> PendingResponse {
                Box::pin(hook(pending))
            }),
            ..self.clone()
        }
    }

    /// Chain a postflight hook after the current one.
    ///
    /// `hook` receives the pending output of the previous postflight.
    #[must_use]
    pub fn postflight_and_then<F, Fut>(&self, hook: F) -> Self
    where
        F: Fn(PendingResponse) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, HttpError>> + Send + 'static,
    {
        let before = Arc::clone(&self.postflight);
        Self {
            postflight: Arc::new(move |pending: PendingResponse| -> PendingResponse {
                Box::pin(hook(before(pending)))
            }),
            ..self.clone()
        }
    }

    /// Wrap the interceptor chain with `interceptor`.
    ///
    /// Cumulative: there is no way to remove an interceptor. The most
    /// recently added interceptor is the outermost layer. For interceptors
    /// added in the order A, B:
    ///
    /// ```text
    /// B pre -> A pre -> transport -> A post -> B post
    /// ```
    ///
    /// `next.run(request)` proceeds to the inner layer with a (possibly
    /// different) request. Code after the awaited `next.run` also runs when
    /// the inner layers fail.
    ///
    /// ```ignore
    /// HTTP.intercept(|request, next| async move {
    ///     let started = std::time::Instant::now();
    ///     let result = next.run(request).await;
    ///     tracing::info!(elapsed = ?started.elapsed(), "request finished");
    ///     result
    /// });
    /// ```
    #[must_use]
    pub fn intercept<F, Fut>(&self, interceptor: F) -> Self
    where
        F: Fn(HttpRequest, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, HttpError>> + Send + 'static,
    {
        let inner = Arc::clone(&self.interceptor);
        let combined: Interceptor =
            Arc::new(move |request: HttpRequest, proceed: Next| -> PendingResponse {
                let inner = Arc::clone(&inner);
                let next = Next::new(move |next_request: HttpRequest| {
                    inner(next_request, proceed.clone())
                });
                Box::pin(interceptor(request, next))
            });
        Self {
            interceptor: combined,
            ..self.clone()
        }
    }

    /// Effective content type.
    ///
    /// An explicit `Content-Type` header, in any letter case, wins; otherwise
    /// a body means JSON, a POST means a form, and anything else has none.
    #[must_use]
    pub fn get_content_type(&self) -> Option<&str> {
        if let Some(explicit) = self.explicit_content_type() {
            return Some(explicit);
        }
        if self.body.is_some() {
            return Some(JSON_CONTENT_TYPE);
        }
        if self.method == Method::POST {
            return Some(FORM_CONTENT_TYPE);
        }
        None
    }

    /// `Content-Type` header set on this request, matched case-insensitively.
    /// The exact `Content-Type` spelling wins when several are present.
    fn explicit_content_type(&self) -> Option<&str> {
        self.headers
            .get("Content-Type")
            .or_else(|| {
                self.headers
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
                    .map(|(_, value)| value)
            })
            .map(String::as_str)
    }

    /// Whether parameters travel as an `x-www-form-urlencoded` body.
    #[must_use]
    pub fn is_form(&self) -> bool {
        self.get_content_type()
            .is_some_and(|ct| ct.starts_with(FORM_CONTENT_TYPE_PREFIX))
    }

    /// Fully formed URL, with the urlencoded query string unless this is a
    /// form.
    #[must_use]
    pub fn to_url(&self) -> String {
        if self.is_form() {
            return self.url.to_string();
        }
        let query = self.to_search_params();
        if query.is_empty() {
            self.url.to_string()
        } else {
            format!("{}?{query}", self.url)
        }
    }

    /// Parameters flattened to ordered pairs, one pair per value.
    #[must_use]
    pub fn to_search_params(&self) -> SearchParams {
        self.params
            .iter()
            .flat_map(|(key, values)| {
                values
                    .iter()
                    .map(move |value| (key.as_str(), value.as_str()))
            })
            .collect()
    }

    /// Resolve this request into what the transport sends.
    ///
    /// A JSON body is serialized; a form without a body sends its
    /// parameters. The resolved content type is added as a header when none
    /// was set explicitly.
    ///
    /// # Errors
    /// Returns `HttpError::Json` if the body cannot be serialized.
    pub fn to_transport_request(&self) -> Result<TransportRequest, HttpError> {
        let mut headers: Vec<(String, String)> = self
            .headers
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        if self.explicit_content_type().is_none()
            && let Some(content_type) = self.get_content_type()
        {
            headers.push(("Content-Type".to_owned(), content_type.to_owned()));
        }

        let body = match &self.body {
            Some(value) => Some(Bytes::from(serde_json::to_vec(value.as_ref())?)),
            None if self.is_form() => {
                let form = self.to_search_params();
                (!form.is_empty()).then(|| Bytes::from(form.to_string()))
            }
            None => None,
        };

        Ok(TransportRequest {
            method: self.method.clone(),
            url: self.to_url(),
            headers,
            body,
        })
    }

    /// Execute this request.
    ///
    /// Runs the preflight hook now and returns a response immediately. The
    /// interceptor chain, the transport call and the postflight hook run
    /// once, no matter how many accessors are called. Inside a Tokio runtime
    /// they are started right away and run to completion even if the
    /// response is dropped unread; outside one they run when the response is
    /// first awaited. Hooks and transport are the ones configured on this
    /// request; a preflight that returns a request with different hooks does
    /// not change the current dispatch.
    #[must_use]
    pub fn fetch(&self) -> Response {
        let request = (self.preflight)(self.clone());

        let transport = Arc::clone(&self.transport);
        let dispatch = Next::new(move |request: HttpRequest| -> PendingResponse {
            let transport = Arc::clone(&transport);
            Box::pin(async move {
                let descriptor = request.to_transport_request()?;
                tracing::debug!(
                    method = %descriptor.method,
                    url = %descriptor.url,
                    "dispatching request"
                );
                let response = transport.execute(descriptor).await?;
                Ok(response)
            })
        });

        let pending = (self.interceptor)(request, dispatch);
        let pending = (self.postflight)(pending);
        Response::new(ResponseWrapper::new(pending))
    }

    /// Shortcut for `fetch().success()`
    ///
    /// # Errors
    /// Returns `HttpError::HttpStatus` for statuses of 400 and above, or the
    /// transport's error.
    pub async fn success(&self) -> Result<StatusCode, HttpError> {
        self.fetch().success().await
    }

    /// Shortcut for `fetch().json()`
    ///
    /// # Errors
    /// Returns `HttpError::HttpStatus` for statuses of 400 and above, a JSON
    /// decoding error, or the transport's error.
    pub async fn json(&self) -> Result<Value, HttpError> {
        self.fetch().json().await
    }

    /// Shortcut for `fetch().text()`
    ///
    /// # Errors
    /// Returns `HttpError::HttpStatus` for statuses of 400 and above, or the
    /// transport's error.
    pub async fn text(&self) -> Result<Option<String>, HttpError> {
        self.fetch().text().await
    }
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("params", &self.params)
            .field("body", &self.body)
            .finish_non_exhaustive()
    }
}
