//! Hook types threaded through [`HttpRequest::fetch`].
//!
//! Stage order for one `fetch()`:
//!
//! ```text
//! preflight (sync) -> interceptor chain -> transport
//!                                   <- interceptor post-logic
//!                  -> postflight chain -> ResponseWrapper
//! ```
//!
//! [`HttpRequest::fetch`]: crate::HttpRequest::fetch

use crate::request::HttpRequest;
use crate::response::PendingResponse;
use std::fmt;
use std::sync::Arc;

pub type Preflight = Arc<dyn Fn(HttpRequest) -> HttpRequest + Send + Sync>;

pub type Postflight = Arc<dyn Fn(PendingResponse) -> PendingResponse + Send + Sync>;

pub type Interceptor = Arc<dyn Fn(HttpRequest, Next) -> PendingResponse + Send + Sync>;

type Proceed = Arc<dyn Fn(HttpRequest) -> PendingResponse + Send + Sync>;

/// Continuation handed to an interceptor.
///
/// `run` invokes the next inner layer (ultimately the transport) with a
/// possibly different request. It can be called again, e.g. to retry.
#[derive(Clone)]
pub struct Next {
    proceed: Proceed,
}

impl Next {
    pub fn new<F>(proceed: F) -> Self
    where
        F: Fn(HttpRequest) -> PendingResponse + Send + Sync + 'static,
    {
        Self {
            proceed: Arc::new(proceed),
        }
    }

    /// Continue the chain with `request`.
    pub fn run(&self, request: HttpRequest) -> PendingResponse {
        (self.proceed)(request)
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next").finish_non_exhaustive()
    }
}

#[must_use]
pub fn identity_preflight() -> Preflight {
    Arc::new(|request: HttpRequest| request)
}

#[must_use]
pub fn identity_postflight() -> Postflight {
    Arc::new(|pending: PendingResponse| pending)
}

#[must_use]
pub fn passthrough_interceptor() -> Interceptor {
    Arc::new(|request: HttpRequest, next: Next| next.run(request))
}
