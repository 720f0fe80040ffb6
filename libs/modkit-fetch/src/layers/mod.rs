//! Tower layers of the [`HyperTransport`](crate::HyperTransport) stack
//!
//! - [`UserAgentLayer`] - adds a User-Agent header unless the request has one
//! - [`OtelLayer`] - opens an `outgoing_http` span per transport call

mod otel;
mod user_agent;

pub use otel::{OtelLayer, OtelService};
pub use user_agent::{UserAgentLayer, UserAgentService};
