//! In-memory echo transport shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;
use modkit_fetch::{
    BufferedResponse, HttpError, HttpRequest, HttpTransport, Response, TransportRequest,
};
use serde_json::{Map, Value, json};
use std::sync::Arc;

pub const SNOOP_URL: &str = "https://snoop.test";

/// Echoes the request it receives as a JSON document:
///
/// ```text
/// {method, path, query, queryParams, headers, body}
/// ```
///
/// - path `/204` answers `204 No Content`
/// - a `status` query parameter sets the response status
/// - HEAD answers with an empty body
/// - a JSON request body is echoed parsed, anything else as a string
#[derive(Debug, Default)]
pub struct SnoopTransport;

#[async_trait]
impl HttpTransport for SnoopTransport {
    async fn execute(&self, request: TransportRequest) -> Result<Response, HttpError> {
        let url = url::Url::parse(&request.url).map_err(|e| HttpError::InvalidUri {
            url: request.url.clone(),
            kind: modkit_fetch::InvalidUriKind::ParseError,
            reason: e.to_string(),
        })?;

        if url.path() == "/204" {
            return Ok(Response::new(BufferedResponse::new(
                StatusCode::NO_CONTENT,
                Bytes::new(),
            )));
        }

        let mut query_params = Map::new();
        for (key, value) in url.query_pairs() {
            query_params
                .entry(key.into_owned())
                .or_insert_with(|| Value::String(value.into_owned()));
        }

        let status = query_params
            .get("status")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<u16>().ok())
            .and_then(|code| StatusCode::from_u16(code).ok())
            .unwrap_or(StatusCode::OK);

        if request.method == http::Method::HEAD {
            return Ok(Response::new(BufferedResponse::new(status, Bytes::new())));
        }

        let headers: Map<String, Value> = request
            .headers
            .iter()
            .map(|(name, value)| (name.clone(), Value::String(value.clone())))
            .collect();

        let is_json = request
            .header("content-type")
            .is_some_and(|ct| ct.starts_with("application/json"));
        let body = match &request.body {
            None => Value::Null,
            Some(bytes) if is_json => serde_json::from_slice(bytes)?,
            Some(_) => Value::String(request.body_text()),
        };

        let echo = json!({
            "method": request.method.as_str(),
            "path": url.path(),
            "query": url.query().unwrap_or_default(),
            "queryParams": query_params,
            "headers": headers,
            "body": body,
        });

        Ok(Response::new(BufferedResponse::json(status, &echo)?))
    }
}

/// Request rooted at the echo transport.
pub fn snoop() -> HttpRequest {
    HttpRequest::new(Arc::new(SnoopTransport)).url(SNOOP_URL)
}
