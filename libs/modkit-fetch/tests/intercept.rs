//! Integration tests for the interceptor chain

mod common;

use common::snoop;
use modkit_fetch::{BufferedResponse, HttpError, HttpRequest, Next, PendingResponse, Response};
use parking_lot::Mutex;
use std::sync::Arc;

type Log = Arc<Mutex<Vec<u32>>>;

/// Interceptor recording `pre` before and `post` after its continuation,
/// whatever the outcome.
fn recording(
    log: &Log,
    pre: u32,
    post: u32,
) -> impl Fn(HttpRequest, Next) -> PendingResponse + Send + Sync + 'static {
    let log = Arc::clone(log);
    move |request: HttpRequest, next: Next| -> PendingResponse {
        let log = Arc::clone(&log);
        Box::pin(async move {
            log.lock().push(pre);
            let result = next.run(request).await;
            log.lock().push(post);
            result
        })
    }
}

/// Postflight recording `marker` once the previous stage settles.
fn recording_postflight(
    log: &Log,
    marker: u32,
) -> impl Fn(PendingResponse) -> PendingResponse + Send + Sync + 'static {
    let log = Arc::clone(log);
    move |pending: PendingResponse| -> PendingResponse {
        let log = Arc::clone(&log);
        Box::pin(async move {
            let result = pending.await;
            log.lock().push(marker);
            result
        })
    }
}

/// Preflight recording `marker`.
fn recording_preflight(
    log: &Log,
    marker: u32,
) -> impl Fn(HttpRequest) -> HttpRequest + Send + Sync + 'static {
    let log = Arc::clone(log);
    move |request: HttpRequest| {
        log.lock().push(marker);
        request
    }
}

#[tokio::test]
async fn fires_in_the_right_order_with_preflight_and_postflight() {
    let log: Log = Arc::default();

    snoop()
        .param("foo", "bar")
        .preflight_and_then(recording_preflight(&log, 1))
        .preflight_and_then(recording_preflight(&log, 2))
        .intercept(recording(&log, 4, 5))
        .intercept(recording(&log, 3, 6))
        .postflight_and_then(recording_postflight(&log, 7))
        .postflight_and_then(recording_postflight(&log, 8))
        .fetch()
        .succeed()
        .await
        .unwrap();

    assert_eq!(*log.lock(), vec![1, 2, 3, 4, 5, 6, 7, 8]);
}

#[tokio::test]
async fn post_logic_runs_on_failure() {
    let log: Log = Arc::default();

    let result = snoop()
        .url("not a url")
        .intercept(recording(&log, 2, 3))
        .intercept(recording(&log, 1, 4))
        .json()
        .await;

    assert!(matches!(result, Err(HttpError::InvalidUri { .. })));
    assert_eq!(*log.lock(), vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn runs_to_completion_when_response_is_dropped() {
    let log: Log = Arc::default();

    drop(
        snoop()
            .post()
            .param("event", "fired")
            .intercept(recording(&log, 1, 2))
            .postflight_and_then(recording_postflight(&log, 3))
            .fetch(),
    );

    for _ in 0..100 {
        if log.lock().len() == 3 {
            break;
        }
        tokio::task::yield_now().await;
    }

    assert_eq!(*log.lock(), vec![1, 2, 3]);
}

#[tokio::test]
async fn interceptor_can_replace_the_request() {
    let result = snoop()
        .param("foo", "bar")
        .intercept(|request, next| next.run(request.param("foo", "intercepted")))
        .json()
        .await
        .unwrap();

    assert_eq!(result["queryParams"]["foo"], "intercepted");
}

#[tokio::test]
async fn outer_interceptor_sees_inner_result() {
    let result = snoop()
        .intercept(|request, next| next.run(request.header("X-Inner", "1")))
        .intercept(|request, next| async move {
            let response = next.run(request).await?;
            let echo = response.json_raw().await?;
            assert_eq!(echo["headers"]["X-Inner"], "1");
            Ok::<Response, HttpError>(response)
        })
        .json()
        .await
        .unwrap();

    assert_eq!(result["headers"]["X-Inner"], "1");
}

#[tokio::test]
async fn interceptor_can_short_circuit() {
    let result = snoop()
        .intercept(|_request, _next| async {
            Ok::<_, HttpError>(Response::new(BufferedResponse::new(
                http::StatusCode::OK,
                "cached",
            )))
        })
        .text()
        .await
        .unwrap();

    assert_eq!(result.as_deref(), Some("cached"));
}

#[tokio::test]
async fn continuation_can_be_called_twice() {
    let attempts = Arc::new(Mutex::new(0_u32));
    let counter = Arc::clone(&attempts);

    let status = snoop()
        .param("status", "503")
        .intercept(move |request, next| {
            let counter = Arc::clone(&counter);
            async move {
                let first = next.run(request.clone()).await?;
                *counter.lock() += 1;
                if first.status().await? == http::StatusCode::SERVICE_UNAVAILABLE {
                    *counter.lock() += 1;
                    return next.run(request.param("status", None::<&str>)).await;
                }
                Ok(first)
            }
        })
        .success()
        .await
        .unwrap();

    assert_eq!(status, http::StatusCode::OK);
    assert_eq!(*attempts.lock(), 2);
}
