//! Integration tests for status classification

mod common;

use common::snoop;
use http::StatusCode;
use modkit_fetch::HttpError;

#[tokio::test]
async fn checked_accessor_fails_from_400() {
    let err = snoop().param("status", "400").success().await.unwrap_err();

    assert!(matches!(err, HttpError::HttpStatus { .. }));
    assert_eq!(err.status_code(), Some(StatusCode::BAD_REQUEST));
    assert_eq!(err.to_string(), "Error 400: Bad Request");

    let json = err.response().unwrap().json_raw().await.unwrap();
    assert_eq!(json["query"], "status=400");
}

#[tokio::test]
async fn every_checked_accessor_fails() {
    let response = snoop().param("status", "503").fetch();

    assert!(response.json().await.is_err());
    assert!(response.text().await.is_err());
    assert!(response.blob().await.is_err());
    assert!(response.succeed().await.is_err());
}

#[tokio::test]
async fn raw_accessors_never_fail_on_status() {
    let response = snoop().param("status", "500").fetch();

    assert_eq!(
        response.status().await.unwrap(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
    assert_eq!(response.json_raw().await.unwrap()["method"], "GET");
    assert!(response.text_raw().await.unwrap().is_some());
}

#[tokio::test]
async fn redirect_class_is_success() {
    let status = snoop().param("status", "302").success().await.unwrap();
    assert_eq!(status, StatusCode::FOUND);
}

#[tokio::test]
async fn transport_errors_propagate_unchanged() {
    let err = snoop().url("not a url").json().await.unwrap_err();
    assert!(matches!(err, HttpError::InvalidUri { .. }), "got: {err:?}");
}
