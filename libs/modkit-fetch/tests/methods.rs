//! Integration tests for request methods

mod common;

use common::snoop;

#[tokio::test]
async fn get_is_the_default() {
    let result = snoop().json().await.unwrap();
    assert_eq!(result["method"], "GET");
}

#[tokio::test]
async fn uses_post() {
    let result = snoop().post().json().await.unwrap();
    assert_eq!(result["method"], "POST");
}

#[tokio::test]
async fn uses_put() {
    let result = snoop().put().json().await.unwrap();
    assert_eq!(result["method"], "PUT");
}

#[tokio::test]
async fn uses_delete() {
    let result = snoop().delete().json().await.unwrap();
    assert_eq!(result["method"], "DELETE");
}

#[tokio::test]
async fn uses_patch() {
    let result = snoop().patch().json().await.unwrap();
    assert_eq!(result["method"], "PATCH");
}

#[tokio::test]
async fn head_yields_empty_text() {
    let result = snoop().head().text().await.unwrap();
    assert_eq!(result.as_deref(), Some(""));
}
