// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::engines::reqwest_engine::ReqwestEngine;
use crate::engines::traits::{EngineError, FetchEngine, FetchRequest};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn start_test_server() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string("<html><body>Test content</body></html>"),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/error"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    server
}

fn engine() -> ReqwestEngine {
    ReqwestEngine::new("mangacrawl-test", 100).unwrap()
}

#[tokio::test]
async fn test_reqwest_engine_basic_fetch() {
    let server = start_test_server().await;

    let response = engine()
        .fetch(&FetchRequest::get(
            format!("{}/test", server.uri()),
            Duration::from_secs(10),
        ))
        .await
        .unwrap();

    assert_eq!(response.status_code, 200);
    assert!(response.content.contains("Test content"));
    assert!(response.content_type.contains("text/html"));
}

#[tokio::test]
async fn test_server_error_is_retryable() {
    let server = start_test_server().await;

    let err = engine()
        .fetch(&FetchRequest::get(
            format!("{}/error", server.uri()),
            Duration::from_secs(10),
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::HttpStatus(503)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_not_found_is_not_retryable() {
    let server = start_test_server().await;

    let err = engine()
        .fetch(&FetchRequest::get(
            format!("{}/missing", server.uri()),
            Duration::from_secs(10),
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::HttpStatus(404)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_timeout_is_retryable() {
    let server = start_test_server().await;

    let err = engine()
        .fetch(&FetchRequest::get(
            format!("{}/slow", server.uri()),
            Duration::from_millis(200),
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Timeout));
    assert!(err.is_retryable());
}

#[test]
fn test_reqwest_engine_name() {
    assert_eq!(engine().name(), "reqwest");
}
