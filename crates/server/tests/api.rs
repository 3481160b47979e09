//! Integration tests for the HTTP surface: routing, authentication, and
//! request validation. Nothing here talks to a real upstream — every
//! request is rejected before the gateway would reach out.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use server::{build_router, GatewayConfig, ServerState};

fn test_state() -> Arc<ServerState> {
    let mut config = GatewayConfig::default();
    config.http.api_keys.insert("test-api-key".to_string());
    config.http.rate_limit_per_minute = 1000; // High limit for tests

    Arc::new(ServerState::new(config, None).expect("Failed to create test state"))
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_check_is_public() {
    let app = build_router(test_state());
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "aigate-server");
}

#[tokio::test]
async fn readiness_reports_components() {
    let app = build_router(test_state());
    let response = app
        .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["components"]["embeddings"], "ready");
    // No search endpoint configured in the default config.
    assert_eq!(json["components"]["search_relay"], "unconfigured");
}

#[tokio::test]
async fn api_info_lists_endpoints() {
    let app = build_router(test_state());
    let response = app
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let endpoints = json["endpoints"].as_array().unwrap();
    assert!(endpoints.iter().any(|e| e == "/api/v1/generate/stream"));
    assert!(endpoints.iter().any(|e| e == "/api/v1/embed"));
}

#[tokio::test]
async fn unknown_route_is_structured_404() {
    let app = build_router(test_state());
    let response = app
        .oneshot(Request::get("/api/v1/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn protected_route_requires_api_key() {
    let app = build_router(test_state());
    let response = app
        .oneshot(
            Request::post("/api/v1/embed")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"texts":["hello"]}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "AUTH_FAILED");
}

#[tokio::test]
async fn invalid_api_key_is_rejected() {
    let app = build_router(test_state());
    let response = app
        .oneshot(
            Request::post("/api/v1/embed")
                .header("x-api-key", "wrong-key")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"texts":["hello"]}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn embed_rejects_empty_batch() {
    let app = build_router(test_state());
    let response = app
        .oneshot(
            Request::post("/api/v1/embed")
                .header("x-api-key", "test-api-key")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"texts":[]}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn embed_rejects_blank_entries() {
    let app = build_router(test_state());
    let response = app
        .oneshot(
            Request::post("/api/v1/embed")
                .header("x-api-key", "test-api-key")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"texts":["ok", "   "]}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn generate_stream_rejects_empty_messages() {
    let app = build_router(test_state());
    let response = app
        .oneshot(
            Request::post("/api/v1/generate/stream")
                .header("x-api-key", "test-api-key")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"messages":[]}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn search_stream_rejects_blank_query() {
    let app = build_router(test_state());
    let response = app
        .oneshot(
            Request::post("/api/v1/search/stream")
                .header("x-api-key", "test-api-key")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"query":"  "}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn metrics_route_answers_without_recorder() {
    let app = build_router(test_state());
    let response = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn state_validates_keys_and_rate_limits() {
    let state = test_state();

    assert!(state.is_valid_api_key("test-api-key"));
    assert!(!state.is_valid_api_key("invalid-key"));
    assert!(state.check_rate_limit("test-api-key"));
}

#[tokio::test]
async fn rate_limit_exhausts() {
    let mut config = GatewayConfig::default();
    config.http.api_keys.insert("limited".to_string());
    config.http.rate_limit_per_minute = 2;
    let state = Arc::new(ServerState::new(config, None).unwrap());

    assert!(state.check_rate_limit("limited"));
    assert!(state.check_rate_limit("limited"));
    assert!(!state.check_rate_limit("limited"));
}
