mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use serde_json::json;
use shop_api::rate_limiter::{RateLimitConfig, RateLimiter};
use std::time::Duration;
use tower::ServiceExt;

use common::TestApp;

#[tokio::test]
async fn unknown_routes_are_reported_with_their_path() {
    let app = TestApp::new().await;

    let reply = app.get("/api/v1/nowhere", None).await;

    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.body["status"], "fail");
    assert_eq!(
        reply.body["message"],
        "Can't find /api/v1/nowhere on this server!"
    );
}

#[tokio::test]
async fn health_reports_database_status() {
    let app = TestApp::new().await;

    let reply = app.get("/health", None).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["status"], "up");
    assert_eq!(reply.body["database"]["status"], "up");
}

#[tokio::test]
async fn bad_path_ids_and_malformed_json_are_bad_requests() {
    let app = TestApp::new().await;

    let bad_id = app.get("/api/v1/products/abc", None).await;
    assert_eq!(bad_id.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad_id.body["message"], "Invalid value (abc) in path");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/users/signup")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"name\": "))
        .unwrap();
    let malformed = app.send(request).await;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);
    assert!(malformed.body["message"]
        .as_str()
        .unwrap()
        .starts_with("Invalid input data."));
}

#[tokio::test]
async fn production_envelope_hides_error_details() {
    let app = TestApp::new().await;

    let reply = app.get("/api/v1/categories/00000000-0000-0000-0000-000000000000", None).await;

    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert!(reply.body.get("error").is_none());
    assert!(reply.body.get("stack").is_none());
}

#[tokio::test]
async fn development_envelope_adds_error_kind() {
    let app = TestApp::with_environment("development").await;

    let reply = app.get("/api/v1/categories/00000000-0000-0000-0000-000000000000", None).await;

    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.body["status"], "fail");
    assert!(reply.body.get("error").is_some());
}

#[tokio::test]
async fn responses_carry_request_and_rate_limit_headers() {
    let app = TestApp::new().await;

    let reply = app.get("/api/v1/categories", None).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.headers.contains_key("x-request-id"));
    assert!(reply.headers.contains_key("x-ratelimit-limit"));
    assert!(reply.headers.contains_key("x-ratelimit-remaining"));
}

#[tokio::test]
async fn api_requests_over_the_limit_are_rejected() {
    let app = TestApp::new().await;
    let limiter = RateLimiter::in_memory(RateLimitConfig {
        requests_per_window: 2,
        window_duration: Duration::from_secs(60),
        enable_headers: true,
    });
    let router = shop_api::app_router(app.state.clone(), limiter);

    let mut statuses = Vec::new();
    for _ in 0..3 {
        let request = Request::builder()
            .uri("/api/v1/categories")
            .header("x-forwarded-for", "203.0.113.7")
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        statuses.push(response.status());
    }

    assert_eq!(
        statuses,
        vec![StatusCode::OK, StatusCode::OK, StatusCode::TOO_MANY_REQUESTS]
    );
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = TestApp::new().await;

    let reply = app.get(shop_api::openapi::OPENAPI_JSON_PATH, None).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["info"]["title"], "Shop API");
    assert!(reply.body["paths"].get("/api/v1/users/signup").is_some());
}

#[tokio::test]
async fn oversized_json_bodies_are_rejected() {
    let app = TestApp::new().await;
    let limit = app.state.config.max_body_bytes;

    let reply = app
        .post(
            "/api/v1/users/signup",
            json!({ "name": "x".repeat(limit + 1) }),
            None,
        )
        .await;

    assert!(reply.status.is_client_error());
    assert_eq!(reply.body["status"], "fail");
}
