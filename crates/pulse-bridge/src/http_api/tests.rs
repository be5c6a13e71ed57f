use super::*;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::sync::Arc;
use tower::ServiceExt;

use pulse_core::config::Config;
use pulse_core::types::{AnalyticsReport, UsageSnapshot, UsageStatus};
use pulse_integrations::usage::{StaticUsageSource, UsageError};

fn test_app_with(usage: StaticUsageSource) -> axum::Router {
    let state = Arc::new(ApiState::new(Config::default(), None, Arc::new(usage)));
    router::api_router(state)
}

fn test_app() -> axum::Router {
    test_app_with(StaticUsageSource::unavailable("analytics credentials are not configured"))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_shape() {
    let response = test_app().oneshot(get("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn test_config_exposes_refresh_interval() {
    let response = test_app().oneshot(get("/api/config")).await.unwrap();
    let json = body_json(response).await;
    assert_eq!(json["refreshIntervalSecs"], 300);
}

#[tokio::test]
async fn test_board_without_client_is_503() {
    let response = test_app().oneshot(get("/api/board")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(response).await;
    assert_eq!(json["error"], "board API is not configured");
}

#[tokio::test]
async fn test_metrics_without_client_is_503() {
    let response = test_app().oneshot(get("/api/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_usage_unavailable_serves_placeholder() {
    let response = test_app().oneshot(get("/api/usage")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "unavailable");
    assert_eq!(json["summary"]["total_cumulative_users"], 0);
}

#[tokio::test]
async fn test_usage_contract_violation_is_502() {
    let app = test_app_with(StaticUsageSource::failing(UsageError::ContractViolation(
        "output is not JSON".into(),
    )));
    let response = app.oneshot(get("/api/usage")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("output is not JSON"));
}

#[tokio::test]
async fn test_usage_passes_snapshot_through() {
    let mut snapshot = UsageSnapshot::placeholder("unused");
    snapshot.status = UsageStatus::Live;
    snapshot.detail = None;
    snapshot.summary.total_cumulative_users = 42;
    let app = test_app_with(StaticUsageSource::new(snapshot));

    let response = app.oneshot(get("/api/usage")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["summary"]["total_cumulative_users"], 42);
}

#[tokio::test]
async fn test_deep_dive_without_script_is_placeholder() {
    let response = test_app().oneshot(get("/api/usage/deep-dive")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "unavailable");
}

#[tokio::test]
async fn test_prometheus_content_type() {
    let response = test_app()
        .oneshot(get("/api/telemetry/prometheus"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn test_unknown_route_is_404_with_request_id() {
    let response = test_app().oneshot(get("/api/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_cors_allows_localhost_origin() {
    let req = Request::builder()
        .method("GET")
        .uri("/api/health")
        .header("origin", "http://localhost:5173")
        .body(Body::empty())
        .unwrap();
    let response = test_app().oneshot(req).await.unwrap();
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "http://localhost:5173"
    );
}

#[tokio::test]
async fn test_cors_rejects_unlisted_origin() {
    let req = Request::builder()
        .method("GET")
        .uri("/api/health")
        .header("origin", "https://evil.example")
        .body(Body::empty())
        .unwrap();
    let response = test_app().oneshot(req).await.unwrap();
    assert!(!response
        .headers()
        .contains_key("access-control-allow-origin"));
}

#[tokio::test]
async fn test_cors_rejects_localhost_lookalike_origin() {
    let req = Request::builder()
        .method("GET")
        .uri("/api/board")
        .header("origin", "http://localhost.attacker.example")
        .body(Body::empty())
        .unwrap();
    let response = test_app().oneshot(req).await.unwrap();
    assert!(!response
        .headers()
        .contains_key("access-control-allow-origin"));
}

#[tokio::test]
async fn test_cors_allows_configured_origin() {
    let mut config = Config::default();
    config.server.allowed_origins = vec!["https://dash.example.com".into()];
    let state = Arc::new(ApiState::new(
        config,
        None,
        Arc::new(StaticUsageSource::unavailable("disabled")),
    ));
    let req = Request::builder()
        .method("GET")
        .uri("/api/health")
        .header("origin", "https://dash.example.com")
        .body(Body::empty())
        .unwrap();
    let response = router::api_router(state).oneshot(req).await.unwrap();
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "https://dash.example.com"
    );
}
