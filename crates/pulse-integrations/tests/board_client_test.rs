//! Board client against a mock GraphQL endpoint served by axum.

use std::sync::{Arc, Mutex};

use axum::{http::HeaderMap, http::StatusCode, routing::post, Json, Router};
use pulse_core::config::BoardConfig;
use pulse_integrations::board::{BoardClient, BoardError};
use serde_json::{json, Value};

// ===========================================================================
// Helpers
// ===========================================================================

#[derive(Debug, Clone, Default)]
struct Captured {
    authorization: Option<String>,
    body: Value,
}

/// Serve `body` with `status` for every POST and record what was sent.
async fn start_mock(status: StatusCode, body: Value) -> (String, Arc<Mutex<Vec<Captured>>>) {
    let seen: Arc<Mutex<Vec<Captured>>> = Arc::default();
    let recorder = seen.clone();
    let app = Router::new().route(
        "/v2",
        post(move |headers: HeaderMap, Json(req): Json<Value>| {
            let recorder = recorder.clone();
            let body = body.clone();
            async move {
                recorder.lock().unwrap().push(Captured {
                    authorization: headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string),
                    body: req,
                });
                (status, Json(body))
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind to ephemeral port");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}/v2"), seen)
}

fn client_for(url: &str) -> BoardClient {
    let config = BoardConfig {
        api_url: url.to_string(),
        board_id: Some("4242".into()),
        request_timeout_secs: 5,
        ..BoardConfig::default()
    };
    BoardClient::new(&config, "test-token").expect("valid client")
}

fn board_payload() -> Value {
    json!({
        "data": { "boards": [{ "groups": [
            { "id": "g1", "title": "Active", "items_page": { "items": [
                { "id": "1", "name": "Ticket router", "column_values": [
                    { "id": "status", "text": "Backlog" },
                    { "id": "function", "text": "IT" },
                    { "id": "roi", "text": "100" }
                ]},
                { "id": "2", "name": "Expense OCR", "column_values": [
                    { "id": "status", "text": "Done" },
                    { "id": "function", "text": "" },
                    { "id": "roi", "text": "" }
                ]}
            ]}}
        ]}]},
        "account_id": 1
    })
}

// ===========================================================================
// Tests
// ===========================================================================

#[tokio::test]
async fn fetch_sends_one_authorized_query() {
    let (url, seen) = start_mock(StatusCode::OK, board_payload()).await;
    let client = client_for(&url);

    let items = client.fetch_initiatives().await.expect("fetch succeeds");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].name, "Ticket router");
    assert_eq!(items[0].roi, 100.0);
    assert_eq!(items[1].status, "Done");
    assert_eq!(items[1].roi, 0.0);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].authorization.as_deref(), Some("test-token"));
    assert_eq!(seen[0].body["variables"]["boardIds"], json!(["4242"]));
    assert_eq!(seen[0].body["variables"]["limit"], 100);
    assert!(seen[0].body["query"]
        .as_str()
        .unwrap()
        .contains("column_values { id text }"));
}

#[tokio::test]
async fn unchanged_board_yields_identical_lists() {
    let (url, _) = start_mock(StatusCode::OK, board_payload()).await;
    let client = client_for(&url);

    let first = client.fetch_initiatives().await.unwrap();
    let second = client.fetch_initiatives().await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn graphql_errors_are_api_errors() {
    let body = json!({ "errors": [{ "message": "Board not accessible" }] });
    let (url, _) = start_mock(StatusCode::OK, body).await;

    let err = client_for(&url).fetch_initiatives().await.unwrap_err();
    match err {
        BoardError::Api(msg) => assert_eq!(msg, "Board not accessible"),
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn error_message_payload_on_401() {
    let body = json!({ "error_message": "Not Authenticated", "status_code": 401 });
    let (url, _) = start_mock(StatusCode::UNAUTHORIZED, body).await;

    let err = client_for(&url).fetch_initiatives().await.unwrap_err();
    assert!(matches!(err, BoardError::Api(ref m) if m == "Not Authenticated"));
}

#[tokio::test]
async fn bare_server_error_is_status_error() {
    let (url, _) = start_mock(StatusCode::BAD_GATEWAY, json!({})).await;

    let err = client_for(&url).fetch_initiatives().await.unwrap_err();
    assert!(matches!(err, BoardError::Status(502)));
}

#[tokio::test]
async fn unknown_board_is_reported() {
    let (url, _) = start_mock(StatusCode::OK, json!({ "data": { "boards": [] } })).await;

    let err = client_for(&url).fetch_initiatives().await.unwrap_err();
    assert!(err.to_string().contains("4242"));
}

#[tokio::test]
async fn missing_data_is_malformed() {
    let (url, _) = start_mock(StatusCode::OK, json!({ "account_id": 1 })).await;

    let err = client_for(&url).fetch_initiatives().await.unwrap_err();
    assert!(matches!(err, BoardError::Malformed(_)));
}

#[tokio::test]
async fn unreachable_endpoint_is_http_error() {
    // Bind then drop to get a port nobody listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client_for(&format!("http://{addr}/v2"))
        .fetch_initiatives()
        .await
        .unwrap_err();
    assert!(matches!(err, BoardError::Http(_)));
}
