use std::sync::Arc;

use axum::{extract::State, Json};
use serde_json::json;

use super::state::ApiState;

pub(crate) async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// GET /api/config -- client-side settings the dashboard polls with.
pub(crate) async fn client_config(State(state): State<Arc<ApiState>>) -> Json<serde_json::Value> {
    Json(json!({
        "refreshIntervalSecs": state.config.dashboard.refresh_interval_secs,
    }))
}
