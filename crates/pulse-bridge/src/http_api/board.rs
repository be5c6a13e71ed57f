use std::sync::Arc;

use axum::{extract::State, Json};

use pulse_core::types::Initiative;

use super::state::ApiState;
use crate::api_error::ApiError;

/// GET /api/board -- flattened initiatives in board order.
pub(crate) async fn list_initiatives(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<Vec<Initiative>>, ApiError> {
    Ok(Json(state.initiatives().await?))
}
