use std::sync::Arc;

use axum::{extract::State, Json};

use pulse_core::types::{AnalyticsReport, DeepDiveReport, UsageSnapshot};
use pulse_integrations::usage::fetch_or_placeholder;

use super::state::ApiState;
use crate::api_error::ApiError;

/// GET /api/usage -- weekly usage snapshot.
///
/// Unavailability is answered with a 200 placeholder; only a contract
/// violation surfaces as an error.
pub(crate) async fn get_usage(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<UsageSnapshot>, ApiError> {
    let snapshot = fetch_or_placeholder(state.usage_source()).await?;
    Ok(Json(snapshot))
}

/// GET /api/usage/deep-dive -- per-app and per-action breakdown.
pub(crate) async fn get_deep_dive(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<DeepDiveReport>, ApiError> {
    let report = match state.deep_dive() {
        Some(runner) => runner.fetch_report::<DeepDiveReport>().await?,
        None => DeepDiveReport::placeholder("deep-dive script is not configured"),
    };
    Ok(Json(report))
}
