use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use pulse_core::aggregate::{aggregate, StatusBuckets};

use super::state::ApiState;
use crate::api_error::ApiError;

/// Dashboard roll-up over the current board contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    pub total_initiatives: usize,
    pub status_breakdown: StatusBuckets,
    pub status_counts: BTreeMap<String, usize>,
    pub department_breakdown: BTreeMap<String, usize>,
    pub team_breakdown: BTreeMap<String, usize>,
    #[serde(rename = "totalROI")]
    pub total_roi: f64,
    pub last_updated: String,
}

/// GET /api/metrics
pub(crate) async fn get_dashboard_metrics(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<DashboardMetrics>, ApiError> {
    let items = state.initiatives().await?;
    let agg = aggregate(&items);
    Ok(Json(DashboardMetrics {
        total_initiatives: agg.total_initiatives,
        status_breakdown: agg.status_buckets,
        status_counts: agg.status_counts,
        department_breakdown: agg.department_counts,
        team_breakdown: agg.team_counts,
        total_roi: agg.total_roi,
        last_updated: chrono::Utc::now().to_rfc3339(),
    }))
}
