use axum::{response::IntoResponse, Json};

use pulse_telemetry::metrics::global_metrics;

/// GET /api/telemetry/prometheus -- service counters in Prometheus text format.
pub(crate) async fn get_telemetry_prometheus() -> impl IntoResponse {
    let body = global_metrics().export_prometheus();
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        body,
    )
}

/// GET /api/telemetry -- the same counters as JSON.
pub(crate) async fn get_telemetry_json() -> impl IntoResponse {
    Json(global_metrics().export_json())
}
