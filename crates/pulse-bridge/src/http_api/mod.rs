//! JSON API consumed by the dashboard front end.

mod board;
mod health;
pub mod metrics;
pub mod state;
mod telemetry;
#[cfg(test)]
mod tests;
mod usage;

pub use metrics::DashboardMetrics;
pub use state::ApiState;

pub use self::router::api_router;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

mod router {
    use std::sync::Arc;

    use axum::{
        http::{header, HeaderValue, Method},
        middleware as axum_middleware,
        routing::get,
        Router,
    };
    use tower_http::cors::{AllowOrigin, CorsLayer};

    use pulse_telemetry::middleware::metrics_middleware;
    use pulse_telemetry::tracing_setup::request_id_middleware;

    use super::state::ApiState;
    use super::{board, health, metrics, telemetry, usage};
    use crate::origin::is_allowed_origin;

    /// Build the API router with request-id, metrics and CORS layers.
    ///
    /// Browser origins on localhost (any port) are always allowed; anything
    /// else must appear verbatim in `server.allowed_origins`.
    pub fn api_router(state: Arc<ApiState>) -> Router {
        let allowed_origins = state.config.server.allowed_origins.clone();

        Router::new()
            .route("/api/health", get(health::health))
            .route("/api/config", get(health::client_config))
            .route("/api/board", get(board::list_initiatives))
            .route("/api/metrics", get(metrics::get_dashboard_metrics))
            .route("/api/usage", get(usage::get_usage))
            .route("/api/usage/deep-dive", get(usage::get_deep_dive))
            .route("/api/telemetry", get(telemetry::get_telemetry_json))
            .route(
                "/api/telemetry/prometheus",
                get(telemetry::get_telemetry_prometheus),
            )
            .layer(axum_middleware::from_fn(metrics_middleware))
            .layer(axum_middleware::from_fn(request_id_middleware))
            .layer(
                CorsLayer::new()
                    .allow_origin(AllowOrigin::predicate(
                        move |origin: &HeaderValue, _request_parts: &axum::http::request::Parts| {
                            origin
                                .to_str()
                                .is_ok_and(|origin| is_allowed_origin(origin, &allowed_origins))
                        },
                    ))
                    .allow_methods([Method::GET, Method::OPTIONS])
                    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
            )
            .with_state(state)
    }
}
