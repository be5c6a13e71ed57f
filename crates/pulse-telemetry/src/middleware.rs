use axum::{
    body::Body,
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use crate::metrics::{global_metrics, HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION};

/// Axum middleware that records `api_requests_total` and
/// `api_request_duration_seconds`.
///
/// The `path` label is the matched route template, so unknown URLs all land
/// in a single `unmatched` series.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    let m = global_metrics();
    m.increment_counter(
        HTTP_REQUESTS_TOTAL,
        &[("method", &method), ("path", &path), ("status", &status)],
    );
    m.record_histogram(
        HTTP_REQUEST_DURATION,
        &[("path", &path)],
        start.elapsed().as_secs_f64(),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, middleware, routing::get, Router};
    use tower::ServiceExt;

    #[tokio::test]
    async fn records_matched_route() {
        let app = Router::new()
            .route("/probe/{id}", get(|| async { "ok" }))
            .layer(middleware::from_fn(metrics_middleware));

        let before = global_metrics().get_counter(
            HTTP_REQUESTS_TOTAL,
            &[("method", "GET"), ("path", "/probe/{id}"), ("status", "200")],
        );
        let resp = app
            .oneshot(Request::builder().uri("/probe/7").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let after = global_metrics().get_counter(
            HTTP_REQUESTS_TOTAL,
            &[("method", "GET"), ("path", "/probe/{id}"), ("status", "200")],
        );
        assert_eq!(after, before + 1);
    }
}
