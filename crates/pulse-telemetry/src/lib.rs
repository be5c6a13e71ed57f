//! Observability for the initiative-pulse service.
//!
//! - **Logging**: human-readable or JSON output via `tracing-subscriber`
//! - **Metrics**: in-process counters, gauges and histograms with Prometheus export
//! - **Middleware**: axum layers for request metrics and `x-request-id` correlation

pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod tracing_setup;
