//! HTTP surface of initiative-pulse.
//!
//! - [`http_api`]: axum router, shared state and JSON handlers
//! - [`api_error`]: error-to-response mapping
//! - [`origin`]: CORS origin allowlist

pub mod api_error;
pub mod http_api;
pub mod origin;
