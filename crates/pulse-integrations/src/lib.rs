//! Upstream adapters for initiative-pulse.
//!
//! - [`board`]: GraphQL client for the project-tracking board
//! - [`usage`]: usage-analytics sources (external script, reports API, static)

pub mod board;
pub mod usage;
