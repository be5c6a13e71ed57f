//! Process wiring for the initiative-pulse service.
//!
//! - [`environment`]: `.env` loading and config resolution
//! - [`daemon`]: owns the API state and serves it until shutdown

pub mod daemon;
pub mod environment;
