pub mod aggregate;
pub mod cache;
pub mod config;
pub mod shutdown;
pub mod types;
