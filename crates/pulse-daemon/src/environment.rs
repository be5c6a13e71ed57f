use std::path::PathBuf;

use anyhow::{Context, Result};

use pulse_core::config::{Config, LogFormat};
use pulse_telemetry::logging::Format;

/// Load `.env` from the working directory (or a parent) into the process
/// environment. Variables already set are left untouched.
///
/// Returns the file that was loaded, if any.
pub fn load_dotenv() -> Option<PathBuf> {
    dotenv::dotenv().ok()
}

/// Resolve and validate the service configuration.
pub fn load_config() -> Result<Config> {
    let path = Config::default_path();
    Config::load().with_context(|| format!("failed to load config from {}", path.display()))
}

pub fn log_format(config: &Config) -> Format {
    match config.general.log_format {
        LogFormat::Human => Format::Human,
        LogFormat::Json => Format::Json,
    }
}
