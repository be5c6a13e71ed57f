use tracing_subscriber::{fmt, EnvFilter};

/// Output format for the process-wide subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Human,
    Json,
}

/// Install the global subscriber in the requested format.
///
/// `RUST_LOG` wins over `default_level` when it is set. Safe to call more
/// than once; only the first call installs a subscriber.
pub fn init(service_name: &str, default_level: &str, format: Format) {
    match format {
        Format::Human => init_logging(service_name, default_level),
        Format::Json => init_logging_json(service_name, default_level),
    }
}

/// Human-readable output for local runs.
pub fn init_logging(service_name: &str, default_level: &str) {
    fmt()
        .with_env_filter(env_filter(default_level))
        .with_target(true)
        .with_level(true)
        .try_init()
        .ok();

    tracing::info!(service = service_name, "logging initialised (human-readable)");
}

/// One JSON object per line, for log shippers.
pub fn init_logging_json(service_name: &str, default_level: &str) {
    fmt()
        .json()
        .with_env_filter(env_filter(default_level))
        .with_target(true)
        .with_current_span(true)
        .with_level(true)
        .try_init()
        .ok();

    tracing::info!(service = service_name, "logging initialised (json)");
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_a_no_op() {
        init("pulse-test", "debug", Format::Human);
        init("pulse-test", "debug", Format::Json);
        tracing::info!("still logging");
    }
}
