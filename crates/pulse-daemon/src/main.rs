//! initiative-pulse daemon: serves the dashboard JSON API.

use anyhow::Result;
use tracing::info;

use pulse_daemon::daemon::{wait_for_signal, Daemon};
use pulse_daemon::environment;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<()> {
    let env_file = environment::load_dotenv();
    let config = environment::load_config()?;

    pulse_telemetry::logging::init(
        &config.general.service_name,
        &config.general.log_level,
        environment::log_format(&config),
    );
    if let Some(path) = env_file {
        info!(path = %path.display(), "loaded environment file");
    }
    info!(version = env!("CARGO_PKG_VERSION"), "initiative-pulse starting");

    let daemon = Daemon::new(config);
    tokio::spawn(wait_for_signal(daemon.shutdown_handle()));

    daemon.run().await?;
    info!("initiative-pulse stopped");
    Ok(())
}
