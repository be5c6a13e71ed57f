use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{error, info};

use pulse_bridge::http_api::{api_router, ApiState};
use pulse_core::config::{Config, CredentialProvider};
use pulse_core::shutdown::ShutdownSignal;

/// Owns the API state and the shutdown signal for one server lifetime.
pub struct Daemon {
    config: Config,
    shutdown: ShutdownSignal,
    api_state: Arc<ApiState>,
}

impl Daemon {
    pub fn new(config: Config) -> Self {
        let shutdown = ShutdownSignal::new();
        Self::with_state(
            config.clone(),
            ApiState::from_config(config, shutdown.clone()),
            shutdown,
        )
    }

    /// Serve a pre-built state. The state must share `shutdown` for
    /// subprocess cancellation to follow the server.
    pub fn with_state(config: Config, state: ApiState, shutdown: ShutdownSignal) -> Self {
        Self {
            config,
            shutdown,
            api_state: Arc::new(state),
        }
    }

    pub fn shutdown_handle(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Bind `server.host:server.port` and serve until shutdown.
    pub async fn run(&self) -> Result<()> {
        let bind_addr = self.config.server.bind_addr();
        let listener = TcpListener::bind(&bind_addr)
            .await
            .with_context(|| format!("failed to bind {bind_addr}"))?;
        self.run_with_listener(listener).await
    }

    /// Serve on an already-bound listener until the shutdown signal fires.
    ///
    /// In-flight requests are allowed to finish; analytics subprocesses
    /// observe the same signal and are killed.
    pub async fn run_with_listener(&self, listener: TcpListener) -> Result<()> {
        let addr: SocketAddr = listener.local_addr()?;
        info!(
            %addr,
            sources = ?CredentialProvider::available_sources(&self.config),
            "API server listening"
        );

        let router = api_router(self.api_state.clone());
        let shutdown = self.shutdown.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.triggered().await })
            .await
            .map_err(|e| {
                error!(error = %e, "API server error");
                anyhow::Error::from(e)
            })?;

        info!("API server stopped");
        Ok(())
    }
}

/// Trigger `shutdown` on ctrl-c, or SIGTERM on unix.
pub async fn wait_for_signal(shutdown: ShutdownSignal) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!(signal = "ctrl_c", "shutdown requested"),
        _ = terminate => info!(signal = "sigterm", "shutdown requested"),
    }
    shutdown.trigger();
}
