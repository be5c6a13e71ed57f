use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use pulse_core::cache::TtlCache;
use pulse_core::config::{AnalyticsSource, Config};
use pulse_core::shutdown::ShutdownSignal;
use pulse_core::types::Initiative;
use pulse_integrations::board::BoardClient;
use pulse_integrations::usage::{
    ReportsUsageSource, ScriptRunner, ScriptUsageSource, StaticUsageSource, UsageSource,
};

use crate::api_error::ApiError;

/// Shared state handed to every handler.
///
/// Built once at startup from explicit configuration; nothing in here reads
/// the environment after construction.
pub struct ApiState {
    pub config: Config,
    board: Option<BoardClient>,
    usage: Arc<dyn UsageSource>,
    deep_dive: Option<ScriptRunner>,
    board_cache: TtlCache<Vec<Initiative>>,
    pub shutdown: ShutdownSignal,
    pub started_at: Instant,
}

impl ApiState {
    pub fn new(config: Config, board: Option<BoardClient>, usage: Arc<dyn UsageSource>) -> Self {
        let board_cache = TtlCache::new(Duration::from_secs(config.cache.ttl_secs));
        Self {
            config,
            board,
            usage,
            deep_dive: None,
            board_cache,
            shutdown: ShutdownSignal::new(),
            started_at: Instant::now(),
        }
    }

    pub fn with_deep_dive(mut self, runner: ScriptRunner) -> Self {
        self.deep_dive = Some(runner);
        self
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Wire every upstream from `config`. Missing credentials are not fatal:
    /// the affected endpoints answer 503 or serve placeholders instead.
    pub fn from_config(config: Config, shutdown: ShutdownSignal) -> Self {
        let board = match BoardClient::from_env(&config.board) {
            Ok(client) => {
                info!(board_id = client.board_id(), "board client configured");
                Some(client)
            }
            Err(e) => {
                warn!(error = %e, "board client disabled");
                None
            }
        };

        let usage: Arc<dyn UsageSource> = match config.analytics.source {
            AnalyticsSource::Script => Arc::new(ScriptUsageSource::from_config(
                &config.analytics,
                shutdown.clone(),
            )),
            AnalyticsSource::ReportsApi => {
                match ReportsUsageSource::from_env(&config.analytics.reports) {
                    Ok(source) => Arc::new(source),
                    Err(e) => {
                        warn!(error = %e, "reports source disabled");
                        Arc::new(StaticUsageSource::unavailable(
                            "reports API source could not be created",
                        ))
                    }
                }
            }
            AnalyticsSource::Disabled => Arc::new(StaticUsageSource::unavailable(
                "analytics source is disabled",
            )),
        };
        info!(source = usage.name(), "usage source configured");

        let deep_dive = config.analytics.deep_dive.as_ref().map(|script| {
            ScriptRunner::for_analytics(&config.analytics, script).with_shutdown(shutdown.clone())
        });

        let mut state = Self::new(config, board, usage).with_shutdown(shutdown);
        state.deep_dive = deep_dive;
        state
    }

    /// Current board contents, served from the response cache when fresh.
    pub async fn initiatives(&self) -> Result<Vec<Initiative>, ApiError> {
        let board = self
            .board
            .as_ref()
            .ok_or_else(|| ApiError::Unavailable("board API is not configured".into()))?;
        let items = self
            .board_cache
            .get_or_try_fetch(|| board.fetch_initiatives())
            .await?;
        Ok(items)
    }

    pub fn usage_source(&self) -> &dyn UsageSource {
        self.usage.as_ref()
    }

    pub fn deep_dive(&self) -> Option<&ScriptRunner> {
        self.deep_dive.as_ref()
    }
}
