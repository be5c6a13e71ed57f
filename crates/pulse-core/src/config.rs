use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Env var that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "PULSE_CONFIG";

/// Top-level configuration loaded from `~/.initiative-pulse/config.toml`.
///
/// **Security**: this struct never stores API tokens. Config only names the
/// env var holding each secret; [`CredentialProvider`] resolves them at
/// runtime. The analytics credentials *file path* is configuration, but it is
/// only ever handed to the analytics process and never echoed in responses.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub board: BoardConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Config {
    /// Load config from `$PULSE_CONFIG` or `~/.initiative-pulse/config.toml`,
    /// falling back to defaults when the file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(path)
        } else {
            tracing::info!(path = %path.display(), "no config file found, using defaults");
            let cfg = Config::default();
            cfg.validate()?;
            Ok(cfg)
        }
    }

    /// Load from a specific path.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let cfg: Config = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        self.validate()?;
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Semantic validation for settings that are not fully expressible via type checks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.general.validate()?;
        self.board.validate()?;
        self.analytics.validate()?;
        if self.dashboard.refresh_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "dashboard.refresh_interval_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            if !path.is_empty() {
                return PathBuf::from(path);
            }
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".initiative-pulse")
            .join("config.toml")
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(String),
    #[error("parse: {0}")]
    Parse(String),
    #[error("validation: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Section structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

impl GeneralConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "general.service_name must not be empty".into(),
            ));
        }
        Ok(())
    }
}

fn default_service_name() -> String {
    "initiative-pulse".into()
}
fn default_log_level() -> String {
    "info".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    /// Extra CORS origins on top of localhost.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            allowed_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_server_host() -> String {
    "127.0.0.1".into()
}
fn default_server_port() -> u16 {
    3001
}

/// Stable column identifiers on the board, one per initiative field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardColumns {
    #[serde(default = "col_status")]
    pub status: String,
    #[serde(default = "col_function")]
    pub function: String,
    #[serde(default = "col_team")]
    pub team: String,
    #[serde(default = "col_roi")]
    pub roi: String,
    #[serde(default = "col_hours_saved")]
    pub hours_saved: String,
    #[serde(default = "col_external_spend_saved")]
    pub external_spend_saved: String,
    #[serde(default = "col_complexity")]
    pub complexity: String,
    #[serde(default = "col_start_date")]
    pub start_date: String,
    #[serde(default = "col_target_date")]
    pub target_date: String,
}

impl Default for BoardColumns {
    fn default() -> Self {
        Self {
            status: col_status(),
            function: col_function(),
            team: col_team(),
            roi: col_roi(),
            hours_saved: col_hours_saved(),
            external_spend_saved: col_external_spend_saved(),
            complexity: col_complexity(),
            start_date: col_start_date(),
            target_date: col_target_date(),
        }
    }
}

fn col_status() -> String {
    "status".into()
}
fn col_function() -> String {
    "function".into()
}
fn col_team() -> String {
    "team".into()
}
fn col_roi() -> String {
    "roi".into()
}
fn col_hours_saved() -> String {
    "hours_saved".into()
}
fn col_external_spend_saved() -> String {
    "external_spend_saved".into()
}
fn col_complexity() -> String {
    "complexity".into()
}
fn col_start_date() -> String {
    "start_date".into()
}
fn col_target_date() -> String {
    "target_date".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    /// GraphQL endpoint of the board service.
    #[serde(default = "default_board_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub board_id: Option<String>,
    /// Env var name for the board API token (default: `BOARD_API_TOKEN`).
    #[serde(default = "default_board_token_env")]
    pub token_env: String,
    /// Items requested per group.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub columns: BoardColumns,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            api_url: default_board_api_url(),
            board_id: None,
            token_env: default_board_token_env(),
            page_size: default_page_size(),
            request_timeout_secs: default_request_timeout(),
            columns: BoardColumns::default(),
        }
    }
}

impl BoardConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=500).contains(&self.page_size) {
            return Err(ConfigError::Validation(format!(
                "board.page_size must be between 1 and 500, got {}",
                self.page_size
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "board.request_timeout_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

fn default_board_api_url() -> String {
    "https://api.monday.com/v2".into()
}
fn default_board_token_env() -> String {
    "BOARD_API_TOKEN".into()
}
fn default_page_size() -> u32 {
    100
}
fn default_request_timeout() -> u64 {
    30
}

/// Where usage analytics come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticsSource {
    /// Spawn the external analytics script.
    #[default]
    Script,
    /// Query the reports API in-process.
    ReportsApi,
    /// Always serve the unavailable placeholder.
    Disabled,
}

/// How to launch one analytics script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptConfig {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub working_dir: Option<String>,
    #[serde(default = "default_script_timeout")]
    pub timeout_secs: u64,
    /// Additional non-secret environment for the child.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl ScriptConfig {
    pub fn python(script: &str) -> Self {
        Self {
            program: default_program(),
            args: vec![script.to_string()],
            working_dir: None,
            timeout_secs: default_script_timeout(),
            env: BTreeMap::new(),
        }
    }

    fn validate(&self, section: &str) -> Result<(), ConfigError> {
        if self.program.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "{section}.program must not be empty"
            )));
        }
        if !(1..=300).contains(&self.timeout_secs) {
            return Err(ConfigError::Validation(format!(
                "{section}.timeout_secs must be between 1 and 300, got {}",
                self.timeout_secs
            )));
        }
        Ok(())
    }
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self::python("gemini_tracker.py")
    }
}

fn default_program() -> String {
    "python3".into()
}
fn default_script_timeout() -> u64 {
    30
}

/// Settings for querying the analytics reports API directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportsConfig {
    #[serde(default = "default_reports_url")]
    pub api_url: String,
    /// Env var holding a pre-issued bearer token.
    #[serde(default = "default_reports_token_env")]
    pub token_env: String,
    #[serde(default = "default_event_name")]
    pub event_name: String,
    /// Monday the weekly grid is anchored to (`YYYY-MM-DD`).
    #[serde(default = "default_anchor")]
    pub week_anchor: String,
    /// Weeks are clamped to start no earlier than this date.
    #[serde(default = "default_available_from")]
    pub available_from: String,
    #[serde(default = "default_tracked_apps")]
    pub tracked_apps: Vec<String>,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            api_url: default_reports_url(),
            token_env: default_reports_token_env(),
            event_name: default_event_name(),
            week_anchor: default_anchor(),
            available_from: default_available_from(),
            tracked_apps: default_tracked_apps(),
            max_pages: default_max_pages(),
            max_results: default_max_results(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ReportsConfig {
    pub fn anchor_date(&self) -> Result<NaiveDate, ConfigError> {
        parse_date("analytics.reports.week_anchor", &self.week_anchor)
    }

    pub fn available_from_date(&self) -> Result<NaiveDate, ConfigError> {
        parse_date("analytics.reports.available_from", &self.available_from)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.anchor_date()?;
        self.available_from_date()?;
        if self.max_pages == 0 {
            return Err(ConfigError::Validation(
                "analytics.reports.max_pages must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| {
        ConfigError::Validation(format!("{field} must be YYYY-MM-DD, got '{raw}': {e}"))
    })
}

fn default_reports_url() -> String {
    "https://admin.googleapis.com/admin/reports/v1/activity/users/all/applications/gemini_in_workspace_apps".into()
}
fn default_reports_token_env() -> String {
    "ANALYTICS_ACCESS_TOKEN".into()
}
fn default_event_name() -> String {
    "feature_utilization".into()
}
fn default_anchor() -> String {
    "2025-06-16".into()
}
fn default_available_from() -> String {
    "2025-06-20".into()
}
fn default_tracked_apps() -> Vec<String> {
    [
        "gemini_app",
        "gmail",
        "docs",
        "sheets",
        "slides",
        "meet",
        "drive",
        "chat",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_max_pages() -> u32 {
    15
}
fn default_max_results() -> u32 {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default)]
    pub source: AnalyticsSource,
    /// Path to the service-account credentials file, handed to the script.
    #[serde(default)]
    pub credentials_file: Option<String>,
    /// Administrative identity the analytics account impersonates.
    #[serde(default)]
    pub admin_email: Option<String>,
    #[serde(default)]
    pub script: ScriptConfig,
    /// Optional per-app/per-action breakdown script.
    #[serde(default)]
    pub deep_dive: Option<ScriptConfig>,
    #[serde(default)]
    pub reports: ReportsConfig,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            source: AnalyticsSource::default(),
            credentials_file: None,
            admin_email: None,
            script: ScriptConfig::default(),
            deep_dive: None,
            reports: ReportsConfig::default(),
        }
    }
}

impl AnalyticsConfig {
    /// Both pieces of identity the analytics account needs are present.
    pub fn has_credentials(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.credentials_file) && present(&self.admin_email)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.script.validate("analytics.script")?;
        if let Some(deep_dive) = &self.deep_dive {
            deep_dive.validate("analytics.deep_dive")?;
        }
        self.reports.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Polling cadence advertised to the presentation layer.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval(),
        }
    }
}

fn default_refresh_interval() -> u64 {
    300
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Board response TTL; `0` disables caching.
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
        }
    }
}

fn default_cache_ttl() -> u64 {
    60
}

// ---------------------------------------------------------------------------
// Credential provider
// ---------------------------------------------------------------------------

/// Reads credentials from environment variables at runtime.
///
/// Config stores env var *names*; this provider resolves them to values on
/// demand. Empty values count as unset.
pub struct CredentialProvider;

impl CredentialProvider {
    /// Read a credential from a named env var.
    pub fn from_env(var_name: &str) -> Option<String> {
        std::env::var(var_name).ok().filter(|v| !v.trim().is_empty())
    }

    pub fn board_token(cfg: &BoardConfig) -> Option<String> {
        Self::from_env(&cfg.token_env)
    }

    pub fn reports_token(cfg: &ReportsConfig) -> Option<String> {
        Self::from_env(&cfg.token_env)
    }

    /// Names of the upstreams that currently have credentials available.
    pub fn available_sources(cfg: &Config) -> Vec<&'static str> {
        let mut sources = Vec::new();
        if Self::board_token(&cfg.board).is_some() {
            sources.push("board");
        }
        if cfg.analytics.has_credentials() {
            sources.push("analytics_script");
        }
        if Self::reports_token(&cfg.analytics.reports).is_some() {
            sources.push("reports_api");
        }
        sources
    }
}
