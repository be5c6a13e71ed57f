mod normalize;

pub use normalize::normalize_board;

use std::fmt;
use std::time::{Duration, Instant};

use pulse_core::config::{BoardColumns, BoardConfig, CredentialProvider};
use pulse_core::types::Initiative;
use pulse_telemetry::metrics::{
    global_metrics, BOARD_INITIATIVES, UPSTREAM_REQUESTS_TOTAL, UPSTREAM_REQUEST_DURATION,
};
use pulse_telemetry::tracing_setup::upstream_span;
use reqwest::header::AUTHORIZATION;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn, Instrument};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors from the board GraphQL API. All of them surface as an upstream
/// failure to HTTP callers.
#[derive(Debug, Error)]
pub enum BoardError {
    /// The API answered with a GraphQL `errors` list or an `error_message`.
    #[error("board API error: {0}")]
    Api(String),

    /// Non-2xx response without a readable error payload.
    #[error("board API returned HTTP {0}")]
    Status(u16),

    /// The response parsed as JSON but lacks the expected structure.
    #[error("malformed board response: {0}")]
    Malformed(String),

    #[error("missing board API token")]
    MissingApiToken,

    #[error("missing board id")]
    MissingBoardId,

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Transport failure, including the request timeout.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, BoardError>;

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// All groups of one board, each with its first page of items.
pub const BOARD_QUERY: &str = r#"query ($boardIds: [ID!], $limit: Int!) {
  boards(ids: $boardIds) {
    groups {
      id
      title
      items_page(limit: $limit) {
        items {
          id
          name
          column_values { id text }
        }
      }
    }
  }
}"#;

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct BoardClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
    board_id: String,
    page_size: u32,
    columns: BoardColumns,
}

impl fmt::Debug for BoardClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoardClient")
            .field("api_url", &self.api_url)
            .field("token", &"<redacted>")
            .field("board_id", &self.board_id)
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl BoardClient {
    pub fn new(config: &BoardConfig, token: &str) -> Result<Self> {
        if token.trim().is_empty() {
            return Err(BoardError::MissingApiToken);
        }
        let board_id = config
            .board_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(BoardError::MissingBoardId)?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            token: token.trim().to_string(),
            board_id: board_id.to_string(),
            page_size: config.page_size,
            columns: config.columns.clone(),
        })
    }

    /// Build a client with the token read from the env var named in config.
    pub fn from_env(config: &BoardConfig) -> Result<Self> {
        let token = CredentialProvider::board_token(config).ok_or(BoardError::MissingApiToken)?;
        Self::new(config, &token)
    }

    pub fn board_id(&self) -> &str {
        &self.board_id
    }

    /// Fetch the board and flatten it into initiatives, in group order.
    ///
    /// One request per call; no retries.
    pub async fn fetch_initiatives(&self) -> Result<Vec<Initiative>> {
        let start = Instant::now();
        let result = self.fetch_board().instrument(upstream_span("board")).await;

        let m = global_metrics();
        let outcome = if result.is_ok() { "ok" } else { "error" };
        m.increment_counter(
            UPSTREAM_REQUESTS_TOTAL,
            &[("source", "board"), ("outcome", outcome)],
        );
        m.record_histogram(
            UPSTREAM_REQUEST_DURATION,
            &[("source", "board")],
            start.elapsed().as_secs_f64(),
        );
        match &result {
            Ok(items) => {
                m.set_gauge(BOARD_INITIATIVES, items.len() as i64);
                debug!(count = items.len(), "board fetched");
            }
            Err(e) => warn!(error = %e, "board fetch failed"),
        }
        result
    }

    async fn fetch_board(&self) -> Result<Vec<Initiative>> {
        let variables = json!({
            "boardIds": [self.board_id],
            "limit": self.page_size,
        });
        let body = self.graphql(BOARD_QUERY, variables).await?;

        let boards = body
            .pointer("/data/boards")
            .and_then(Value::as_array)
            .ok_or_else(|| BoardError::Malformed("response has no data.boards".into()))?;
        if boards.is_empty() {
            return Err(BoardError::Api(format!("board {} not found", self.board_id)));
        }
        normalize_board(&body, &self.columns)
    }

    async fn graphql(&self, query: &str, variables: Value) -> Result<Value> {
        let payload = json!({ "query": query, "variables": variables });

        let resp = self
            .http
            .post(&self.api_url)
            .header(AUTHORIZATION, self.token.as_str())
            .json(&payload)
            .send()
            .await?;

        let status = resp.status();
        let body: Value = match resp.json().await {
            Ok(body) => body,
            Err(_) if !status.is_success() => return Err(BoardError::Status(status.as_u16())),
            Err(e) => return Err(BoardError::Http(e)),
        };

        if let Some(message) = api_error_message(&body) {
            return Err(BoardError::Api(message));
        }
        if !status.is_success() {
            return Err(BoardError::Status(status.as_u16()));
        }
        Ok(body)
    }
}

/// Error text from either payload style the API uses: a GraphQL `errors`
/// list, or a top-level `error_message`.
fn api_error_message(body: &Value) -> Option<String> {
    if let Some(errors) = body.get("errors").filter(|e| !e.is_null()) {
        let messages: Vec<&str> = errors
            .as_array()
            .map(|arr| arr.iter().filter_map(|e| e["message"].as_str()).collect())
            .unwrap_or_default();
        return Some(if messages.is_empty() {
            errors.to_string()
        } else {
            messages.join("; ")
        });
    }
    body.get("error_message")
        .and_then(Value::as_str)
        .map(str::to_string)
}
