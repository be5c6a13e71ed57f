use std::collections::BTreeMap;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Initiative
// ---------------------------------------------------------------------------

/// One row of the tracking board, flattened out of its group.
///
/// Rebuilt from the board on every fetch. Free-text columns are passed through
/// untouched; only `roi` is interpreted (see [`parse_roi`]).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Initiative {
    pub id: String,
    pub name: String,
    /// Title of the board group the item was listed under.
    pub group: String,
    pub status: String,
    pub function: String,
    pub team: String,
    pub roi: f64,
    pub hours_saved: String,
    pub external_spend_saved: String,
    pub complexity: String,
    pub start_date: String,
    pub target_date: String,
}

/// Parse the display text of the ROI column.
///
/// Anything that is not a finite, positive number (empty text, garbage,
/// `NaN`, `inf`, negatives) becomes `0.0`.
pub fn parse_roi(text: &str) -> f64 {
    match text.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => value,
        _ => 0.0,
    }
}

// ---------------------------------------------------------------------------
// Report status
// ---------------------------------------------------------------------------

/// Whether an analytics report came from a live fetch or is a stand-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageStatus {
    #[default]
    Live,
    Unavailable,
}

/// The analytics output broke its shape contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {reason}")]
pub struct ShapeError {
    pub field: &'static str,
    pub reason: String,
}

impl ShapeError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Behaviour shared by every JSON report produced by an analytics source.
///
/// The subprocess runner is generic over this trait so the usage snapshot and
/// the deep-dive report go through one parse/degrade path.
pub trait AnalyticsReport: DeserializeOwned + Serialize + Send + 'static {
    /// Zeroed report flagged [`UsageStatus::Unavailable`].
    fn placeholder(detail: &str) -> Self;

    /// Fill derivable gaps and check structural invariants.
    fn normalize(&mut self) -> Result<(), ShapeError>;

    /// In-band failure the producer reported about itself, if any.
    fn reported_error(&self) -> Option<String>;

    fn status(&self) -> UsageStatus;
}

/// Interprets the loosely-typed `error` field analytics scripts emit on
/// failure (`true`, or an error message).
pub fn describe_reported_error(value: Option<&serde_json::Value>) -> Option<String> {
    match value {
        Some(serde_json::Value::Bool(true)) => Some("analytics source reported an error".into()),
        Some(serde_json::Value::String(msg)) if !msg.trim().is_empty() => Some(msg.clone()),
        _ => None,
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

// ---------------------------------------------------------------------------
// UsageSnapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageSummary {
    pub total_cumulative_users: u64,
    pub latest_week_activities: u64,
    pub latest_week_users: u64,
    pub total_weeks_tracked: u64,
}

/// Parallel per-week sequences, oldest week first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageTimeSeries {
    pub weeks: Vec<String>,
    pub total_weekly_users: Vec<u64>,
    pub weekly_unique_users: Vec<u64>,
    pub weekly_activities: Vec<u64>,
    /// One entry per consecutive pair of weeks.
    pub wow_growth_percent: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeekBreakdown {
    pub actions: BTreeMap<String, u64>,
    pub categories: BTreeMap<String, u64>,
    pub top_users: Vec<String>,
}

/// Point-in-time summary of tool-adoption analytics.
///
/// Field names follow the analytics script's output verbatim so the same
/// struct parses the script and serves the HTTP response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub summary: UsageSummary,
    #[serde(default)]
    pub time_series: UsageTimeSeries,
    #[serde(default)]
    pub latest_week_breakdown: WeekBreakdown,
    #[serde(default)]
    pub status: UsageStatus,
    #[serde(default)]
    pub data_source: String,
    #[serde(default)]
    pub last_updated: Option<String>,
    /// Operator-facing reason when `status` is unavailable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, rename = "error", skip_serializing)]
    pub reported_error: Option<serde_json::Value>,
}

impl AnalyticsReport for UsageSnapshot {
    fn placeholder(detail: &str) -> Self {
        Self {
            summary: UsageSummary::default(),
            time_series: UsageTimeSeries::default(),
            latest_week_breakdown: WeekBreakdown::default(),
            status: UsageStatus::Unavailable,
            data_source: "unavailable".into(),
            last_updated: Some(now_rfc3339()),
            detail: Some(detail.to_string()),
            reported_error: None,
        }
    }

    fn normalize(&mut self) -> Result<(), ShapeError> {
        let ts = &mut self.time_series;
        let weeks = ts.weeks.len();

        // Older script revisions only emit unique users; with a single
        // tracked tool the total equals the unique count.
        if ts.total_weekly_users.is_empty() && !ts.weekly_unique_users.is_empty() {
            ts.total_weekly_users = ts.weekly_unique_users.clone();
        }

        let series: [(&'static str, usize); 3] = [
            ("time_series.total_weekly_users", ts.total_weekly_users.len()),
            ("time_series.weekly_unique_users", ts.weekly_unique_users.len()),
            ("time_series.weekly_activities", ts.weekly_activities.len()),
        ];
        for (field, len) in series {
            // An absent series is tolerated only for the empty snapshot.
            if len != weeks && !(len == 0 && weeks == 0) {
                return Err(ShapeError::new(
                    field,
                    format!("expected {weeks} entries, got {len}"),
                ));
            }
        }

        let expected_growth = weeks.saturating_sub(1);
        if ts.wow_growth_percent.len() != expected_growth {
            return Err(ShapeError::new(
                "time_series.wow_growth_percent",
                format!(
                    "expected {expected_growth} entries, got {}",
                    ts.wow_growth_percent.len()
                ),
            ));
        }
        if ts.wow_growth_percent.iter().any(|g| !g.is_finite()) {
            return Err(ShapeError::new(
                "time_series.wow_growth_percent",
                "contains a non-finite value",
            ));
        }
        Ok(())
    }

    fn reported_error(&self) -> Option<String> {
        describe_reported_error(self.reported_error.as_ref())
    }

    fn status(&self) -> UsageStatus {
        self.status
    }
}

// ---------------------------------------------------------------------------
// DeepDiveReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeepDiveSummary {
    pub total_apps_used: u64,
    pub total_actions_tracked: u64,
    pub weeks_analyzed: u64,
    pub latest_week_activities: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppUsage {
    pub total_activities: u64,
    pub max_weekly_users: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppAnalysis {
    pub top_apps: BTreeMap<String, AppUsage>,
    pub app_trends: BTreeMap<String, AppUsage>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionAnalysis {
    pub top_actions: BTreeMap<String, u64>,
    pub action_trends: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeeklyTrend {
    pub week: String,
    pub total_activities: u64,
    pub total_users: u64,
}

/// Per-app and per-action breakdown produced by the deep-dive script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeepDiveReport {
    pub summary: DeepDiveSummary,
    #[serde(default)]
    pub app_analysis: AppAnalysis,
    #[serde(default)]
    pub action_analysis: ActionAnalysis,
    #[serde(default)]
    pub weekly_trends: Vec<WeeklyTrend>,
    #[serde(default)]
    pub status: UsageStatus,
    #[serde(default)]
    pub data_source: String,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, rename = "error", skip_serializing)]
    pub reported_error: Option<serde_json::Value>,
}

impl AnalyticsReport for DeepDiveReport {
    fn placeholder(detail: &str) -> Self {
        Self {
            summary: DeepDiveSummary::default(),
            app_analysis: AppAnalysis::default(),
            action_analysis: ActionAnalysis::default(),
            weekly_trends: Vec::new(),
            status: UsageStatus::Unavailable,
            data_source: "unavailable".into(),
            last_updated: Some(now_rfc3339()),
            detail: Some(detail.to_string()),
            reported_error: None,
        }
    }

    fn normalize(&mut self) -> Result<(), ShapeError> {
        let weeks = self.weekly_trends.len() as u64;
        if self.summary.weeks_analyzed != 0 && self.summary.weeks_analyzed != weeks {
            return Err(ShapeError::new(
                "summary.weeks_analyzed",
                format!(
                    "reports {} weeks but weekly_trends has {weeks}",
                    self.summary.weeks_analyzed
                ),
            ));
        }
        Ok(())
    }

    fn reported_error(&self) -> Option<String> {
        describe_reported_error(self.reported_error.as_ref())
    }

    fn status(&self) -> UsageStatus {
        self.status
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
