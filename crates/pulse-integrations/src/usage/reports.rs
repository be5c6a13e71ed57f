use std::collections::HashSet;
use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use pulse_core::config::{CredentialProvider, ReportsConfig};
use pulse_core::types::UsageSnapshot;
use pulse_telemetry::metrics::{global_metrics, UPSTREAM_REQUESTS_TOTAL, UPSTREAM_REQUEST_DURATION};
use pulse_telemetry::tracing_setup::upstream_span;
use serde_json::Value;
use tracing::{debug, warn, Instrument};

use super::weekly::{build_snapshot, complete_weeks, Activity, WeekActivity, WeekPeriod};
use super::{UsageError, UsageSource};

const SOURCE: &str = "reports_api";

/// Queries the activity reports API directly and builds the snapshot
/// in-process.
#[derive(Clone)]
pub struct ReportsUsageSource {
    http: reqwest::Client,
    config: ReportsConfig,
    token: Option<String>,
}

impl fmt::Debug for ReportsUsageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportsUsageSource")
            .field("api_url", &self.config.api_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ReportsUsageSource {
    /// A missing token is not a construction error; fetches report the
    /// source as unavailable instead.
    pub fn new(config: ReportsConfig, token: Option<String>) -> Result<Self, UsageError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| {
                warn!(error = %e, "failed to build reports HTTP client");
                UsageError::Unavailable("reports client could not be created".into())
            })?;
        Ok(Self {
            http,
            config,
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    /// Token read from the env var named in `config.token_env`.
    pub fn from_env(config: &ReportsConfig) -> Result<Self, UsageError> {
        Self::new(config.clone(), CredentialProvider::reports_token(config))
    }

    /// Snapshot of every complete week as of `now`.
    pub async fn fetch_at(&self, now: DateTime<Utc>) -> Result<UsageSnapshot, UsageError> {
        let start = Instant::now();
        let result = self.collect(now).instrument(upstream_span(SOURCE)).await;

        let outcome = if result.is_ok() { "ok" } else { "unavailable" };
        let m = global_metrics();
        m.increment_counter(UPSTREAM_REQUESTS_TOTAL, &[("source", SOURCE), ("outcome", outcome)]);
        m.record_histogram(
            UPSTREAM_REQUEST_DURATION,
            &[("source", SOURCE)],
            start.elapsed().as_secs_f64(),
        );
        result
    }

    async fn collect(&self, now: DateTime<Utc>) -> Result<UsageSnapshot, UsageError> {
        let Some(token) = self.token.as_deref() else {
            return Err(UsageError::Unavailable(
                "reports API token is not configured".into(),
            ));
        };
        let (anchor, available_from) = self
            .config
            .anchor_date()
            .and_then(|a| Ok((a, self.config.available_from_date()?)))
            .map_err(|e| {
                warn!(error = %e, "invalid reports week configuration");
                UsageError::Unavailable("reports week configuration is invalid".into())
            })?;

        let tracked: HashSet<&str> = self.config.tracked_apps.iter().map(String::as_str).collect();
        let mut weeks = Vec::new();
        for period in complete_weeks(anchor, available_from, now) {
            let activities = self.fetch_week(&period, token, &tracked).await?;
            debug!(week = %period.label(), activities = activities.len(), "week fetched");
            weeks.push(WeekActivity { period, activities });
        }
        Ok(build_snapshot(&weeks, now))
    }

    async fn fetch_week(
        &self,
        period: &WeekPeriod,
        token: &str,
        tracked: &HashSet<&str>,
    ) -> Result<Vec<Activity>, UsageError> {
        let start_time = period.start.to_rfc3339_opts(SecondsFormat::Secs, true);
        let end_time = period.end.to_rfc3339_opts(SecondsFormat::Secs, true);
        let max_results = self.config.max_results.to_string();

        let mut activities = Vec::new();
        let mut page_token: Option<String> = None;
        for page in 1..=self.config.max_pages {
            let mut request = self
                .http
                .get(&self.config.api_url)
                .bearer_auth(token)
                .query(&[
                    ("eventName", self.config.event_name.as_str()),
                    ("maxResults", max_results.as_str()),
                    ("startTime", start_time.as_str()),
                    ("endTime", end_time.as_str()),
                ]);
            if let Some(t) = &page_token {
                request = request.query(&[("pageToken", t.as_str())]);
            }

            let response = request.send().await.map_err(|e| {
                warn!(error = %e, "reports API request failed");
                UsageError::Unavailable("reports API is unreachable".into())
            })?;
            let status = response.status();
            if !status.is_success() {
                warn!(status = status.as_u16(), "reports API returned an error status");
                return Err(UsageError::Unavailable(format!(
                    "reports API returned HTTP {}",
                    status.as_u16()
                )));
            }
            let body: Value = response.json().await.map_err(|e| {
                warn!(error = %e, "reports API returned invalid JSON");
                UsageError::Unavailable("reports API returned an unreadable response".into())
            })?;

            activities.extend(parse_activities(&body, tracked));

            page_token = body["nextPageToken"]
                .as_str()
                .filter(|t| !t.is_empty())
                .map(str::to_string);
            if page_token.is_none() {
                break;
            }
            if page == self.config.max_pages {
                warn!(pages = page, "reports page limit reached, week is truncated");
            }
        }
        Ok(activities)
    }
}

#[async_trait]
impl UsageSource for ReportsUsageSource {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn fetch(&self) -> Result<UsageSnapshot, UsageError> {
        self.fetch_at(Utc::now()).await
    }
}

/// Flatten one activities page into events for the tracked apps.
pub fn parse_activities(page: &Value, tracked: &HashSet<&str>) -> Vec<Activity> {
    let mut out = Vec::new();
    for item in page["items"].as_array().into_iter().flatten() {
        let user = item["actor"]["email"].as_str().unwrap_or("Unknown");
        for event in item["events"].as_array().into_iter().flatten() {
            let param = |name| event_param(event, name);
            let app = param("app_name").unwrap_or("Unknown");
            if !tracked.contains(app) {
                continue;
            }
            out.push(Activity {
                user_email: user.to_string(),
                app_name: app.to_string(),
                action: param("action").unwrap_or("Unknown").to_string(),
                event_category: param("event_category").unwrap_or("Unknown").to_string(),
            });
        }
    }
    out
}

fn event_param<'a>(event: &'a Value, name: &str) -> Option<&'a str> {
    event["parameters"]
        .as_array()?
        .iter()
        .find(|p| p["name"].as_str() == Some(name))?["value"]
        .as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(app: &str, action: &str) -> Value {
        json!({
            "name": "feature_utilization",
            "parameters": [
                { "name": "app_name", "value": app },
                { "name": "action", "value": action },
                { "name": "event_category", "value": "active" },
            ]
        })
    }

    #[test]
    fn filters_untracked_apps() {
        let page = json!({
            "items": [
                { "actor": { "email": "a@x.com" }, "events": [event("gmail", "summarize"), event("keep", "x")] },
                { "actor": { "email": "b@x.com" }, "events": [event("docs", "draft")] },
                { "actor": {}, "events": [{ "parameters": [] }] },
            ]
        });
        let tracked: HashSet<&str> = ["gmail", "docs"].into_iter().collect();
        let acts = parse_activities(&page, &tracked);
        assert_eq!(acts.len(), 2);
        assert_eq!(acts[0].user_email, "a@x.com");
        assert_eq!(acts[0].action, "summarize");
        assert_eq!(acts[1].app_name, "docs");
    }

    #[test]
    fn empty_page_has_no_activities() {
        let tracked: HashSet<&str> = ["gmail"].into_iter().collect();
        assert!(parse_activities(&json!({}), &tracked).is_empty());
    }

    #[tokio::test]
    async fn missing_token_is_unavailable() {
        let source = ReportsUsageSource::new(ReportsConfig::default(), Some("  ".into())).unwrap();
        let err = source.fetch().await.unwrap_err();
        assert_eq!(
            err,
            UsageError::Unavailable("reports API token is not configured".into())
        );
    }

    #[test]
    fn debug_redacts_token() {
        let source =
            ReportsUsageSource::new(ReportsConfig::default(), Some("ya29.secret".into())).unwrap();
        assert!(!format!("{source:?}").contains("ya29.secret"));
    }
}
