//! Fixed-boundary weekly periods and the snapshot builder.
//!
//! Weeks start on a configured anchor and step by seven days, so labels stay
//! stable no matter when the service runs. Only weeks that have fully ended
//! are reported.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use pulse_core::types::{UsageSnapshot, UsageStatus, UsageSummary, UsageTimeSeries, WeekBreakdown};

/// Users listed in the latest-week breakdown.
pub const TOP_USERS_LIMIT: usize = 10;

pub const REPORTS_DATA_SOURCE: &str = "reports_api";

/// A half-open `[start, end)` reporting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl WeekPeriod {
    pub fn label(&self) -> String {
        week_label(self.start, self.end)
    }
}

/// One activity event that passed the app filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activity {
    pub user_email: String,
    pub app_name: String,
    pub action: String,
    pub event_category: String,
}

#[derive(Debug, Clone)]
pub struct WeekActivity {
    pub period: WeekPeriod,
    pub activities: Vec<Activity>,
}

/// Weeks `[anchor + 7n, anchor + 7n + 7)` that ended at or before `now`.
///
/// Weeks ending before `available_from` are skipped; an earlier start is
/// clamped to it.
pub fn complete_weeks(
    anchor: NaiveDate,
    available_from: NaiveDate,
    now: DateTime<Utc>,
) -> Vec<WeekPeriod> {
    let anchor = anchor.and_time(chrono::NaiveTime::MIN).and_utc();
    let available = available_from.and_time(chrono::NaiveTime::MIN).and_utc();
    if now < anchor {
        return Vec::new();
    }

    let weeks_since_anchor = (now - anchor).num_days() / 7;
    (0..=weeks_since_anchor)
        .filter_map(|n| {
            let start = anchor + Duration::weeks(n);
            let end = start + Duration::days(7);
            if end > now || end < available {
                return None;
            }
            Some(WeekPeriod {
                start: start.max(available),
                end,
            })
        })
        .collect()
}

/// `"Jun 16-23"`, `"Jun 30-Jul 07"`, or `"Dec 29, 2025-Jan 05, 2026"`.
pub fn week_label(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    if start.year() != end.year() {
        format!("{}-{}", start.format("%b %d, %Y"), end.format("%b %d, %Y"))
    } else if start.month() != end.month() {
        format!("{}-{}", start.format("%b %d"), end.format("%b %d"))
    } else {
        format!("{}-{}", start.format("%b %d"), end.format("%d"))
    }
}

/// Percentage change rounded to one decimal; `0` when there is no baseline.
pub fn growth_percent(previous: u64, current: u64) -> f64 {
    if previous == 0 {
        return 0.0;
    }
    let growth = (current as f64 - previous as f64) / previous as f64 * 100.0;
    round_one_decimal(growth)
}

/// Ties go to the even digit, decided on the exact binary value (`6.25` ->
/// `6.2`, `0.15` -> `0.1`). Scaling by ten first would round both up.
fn round_one_decimal(value: f64) -> f64 {
    format!("{value:.1}").parse().unwrap_or(value)
}

/// Fold per-week activity into a snapshot. Pure apart from the timestamp it
/// is handed.
pub fn build_snapshot(weeks: &[WeekActivity], generated_at: DateTime<Utc>) -> UsageSnapshot {
    let mut ordered: Vec<&WeekActivity> = weeks.iter().collect();
    ordered.sort_by_key(|w| w.period.start);

    let mut series = UsageTimeSeries::default();
    let mut all_users: BTreeSet<&str> = BTreeSet::new();

    for week in &ordered {
        let users: BTreeSet<&str> = week
            .activities
            .iter()
            .map(|a| a.user_email.as_str())
            .collect();
        let unique = users.len() as u64;
        all_users.extend(users);

        series.weeks.push(week.period.label());
        series.weekly_activities.push(week.activities.len() as u64);
        series.weekly_unique_users.push(unique);
        series.total_weekly_users.push(unique);
    }

    series.wow_growth_percent = series
        .weekly_unique_users
        .windows(2)
        .map(|pair| growth_percent(pair[0], pair[1]))
        .collect();

    let latest = ordered.last();
    let latest_week_breakdown = latest.map(|w| breakdown(&w.activities)).unwrap_or_default();

    let summary = UsageSummary {
        total_cumulative_users: all_users.len() as u64,
        latest_week_activities: series.weekly_activities.last().copied().unwrap_or(0),
        latest_week_users: series.weekly_unique_users.last().copied().unwrap_or(0),
        total_weeks_tracked: series.weeks.len() as u64,
    };

    UsageSnapshot {
        summary,
        time_series: series,
        latest_week_breakdown,
        status: UsageStatus::Live,
        data_source: REPORTS_DATA_SOURCE.to_string(),
        last_updated: Some(generated_at.to_rfc3339()),
        detail: None,
        reported_error: None,
    }
}

fn breakdown(activities: &[Activity]) -> WeekBreakdown {
    let mut actions = BTreeMap::new();
    let mut categories = BTreeMap::new();
    let mut users = BTreeSet::new();
    for a in activities {
        *actions.entry(a.action.clone()).or_insert(0) += 1;
        *categories.entry(a.event_category.clone()).or_insert(0) += 1;
        users.insert(a.user_email.as_str());
    }
    WeekBreakdown {
        actions,
        categories,
        top_users: users
            .into_iter()
            .take(TOP_USERS_LIMIT)
            .map(str::to_string)
            .collect(),
    }
}
