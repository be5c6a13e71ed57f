//! Usage-analytics sources.
//!
//! Every source produces a [`UsageSnapshot`]. Unavailability (missing
//! credentials, a crashed script, an unreachable API) is not an error for
//! callers: [`fetch_or_placeholder`] turns it into a zeroed snapshot flagged
//! `unavailable`. Only a contract violation, where the source answered but
//! with the wrong shape, propagates.

pub mod reports;
pub mod script;
pub mod weekly;

pub use reports::ReportsUsageSource;
pub use script::{ScriptRunner, ScriptUsageSource};

use async_trait::async_trait;
use pulse_core::types::{AnalyticsReport, UsageSnapshot};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    /// The source could not produce data right now. The message is safe to
    /// show to operators: no paths, tokens or stderr.
    #[error("analytics unavailable: {0}")]
    Unavailable(String),

    /// The source produced output that does not match the report shape.
    #[error("analytics contract violation: {0}")]
    ContractViolation(String),
}

/// Port for anything that can produce a usage snapshot.
#[async_trait]
pub trait UsageSource: Send + Sync {
    /// Short label for logs and metrics.
    fn name(&self) -> &'static str;

    async fn fetch(&self) -> Result<UsageSnapshot, UsageError>;
}

/// Fetch from `source`, replacing unavailability with a placeholder.
pub async fn fetch_or_placeholder(source: &dyn UsageSource) -> Result<UsageSnapshot, UsageError> {
    degrade(source.name(), source.fetch().await)
}

/// Map [`UsageError::Unavailable`] to the report's placeholder.
pub fn degrade<T: AnalyticsReport>(
    source: &str,
    result: Result<T, UsageError>,
) -> Result<T, UsageError> {
    match result {
        Err(UsageError::Unavailable(detail)) => {
            warn!(source, detail = %detail, "analytics unavailable, serving placeholder");
            Ok(T::placeholder(&detail))
        }
        other => other,
    }
}

// ---------------------------------------------------------------------------
// StaticUsageSource
// ---------------------------------------------------------------------------

/// Serves a fixed snapshot. Used when analytics are disabled and in tests.
#[derive(Debug, Clone)]
pub struct StaticUsageSource {
    result: Result<UsageSnapshot, UsageError>,
}

impl StaticUsageSource {
    pub fn new(snapshot: UsageSnapshot) -> Self {
        Self {
            result: Ok(snapshot),
        }
    }

    /// Always reports the source as unavailable with `detail`.
    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self {
            result: Err(UsageError::Unavailable(detail.into())),
        }
    }

    pub fn failing(error: UsageError) -> Self {
        Self { result: Err(error) }
    }
}

#[async_trait]
impl UsageSource for StaticUsageSource {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn fetch(&self) -> Result<UsageSnapshot, UsageError> {
        self.result.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::types::{UsageStatus, UsageSummary};

    #[tokio::test]
    async fn unavailable_becomes_placeholder() {
        let source = StaticUsageSource::unavailable("analytics disabled");
        let snap = fetch_or_placeholder(&source).await.unwrap();
        assert_eq!(snap.status, UsageStatus::Unavailable);
        assert_eq!(snap.summary, UsageSummary::default());
        assert_eq!(snap.detail.as_deref(), Some("analytics disabled"));
    }

    #[tokio::test]
    async fn contract_violation_propagates() {
        let source = StaticUsageSource::failing(UsageError::ContractViolation("bad".into()));
        let err = fetch_or_placeholder(&source).await.unwrap_err();
        assert!(matches!(err, UsageError::ContractViolation(_)));
    }

    #[tokio::test]
    async fn live_snapshot_passes_through() {
        let mut snap = UsageSnapshot::placeholder("x");
        snap.status = UsageStatus::Live;
        snap.detail = None;
        snap.summary.total_cumulative_users = 9;
        let source = StaticUsageSource::new(snap.clone());
        assert_eq!(fetch_or_placeholder(&source).await.unwrap(), snap);
    }
}
