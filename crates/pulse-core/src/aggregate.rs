//! Single-pass roll-ups over a board fetch.
//!
//! [`aggregate`] is total: any input, including the empty slice, produces a
//! well-formed [`Aggregate`]. Unknown status strings land in
//! [`StatusBucket::Other`], blank functions and teams under [`OTHER_LABEL`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::Initiative;

/// Key used for initiatives with no function or team.
pub const OTHER_LABEL: &str = "Other";

// ---------------------------------------------------------------------------
// StatusBucket
// ---------------------------------------------------------------------------

/// Canonical lifecycle bucket a raw board status maps into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatusBucket {
    Backlog,
    InFlight,
    Completed,
    OnHold,
    Other,
}

impl StatusBucket {
    /// Map a raw status label. Matching is exact apart from surrounding
    /// whitespace.
    pub fn classify(status: &str) -> Self {
        match status.trim() {
            "Backlog" => StatusBucket::Backlog,
            "Evaluation" | "Scoping" | "In Progress" => StatusBucket::InFlight,
            "Done" | "Closed" => StatusBucket::Completed,
            "On Hold" => StatusBucket::OnHold,
            _ => StatusBucket::Other,
        }
    }
}

/// Per-bucket counts. Always carries every bucket, zero or not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBuckets {
    pub backlog: usize,
    pub in_flight: usize,
    pub completed: usize,
    pub on_hold: usize,
    pub other: usize,
}

impl StatusBuckets {
    pub fn record(&mut self, bucket: StatusBucket) {
        let slot = match bucket {
            StatusBucket::Backlog => &mut self.backlog,
            StatusBucket::InFlight => &mut self.in_flight,
            StatusBucket::Completed => &mut self.completed,
            StatusBucket::OnHold => &mut self.on_hold,
            StatusBucket::Other => &mut self.other,
        };
        *slot += 1;
    }

    pub fn get(&self, bucket: StatusBucket) -> usize {
        match bucket {
            StatusBucket::Backlog => self.backlog,
            StatusBucket::InFlight => self.in_flight,
            StatusBucket::Completed => self.completed,
            StatusBucket::OnHold => self.on_hold,
            StatusBucket::Other => self.other,
        }
    }

    pub fn total(&self) -> usize {
        self.backlog + self.in_flight + self.completed + self.on_hold + self.other
    }
}

// ---------------------------------------------------------------------------
// Aggregate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregate {
    pub total_initiatives: usize,
    pub status_buckets: StatusBuckets,
    /// Raw status label -> count.
    pub status_counts: BTreeMap<String, usize>,
    /// `function` -> count.
    pub department_counts: BTreeMap<String, usize>,
    pub team_counts: BTreeMap<String, usize>,
    #[serde(rename = "totalROI")]
    pub total_roi: f64,
}

fn label_or_other(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        OTHER_LABEL.to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn aggregate(initiatives: &[Initiative]) -> Aggregate {
    let mut out = Aggregate {
        total_initiatives: initiatives.len(),
        ..Aggregate::default()
    };

    for item in initiatives {
        out.status_buckets.record(StatusBucket::classify(&item.status));
        *out.status_counts.entry(item.status.clone()).or_default() += 1;
        *out
            .department_counts
            .entry(label_or_other(&item.function))
            .or_default() += 1;
        *out.team_counts.entry(label_or_other(&item.team)).or_default() += 1;
        out.total_roi += item.roi;
    }

    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn item(status: &str, function: &str, roi: f64) -> Initiative {
        Initiative {
            id: format!("{status}-{function}-{roi}"),
            status: status.into(),
            function: function.into(),
            roi,
            ..Default::default()
        }
    }

    #[test]
    fn classify_table() {
        let cases = [
            ("Backlog", StatusBucket::Backlog),
            ("Evaluation", StatusBucket::InFlight),
            ("Scoping", StatusBucket::InFlight),
            ("In Progress", StatusBucket::InFlight),
            ("Done", StatusBucket::Completed),
            ("Closed", StatusBucket::Completed),
            ("On Hold", StatusBucket::OnHold),
            (" Done ", StatusBucket::Completed),
            ("done", StatusBucket::Other),
            ("Blocked", StatusBucket::Other),
            ("", StatusBucket::Other),
        ];
        for (raw, expected) in cases {
            assert_eq!(StatusBucket::classify(raw), expected, "status {raw:?}");
        }
    }

    #[test]
    fn empty_input() {
        let agg = aggregate(&[]);
        assert_eq!(agg.total_initiatives, 0);
        assert_eq!(agg.status_buckets, StatusBuckets::default());
        assert!(agg.status_counts.is_empty());
        assert!(agg.department_counts.is_empty());
        assert_eq!(agg.total_roi, 0.0);
    }

    #[test]
    fn raw_status_counts_keep_labels() {
        let agg = aggregate(&[
            item("Blocked", "IT", 0.0),
            item("Blocked", "HR", 0.0),
            item("Done", "IT", 0.0),
        ]);
        assert_eq!(agg.status_counts["Blocked"], 2);
        assert_eq!(agg.status_counts["Done"], 1);
        assert_eq!(agg.status_buckets.other, 2);
    }

    #[test]
    fn whitespace_function_is_other() {
        let agg = aggregate(&[item("Done", "  ", 0.0)]);
        assert_eq!(agg.department_counts.get(OTHER_LABEL), Some(&1));
    }

    #[test]
    fn serializes_total_roi_key() {
        let agg = aggregate(&[item("Done", "IT", 10.0)]);
        let json = serde_json::to_value(&agg).unwrap();
        assert_eq!(json["totalROI"], 10.0);
        assert_eq!(json["statusBuckets"]["inFlight"], 0);
        assert_eq!(json["statusBuckets"]["completed"], 1);
    }
}
