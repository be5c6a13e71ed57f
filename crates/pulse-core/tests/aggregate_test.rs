use pulse_core::aggregate::{aggregate, StatusBucket, StatusBuckets, OTHER_LABEL};
use pulse_core::types::{parse_roi, Initiative};

fn initiative(id: &str, status: &str, function: &str, roi_text: &str) -> Initiative {
    Initiative {
        id: id.into(),
        name: format!("Initiative {id}"),
        status: status.into(),
        function: function.into(),
        roi: parse_roi(roi_text),
        ..Default::default()
    }
}

#[test]
fn backlog_and_done_with_blank_roi() {
    let items = vec![
        initiative("1", "Backlog", "IT", "100"),
        initiative("2", "Done", "IT", ""),
    ];
    let agg = aggregate(&items);

    assert_eq!(
        agg.status_buckets,
        StatusBuckets {
            backlog: 1,
            in_flight: 0,
            completed: 1,
            on_hold: 0,
            other: 0,
        }
    );
    assert_eq!(agg.total_roi, 100.0);
}

#[test]
fn blank_function_counts_as_other() {
    let items = vec![
        initiative("1", "Done", "", "0"),
        initiative("2", "Done", "IT", "0"),
    ];
    let agg = aggregate(&items);

    assert_eq!(agg.department_counts.len(), 2);
    assert_eq!(agg.department_counts[OTHER_LABEL], 1);
    assert_eq!(agg.department_counts["IT"], 1);
}

#[test]
fn bucket_counts_sum_to_input_length() {
    let statuses = [
        "Backlog",
        "Evaluation",
        "Scoping",
        "In Progress",
        "Done",
        "Closed",
        "On Hold",
        "Cancelled",
        "",
        "in progress",
    ];
    // Every prefix of the list, including the empty one.
    for n in 0..=statuses.len() {
        let items: Vec<_> = statuses[..n]
            .iter()
            .enumerate()
            .map(|(i, s)| initiative(&i.to_string(), s, "Ops", "1.5"))
            .collect();
        let agg = aggregate(&items);
        assert_eq!(agg.status_buckets.total(), n);
        assert_eq!(agg.status_counts.values().sum::<usize>(), n);
        assert_eq!(agg.department_counts.values().sum::<usize>(), n);
        assert_eq!(agg.total_roi, 1.5 * n as f64);
    }
}

#[test]
fn unknown_statuses_land_in_other() {
    let items: Vec<_> = ["Cancelled", "Blocked", "DONE", "Waiting"]
        .iter()
        .enumerate()
        .map(|(i, s)| initiative(&i.to_string(), s, "", "0"))
        .collect();
    let agg = aggregate(&items);
    assert_eq!(agg.status_buckets.get(StatusBucket::Other), 4);
    assert_eq!(agg.status_buckets.total(), 4);
}

#[test]
fn total_roi_is_sum_of_parsed_values() {
    let texts = ["100", "abc", "", "250.25", "-10", "NaN", "1e3"];
    let items: Vec<_> = texts
        .iter()
        .enumerate()
        .map(|(i, t)| initiative(&i.to_string(), "Done", "IT", t))
        .collect();
    let expected: f64 = items.iter().map(|i| i.roi).sum();
    let agg = aggregate(&items);

    assert_eq!(agg.total_roi, expected);
    assert_eq!(agg.total_roi, 100.0 + 250.25 + 1000.0);
    assert!(agg.total_roi.is_finite());
}
