use std::collections::{HashMap, HashSet};

use pulse_core::config::BoardColumns;
use pulse_core::types::{parse_roi, Initiative};
use serde_json::Value;
use tracing::warn;

use super::BoardError;

/// Flatten a raw board response into initiatives.
///
/// Groups are walked in payload order and items in group order. Columns are
/// looked up by their configured id; a missing column becomes `""` (or a zero
/// ROI). Items without an id are dropped, and a repeated id keeps its first
/// occurrence. Pure: the same payload always yields the same list.
pub fn normalize_board(
    payload: &Value,
    columns: &BoardColumns,
) -> Result<Vec<Initiative>, BoardError> {
    let boards = payload
        .pointer("/data/boards")
        .and_then(Value::as_array)
        .ok_or_else(|| BoardError::Malformed("response has no data.boards".into()))?;

    let mut seen = HashSet::new();
    let mut initiatives = Vec::new();

    for board in boards {
        for group in board["groups"].as_array().into_iter().flatten() {
            let group_title = group["title"].as_str().unwrap_or_default();
            for item in group["items_page"]["items"].as_array().into_iter().flatten() {
                let Some(id) = item_id(&item["id"]) else {
                    warn!(group = group_title, "skipping board item without id");
                    continue;
                };
                if !seen.insert(id.clone()) {
                    warn!(id = %id, "skipping duplicate board item");
                    continue;
                }
                initiatives.push(parse_item(item, id, group_title, columns));
            }
        }
    }

    Ok(initiatives)
}

fn parse_item(item: &Value, id: String, group: &str, columns: &BoardColumns) -> Initiative {
    let values: HashMap<&str, &str> = item["column_values"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|cv| {
                    let col = cv["id"].as_str()?;
                    Some((col, cv["text"].as_str().unwrap_or_default()))
                })
                .collect()
        })
        .unwrap_or_default();
    let text = |col: &str| values.get(col).copied().unwrap_or_default().to_string();

    Initiative {
        id,
        name: item["name"].as_str().unwrap_or_default().to_string(),
        group: group.to_string(),
        status: text(&columns.status),
        function: text(&columns.function),
        team: text(&columns.team),
        roi: parse_roi(values.get(columns.roi.as_str()).copied().unwrap_or_default()),
        hours_saved: text(&columns.hours_saved),
        external_spend_saved: text(&columns.external_spend_saved),
        complexity: text(&columns.complexity),
        start_date: text(&columns.start_date),
        target_date: text(&columns.target_date),
    }
}

/// Item ids are strings in the API, but tolerate bare numbers.
fn item_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
