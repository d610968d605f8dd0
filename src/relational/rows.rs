//! Reading totals result rows back into `total_<metric>` entries.

use serde_json::{Map, Value};

use super::TotalsQuery;

pub const TOTAL_PREFIX: &str = "total_";

/// Fold the rows of a totals query.
///
/// Without dimensions each metric maps to the value of the first row.
/// Otherwise each metric maps to nested objects keyed by the dimension
/// values, outermost dimension first, in row order.
pub fn flatten_rows(rows: &[Map<String, Value>], plan: &TotalsQuery) -> Map<String, Value> {
    let mut result = Map::new();
    for metric in &plan.metrics {
        let key = format!("{}{}", TOTAL_PREFIX, metric);
        if plan.dimensions.is_empty() {
            let value = rows
                .first()
                .and_then(|row| row.get(metric))
                .cloned()
                .unwrap_or(Value::Null);
            result.insert(key, value);
            continue;
        }

        let mut tree = Map::new();
        for row in rows {
            let value = row.get(metric).cloned().unwrap_or(Value::Null);
            insert_path(&mut tree, row, &plan.dimensions, value);
        }
        result.insert(key, Value::Object(tree));
    }
    result
}

fn insert_path(tree: &mut Map<String, Value>, row: &Map<String, Value>, dimensions: &[String], value: Value) {
    let Some((last, outer)) = dimensions.split_last() else {
        return;
    };
    let mut level = tree;
    for dimension in outer {
        let entry = level
            .entry(group_key(row.get(dimension)))
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        let Value::Object(next) = entry else {
            return;
        };
        level = next;
    }
    level.insert(group_key(row.get(last)), value);
}

/// Strings key as themselves, everything else by its JSON text.
fn group_key(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => Value::Null.to_string(),
    }
}
