//! Reading aggregation responses back into `total_<metric>` entries.
//!
//! ```text
//! {"name": {"buckets": [{"key": "a", "doc_count": 3, "sum": {"value": 7}}]}}
//!   => {"total_sum": {"a": 7}}
//! ```

use serde_json::{Map, Value};

use super::aggs::{FILTERED, NESTED, REVERSE_NESTED};
use crate::filter::totals::COUNT;

const TOTAL_PREFIX: &str = "total_";
const TOTAL_COUNT: &str = "total_count";
const DOC_COUNT: &str = "doc_count";
const BUCKET_FIELDS: [&str; 3] = ["key", "key_as_string", DOC_COUNT];

/// Flatten the `aggregations` of a search response.
///
/// Single-bucket wrappers (`nested`, `reverse_nested`, `filtered`) are
/// transparent. A bucket with nothing but a document count yields `count`.
pub fn flatten_aggregations(aggs: &Map<String, Value>) -> Map<String, Value> {
    let mut totals = Map::new();
    collect(aggs, &mut totals);
    totals
        .into_iter()
        .map(|(metric, value)| (format!("{}{}", TOTAL_PREFIX, metric), value))
        .collect()
}

/// Flatten a whole search response. `total_count` falls back to the hit
/// total, given as a number or as `{"value": n}`.
pub fn flatten_response(response: &Value) -> Map<String, Value> {
    let mut totals = match response.get("aggregations") {
        Some(Value::Object(aggs)) => flatten_aggregations(aggs),
        _ => Map::new(),
    };
    if !totals.contains_key(TOTAL_COUNT) {
        let total = response.get("hits").and_then(|hits| hits.get("total"));
        let count = match total {
            Some(Value::Object(total)) => total.get("value").cloned(),
            Some(Value::Number(n)) => Some(Value::Number(n.clone())),
            _ => None,
        };
        if let Some(count) = count {
            totals.insert(TOTAL_COUNT.to_string(), count);
        }
    }
    totals
}

fn collect(aggs: &Map<String, Value>, out: &mut Map<String, Value>) {
    for (name, value) in aggs {
        let Value::Object(body) = value else {
            continue;
        };
        if let Some(buckets) = body.get("buckets") {
            collect_buckets(buckets, out);
        } else if is_wrapper(name) {
            if has_sub_aggregations(body) {
                collect(body, out);
            } else if let Some(count) = body.get(DOC_COUNT) {
                out.insert(COUNT.to_string(), count.clone());
            }
        } else {
            let metric = body.get("value").cloned().unwrap_or_else(|| value.clone());
            out.insert(name.clone(), metric);
        }
    }
}

fn collect_buckets(buckets: &Value, out: &mut Map<String, Value>) {
    let buckets: Vec<(String, &Map<String, Value>)> = match buckets {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_object)
            .map(|bucket| (bucket_key(bucket), bucket))
            .collect(),
        Value::Object(keyed) => keyed
            .iter()
            .filter_map(|(key, bucket)| bucket.as_object().map(|b| (key.clone(), b)))
            .collect(),
        _ => return,
    };

    for (key, bucket) in buckets {
        let mut values = Map::new();
        if has_sub_aggregations(bucket) {
            let sub: Map<String, Value> = bucket
                .iter()
                .filter(|(name, _)| !BUCKET_FIELDS.contains(&name.as_str()))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect();
            collect(&sub, &mut values);
        }
        if values.is_empty() {
            values.insert(
                COUNT.to_string(),
                bucket.get(DOC_COUNT).cloned().unwrap_or(Value::Null),
            );
        }
        for (metric, value) in values {
            let entry = out
                .entry(metric)
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(groups) = entry {
                groups.insert(key.clone(), value);
            }
        }
    }
}

fn bucket_key(bucket: &Map<String, Value>) -> String {
    match bucket.get("key_as_string").or_else(|| bucket.get("key")) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => Value::Null.to_string(),
    }
}

fn has_sub_aggregations(body: &Map<String, Value>) -> bool {
    body.iter()
        .any(|(name, value)| value.is_object() && !BUCKET_FIELDS.contains(&name.as_str()))
}

/// Wrapper names, possibly suffixed `_2`, `_3`, ... when several share a level.
fn is_wrapper(name: &str) -> bool {
    let base = match name.rsplit_once('_') {
        Some((base, suffix)) if !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) => base,
        _ => name,
    };
    matches!(base, NESTED | REVERSE_NESTED | FILTERED)
}
