//! Splitting raw request parameters into conditions, order and totals.

use serde_json::{Map, Value};

use crate::config::Settings;
use crate::error::{CompileError, CompileResult};
use crate::filter::totals::COUNT;
use crate::filter::{OrderCriterion, TotalsSpec};
use crate::schema::parse_flag;

pub const LIMIT: &str = "limit";
pub const OFFSET: &str = "offset";
pub const ORDER: &str = "order";
pub const RELATIONS: &str = "relations";
pub const SEARCH: &str = "search";
pub const TOTALS: &str = "totals";
pub const TOTAL_COUNT: &str = "total_count";

/// A request's parameters, with reserved names taken out of the conditions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestParams {
    /// Filter conditions, including `search` contents and free-text keys.
    pub conditions: Map<String, Value>,
    pub order: Vec<OrderCriterion>,
    /// Totals directives, normalized to a list of mappings.
    pub totals: Vec<Value>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub relations: Option<Value>,
}

impl RequestParams {
    pub fn from_map(params: &Map<String, Value>, settings: &Settings) -> CompileResult<Self> {
        let mut result = RequestParams::default();
        let mut search = None;
        let mut order = Value::Null;
        let mut totals = Value::Null;
        let mut total_count = false;

        for (key, value) in params {
            match key.as_str() {
                LIMIT => result.limit = parse_count(key, value)?,
                OFFSET => result.offset = parse_count(key, value)?,
                RELATIONS => result.relations = Some(value.clone()),
                SEARCH => search = Some(value),
                ORDER => order = value.clone(),
                TOTALS => totals = value.clone(),
                TOTAL_COUNT => total_count = is_truthy(value),
                _ => {
                    result.conditions.insert(key.clone(), value.clone());
                }
            }
        }

        if let Some(search) = search {
            for (key, value) in parse_search(search)? {
                result.conditions.insert(key, value);
            }
        }

        result.order = OrderCriterion::parse(&decode_order(order))?;
        result.totals = normalize_totals(totals, total_count)?;
        TotalsSpec::parse(&result.totals, &settings.functions)?;
        Ok(result)
    }

    pub fn totals_spec(&self, settings: &Settings) -> CompileResult<Option<TotalsSpec>> {
        if self.totals.is_empty() {
            return Ok(None);
        }
        TotalsSpec::parse(&self.totals, &settings.functions).map(Some)
    }
}

fn parse_count(key: &str, value: &Value) -> CompileResult<Option<u64>> {
    let parsed = match value {
        Value::Null => return Ok(None),
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed
        .map(Some)
        .ok_or_else(|| CompileError::invalid_attribute(key, "expected a non-negative integer"))
}

fn is_truthy(value: &Value) -> bool {
    match parse_flag(value) {
        Some(flag) => flag,
        None => match value {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            _ => true,
        },
    }
}

fn parse_search(value: &Value) -> CompileResult<Map<String, Value>> {
    let invalid = || CompileError::invalid_attribute(SEARCH, "value of search filter attribute is invalid");
    match value {
        Value::Object(map) => Ok(map.clone()),
        Value::String(s) => match serde_json::from_str(s) {
            Ok(Value::Object(map)) => Ok(map),
            _ => Err(invalid()),
        },
        Value::Null => Ok(Map::new()),
        _ => Err(invalid()),
    }
}

/// Order strings that look like JSON are decoded; on failure they are
/// kept as a plain column name.
fn decode_order(order: Value) -> Value {
    let Value::String(s) = &order else {
        return order;
    };
    if s.is_empty() {
        return Value::Null;
    }
    let looks_like_json =
        (s.starts_with('[') && s.ends_with(']')) || (s.starts_with('{') && s.ends_with('}'));
    if looks_like_json {
        if let Ok(decoded) = serde_json::from_str(s) {
            return decoded;
        }
    }
    order
}

fn normalize_totals(totals: Value, total_count: bool) -> CompileResult<Vec<Value>> {
    let totals = match totals {
        Value::String(s) if s.is_empty() => Value::Null,
        Value::String(s) => serde_json::from_str(&s).map_err(|_| {
            CompileError::invalid_specification(TOTALS, "value is not valid JSON")
        })?,
        other => other,
    };
    let mut items = match totals {
        Value::Null => Vec::new(),
        Value::Object(map) => vec![Value::Object(map)],
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(name) => {
                    let mut map = Map::new();
                    map.insert(name, Value::Null);
                    Value::Object(map)
                }
                other => other,
            })
            .collect(),
        other => {
            return Err(CompileError::invalid_specification(
                TOTALS,
                format!("{} is expected to be a list of mappings", other),
            ));
        }
    };
    let has_count = items
        .iter()
        .any(|item| item.as_object().is_some_and(|m| m.contains_key(COUNT)));
    if total_count && !has_count {
        let mut map = Map::new();
        map.insert(COUNT.to_string(), Value::Null);
        items.push(Value::Object(map));
    }
    Ok(items)
}
