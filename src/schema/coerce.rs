//! Coercion of raw request values to a field's semantic type.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::{Number, Value};

use super::FieldType;

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%SZ", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];
const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M"];

const NORMALIZED_DATETIME: &str = "%Y-%m-%d %H:%M:%S";
const NORMALIZED_TIME: &str = "%H:%M:%S";

impl FieldType {
    /// Coerce a decoded request value to this type.
    ///
    /// `null` passes through for every type. Date and time values are
    /// normalized to `YYYY-MM-DD HH:MM:SS` and `HH:MM:SS`.
    pub fn coerce(&self, value: &Value) -> Result<Value, String> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        match self {
            FieldType::String => Ok(match value {
                Value::String(_) => value.clone(),
                Value::Number(n) => Value::String(n.to_string()),
                Value::Bool(b) => Value::String(b.to_string()),
                other => Value::String(other.to_string()),
            }),
            FieldType::Int => coerce_int(value)
                .map(Value::from)
                .ok_or_else(|| format!("{} is not an integer", value)),
            FieldType::Float => coerce_float(value)
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| format!("{} is not a number", value)),
            FieldType::Bool => parse_flag(value)
                .map(Value::Bool)
                .ok_or_else(|| format!("{} is not a boolean", value)),
            FieldType::DateTime => value
                .as_str()
                .and_then(parse_datetime)
                .map(|dt| Value::String(dt.format(NORMALIZED_DATETIME).to_string()))
                .ok_or_else(|| format!("{} is not a valid datetime", value)),
            FieldType::Time => value
                .as_str()
                .and_then(parse_time)
                .map(|t| Value::String(t.format(NORMALIZED_TIME).to_string()))
                .ok_or_else(|| format!("{} is not a valid time", value)),
            FieldType::Array | FieldType::Json => Ok(value.clone()),
        }
    }
}

/// Interpret the operand of `isnull`/`isnotnull`.
///
/// Accepts booleans, `1`/`0` and the strings `true`/`false`/`1`/`0`.
pub fn parse_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn coerce_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_utc()))
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(s, fmt).ok())
}
