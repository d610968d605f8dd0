//! Totals (aggregate) directives.
//!
//! ```json
//! [{"group_limit": 5}, {"group_by": ["other_models__name"]}, {"sum": "id"}, {"count": null}]
//! ```

use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::ops::check_function_name;
use crate::config::FunctionSettings;
use crate::error::{CompileError, CompileResult};

pub const GROUP_BY: &str = "group_by";
pub const GROUP_LIMIT: &str = "group_limit";
/// Metric served by document bucket counts.
pub const COUNT: &str = "count";

/// One grouping dimension.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupDim {
    /// A field path.
    Path(String),
    /// Group by whether rows match a filter mapping.
    Filter(Map<String, Value>),
}

/// An aggregate function over a field path, or over the primary key.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub function: String,
    pub path: Option<String>,
    /// Output label, `fn` or `fn__path` when `fn` is used more than once.
    pub name: String,
}

impl Metric {
    pub fn is_count(&self) -> bool {
        self.function.eq_ignore_ascii_case(COUNT)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TotalsSpec {
    pub group_limit: Option<u64>,
    pub group_by: Vec<GroupDim>,
    pub metrics: Vec<Metric>,
}

impl TotalsSpec {
    /// Parse a list of totals mappings.
    ///
    /// `group_limit` is read first, then `group_by`, then the metrics, each
    /// in input order.
    pub fn parse(items: &[Value], functions: &FunctionSettings) -> CompileResult<TotalsSpec> {
        let mut entries: Vec<(&String, &Value)> = Vec::new();
        for item in items {
            let Value::Object(map) = item else {
                return Err(CompileError::invalid_specification(
                    "totals",
                    format!("{} is expected to be a mapping", item),
                ));
            };
            entries.extend(map.iter());
        }

        let mut spec = TotalsSpec::default();
        for (_, value) in entries.iter().filter(|(key, _)| *key == GROUP_LIMIT) {
            spec.group_limit = parse_group_limit(value)?;
        }
        for (_, value) in entries.iter().filter(|(key, _)| *key == GROUP_BY) {
            spec.group_by.extend(parse_group_by(value)?);
        }

        let mut raw: Vec<(String, Option<String>)> = Vec::new();
        for (key, value) in entries
            .iter()
            .filter(|(key, _)| *key != GROUP_BY && *key != GROUP_LIMIT)
        {
            check_function_name(key, functions, key.as_str())?;
            for path in parse_metric_paths(key, value)? {
                let metric = (key.to_string(), path);
                if !raw.contains(&metric) {
                    raw.push(metric);
                }
            }
        }

        let mut uses: IndexMap<&str, usize> = IndexMap::new();
        for (function, _) in &raw {
            *uses.entry(function.as_str()).or_insert(0) += 1;
        }
        spec.metrics = raw
            .iter()
            .map(|(function, path)| {
                let name = match path {
                    Some(path) if uses.get(function.as_str()).copied().unwrap_or(0) > 1 => {
                        format!("{}__{}", function, path)
                    }
                    _ => function.clone(),
                };
                Metric {
                    function: function.clone(),
                    path: path.clone(),
                    name,
                }
            })
            .collect();
        Ok(spec)
    }

    pub fn is_empty(&self) -> bool {
        self.group_by.is_empty() && self.metrics.is_empty()
    }
}

fn parse_group_limit(value: &Value) -> CompileResult<Option<u64>> {
    match value.as_u64() {
        Some(0) => Ok(None),
        Some(n) => Ok(Some(n)),
        None => Err(CompileError::invalid_specification(
            GROUP_LIMIT,
            "requires a non-negative integer value",
        )),
    }
}

fn parse_group_by(value: &Value) -> CompileResult<Vec<GroupDim>> {
    let dims = match value {
        Value::String(path) if !path.is_empty() => vec![GroupDim::Path(path.clone())],
        Value::Object(map) if !map.is_empty() => vec![GroupDim::Filter(map.clone())],
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(path) if !path.is_empty() => Ok(GroupDim::Path(path.clone())),
                Value::Object(map) => Ok(GroupDim::Filter(map.clone())),
                other => Err(CompileError::invalid_specification(
                    GROUP_BY,
                    format!("{} is expected to be a column name or a filter mapping", other),
                )),
            })
            .collect::<CompileResult<Vec<_>>>()?,
        _ => Vec::new(),
    };
    if dims.is_empty() {
        return Err(CompileError::invalid_specification(
            GROUP_BY,
            "requires at least one column name",
        ));
    }
    Ok(dims)
}

/// Paths of one metric entry; `None` stands for the primary key.
fn parse_metric_paths(function: &str, value: &Value) -> CompileResult<Vec<Option<String>>> {
    let invalid = |v: &Value| {
        CompileError::invalid_specification(
            function,
            format!("{} is expected to be a column name, a list of them or null", v),
        )
    };
    match value {
        Value::Null => Ok(vec![None]),
        Value::String(path) if path.is_empty() => Ok(vec![None]),
        Value::String(path) => Ok(vec![Some(path.clone())]),
        Value::Array(items) if items.is_empty() => Ok(vec![None]),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(path) => Ok(Some(path.clone())),
                other => Err(invalid(other)),
            })
            .collect(),
        other => Err(invalid(other)),
    }
}
