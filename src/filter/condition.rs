//! The condition tree built from a flat parameter mapping.

use serde_json::{Map, Value};

use super::path::SEPARATOR;
use crate::error::{CompileError, CompileResult};

/// Logical operator of a condition group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Not,
}

impl LogicalOp {
    pub fn from_key(key: &str) -> Option<LogicalOp> {
        match key {
            "and" => Some(LogicalOp::And),
            "or" => Some(LogicalOp::Or),
            "not" => Some(LogicalOp::Not),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            LogicalOp::And => "and",
            LogicalOp::Or => "or",
            LogicalOp::Not => "not",
        }
    }
}

/// A filter condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `key=value`, the key split into path tokens.
    Leaf {
        key: String,
        tokens: Vec<String>,
        value: Value,
    },
    /// Children combined with `op`. A `Not` group is `NOT(AND(children))`.
    Logical { op: LogicalOp, children: Vec<Condition> },
}

impl Condition {
    /// Parse a conditions mapping; its entries are combined with `op`.
    ///
    /// A logical key holding a mapping opens a group with that operator. A
    /// logical key holding a list combines the groups built from each
    /// element (each element under `AND`).
    pub fn parse(conditions: &Map<String, Value>, op: LogicalOp) -> CompileResult<Condition> {
        let mut children = Vec::with_capacity(conditions.len());
        for (key, value) in conditions {
            match LogicalOp::from_key(key) {
                Some(inner) => children.push(Self::parse_logical(key, inner, value)?),
                None => children.push(Condition::Leaf {
                    key: key.clone(),
                    tokens: key.split(SEPARATOR).map(String::from).collect(),
                    value: value.clone(),
                }),
            }
        }
        Ok(Condition::Logical { op, children })
    }

    fn parse_logical(key: &str, op: LogicalOp, value: &Value) -> CompileResult<Condition> {
        match value {
            Value::Object(map) => Self::parse(map, op),
            Value::Array(items) => {
                let children = items
                    .iter()
                    .map(|item| match item {
                        Value::Object(map) => Self::parse(map, LogicalOp::And),
                        _ => Err(CompileError::invalid_specification(
                            key,
                            "each element is expected to be a mapping of conditions",
                        )),
                    })
                    .collect::<CompileResult<Vec<_>>>()?;
                Ok(Condition::Logical { op, children })
            }
            _ => Err(CompileError::invalid_specification(
                key,
                "value is expected to be a mapping or a list of mappings",
            )),
        }
    }
}
