//! Order criteria: parsing and compilation through a backend.

use serde_json::Value;

use super::backend::{Backend, OrderKey};
use super::builder::FilterBuilder;
use super::path::Mode;
use crate::error::{CompileError, CompileResult};
use crate::schema::EntitySchema;

/// One `(path, direction, aux value)` order entry.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderCriterion {
    pub path: String,
    pub ascending: bool,
    /// Operand of an operator or function suffix on the path.
    pub value: Value,
}

impl OrderCriterion {
    /// Parse `name`, `+name` or `-name`.
    pub fn new(raw: &str, value: Value) -> CompileResult<Self> {
        let (path, ascending) = match raw.as_bytes().first() {
            Some(b'-') => (&raw[1..], false),
            Some(b'+') => (&raw[1..], true),
            _ => (raw, true),
        };
        if path.is_empty() {
            return Err(CompileError::invalid_specification(
                "order",
                format!("{:?} does not name a column", raw),
            ));
        }
        Ok(Self {
            path: path.to_string(),
            ascending,
            value,
        })
    }

    /// Parse an order value: a string, a list of strings or a mapping of
    /// paths to aux values. `null` means no explicit order.
    pub fn parse(value: &Value) -> CompileResult<Vec<OrderCriterion>> {
        match value {
            Value::Null => Ok(Vec::new()),
            Value::String(s) => Ok(vec![Self::new(s, Value::Null)?]),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Self::new(s, Value::Null),
                    other => Err(CompileError::invalid_specification(
                        "order",
                        format!("{} is expected to be a column name", other),
                    )),
                })
                .collect(),
            Value::Object(map) => map
                .iter()
                .map(|(key, aux)| Self::new(key, aux.clone()))
                .collect(),
            other => Err(CompileError::invalid_specification(
                "order",
                format!("{} is expected to be a string, a list or a mapping", other),
            )),
        }
    }

    /// Primary key columns, ascending.
    pub fn primary_key(entity: &EntitySchema) -> Vec<OrderCriterion> {
        entity
            .primary_key
            .iter()
            .map(|column| OrderCriterion {
                path: column.clone(),
                ascending: true,
                value: Value::Null,
            })
            .collect()
    }
}

impl<B: Backend> FilterBuilder<'_, B> {
    /// Compile order criteria. Relationship hops share the filter's joins.
    pub fn build_order(&mut self, criteria: &[OrderCriterion]) -> CompileResult<Vec<B::Order>> {
        let mut orders = Vec::with_capacity(criteria.len());
        for criterion in criteria {
            if let Some(order) = self
                .backend_mut()
                .special_order(&criterion.path, criterion.ascending)
            {
                orders.push(order);
                continue;
            }

            let Some((path, target)) =
                self.build_target(&criterion.path, &criterion.value, Mode::Order)?
            else {
                continue;
            };

            orders.push(self.backend_mut().build_order(OrderKey {
                path,
                target,
                ascending: criterion.ascending,
            })?);
        }
        Ok(orders)
    }
}
