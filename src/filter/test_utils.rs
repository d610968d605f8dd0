//! Test helpers: a schema fixture and a backend that renders leaves as text.

use std::sync::Arc;

use serde_json::Value;

use super::backend::{Backend, Leaf, Operand, OrderKey, Target, Terminal};
use super::condition::LogicalOp;
use super::path::{Conjunction, ResolvedPath, Resolver};
use crate::error::CompileResult;
use crate::schema::{EntitySchema, FieldType, JoinKey, Relationship, SchemaRegistry};

pub fn registry() -> SchemaRegistry {
    let model = EntitySchema::builder("Model", "some_table")
        .field("id", FieldType::Int)
        .field("name", FieldType::String)
        .field("created", FieldType::DateTime)
        .relationship(Relationship::many(
            "others",
            "Other",
            JoinKey::direct("id", "model_id"),
        ))
        .primary_key(["id"])
        .text_search("name")
        .build()
        .unwrap();
    let other = EntitySchema::builder("Other", "other_table")
        .field("id", FieldType::Int)
        .field("model_id", FieldType::Int)
        .field("name", FieldType::String)
        .relationship(Relationship::many(
            "thirds",
            "Third",
            JoinKey::direct("id", "other_id"),
        ))
        .primary_key(["id"])
        .build()
        .unwrap();
    let third = EntitySchema::builder("Third", "third_table")
        .field("id", FieldType::Int)
        .field("other_id", FieldType::Int)
        .field("name", FieldType::String)
        .primary_key(["id"])
        .build()
        .unwrap();
    SchemaRegistry::builder()
        .entity(model)
        .entity(other)
        .entity(third)
        .build()
        .unwrap()
}

pub fn resolver(registry: &SchemaRegistry) -> Resolver<'_> {
    Resolver::new(registry, Arc::clone(registry.get("Model").unwrap()), "q")
}

/// Renders every leaf as a readable string and records registered joins.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub joins: Vec<(Vec<String>, bool)>,
}

fn wrap(field: &str, wrappers: &[String]) -> String {
    wrappers
        .iter()
        .fold(field.to_string(), |expr, name| format!("{}({})", name, expr))
}

fn operand(operand: &Operand<String>) -> String {
    match operand {
        Operand::Value(Value::String(s)) => format!("'{}'", s),
        Operand::Value(v) => v.to_string(),
        Operand::Field(f) => f.clone(),
    }
}

impl Backend for RecordingBackend {
    type Field = String;
    type Expr = String;
    type Order = String;

    fn resolve_relationship(&mut self, path: &ResolvedPath, outer: bool) -> CompileResult<()> {
        if !path.hops.is_empty() {
            self.joins.push((path.relationship_path(), outer));
        }
        Ok(())
    }

    fn resolve_field(&mut self, path: &ResolvedPath) -> CompileResult<String> {
        let owner = if path.hops.is_empty() {
            path.entity.table.clone()
        } else {
            path.relationship_path().join(".")
        };
        Ok(format!("{}.{}", owner, path.field.name))
    }

    fn build_leaf_expression(&mut self, leaf: Leaf<String>) -> CompileResult<String> {
        let expr = wrap(&leaf.field, &leaf.wrappers);
        Ok(match &leaf.terminal {
            Terminal::Compare(op) => format!("{} {} {}", expr, op.suffix(), operand(&leaf.operand)),
            Terminal::Call { name, unary: true } => format!("{}({})", name, expr),
            Terminal::Call { name, unary: false } => {
                format!("{}({}, {})", name, expr, operand(&leaf.operand))
            }
            Terminal::Text(conjunction) => {
                let word = match conjunction {
                    Conjunction::And => "and",
                    Conjunction::Or => "or",
                };
                format!("text[{}]({}, {})", word, expr, operand(&leaf.operand))
            }
        })
    }

    fn combine(&mut self, op: LogicalOp, children: Vec<String>) -> String {
        let glue = match op {
            LogicalOp::Or => " OR ",
            _ => " AND ",
        };
        format!("({})", children.join(glue))
    }

    fn negate(&mut self, expr: String) -> String {
        format!("NOT {}", expr)
    }

    fn build_order(&mut self, key: OrderKey<String, String>) -> CompileResult<String> {
        let target = match key.target {
            Target::Field(f) | Target::Expression(f) => f,
        };
        Ok(format!("{} {}", target, if key.ascending { "ASC" } else { "DESC" }))
    }

    fn special_order(&mut self, name: &str, ascending: bool) -> Option<String> {
        (name == "_score").then(|| format!("_score {}", if ascending { "ASC" } else { "DESC" }))
    }
}
