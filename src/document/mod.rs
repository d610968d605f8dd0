//! Document backend: compiles filters, order criteria and totals into a
//! search-engine query body.
//!
//! - [`DocumentBackend`] - the [`Backend`] adapter producing [`Query`] clauses
//! - [`dsl`] - the typed query, sort and aggregation DSL
//! - [`nested`] - regrouping of sibling clauses by nesting context
//! - [`aggs`] - bucket aggregations for totals
//! - [`flatten`] - reading aggregation responses back into totals

pub mod aggs;
pub mod dsl;
pub mod flatten;
pub mod nested;

pub use aggs::build_aggregations;
pub use dsl::{Aggregation, Aggs, BoolQuery, Query, SearchBody, Sort};
pub use flatten::{flatten_aggregations, flatten_response};

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{CompileError, CompileResult};
use crate::filter::{
    Backend, BaseOp, Conjunction, Leaf, LogicalOp, Mode, Operand, Operator, OrderKey,
    ResolvedPath, Target, Terminal,
};
use crate::schema::FieldType;
use dsl::MatchOptions;

/// Sort name for relevance.
pub const SCORE: &str = "_score";

/// Suffix of not-analyzed keyword sub-fields.
const RAW_SUFFIX: &str = ".raw";

/// A field addressed by its dotted document path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocField {
    /// Dotted path, with `.raw` when aggregating a keyword sub-field.
    pub path: String,
    /// Innermost nesting context the field lives in.
    pub nested: Option<String>,
    pub field_type: FieldType,
    pub multi: bool,
}

/// Request-scoped document backend. It keeps no join state: every
/// relationship is a dotted path, nested ones open a nesting context.
#[derive(Debug, Default)]
pub struct DocumentBackend;

impl DocumentBackend {
    pub fn new() -> Self {
        Self
    }

    fn compare(&self, path: &ResolvedPath, field: &DocField, op: Operator, value: Value) -> CompileResult<Query> {
        let key = path.path.as_str();
        let name = field.path.clone();
        let query = match op.base {
            BaseOp::Exact if value.is_null() => Query::must_not(vec![Query::exists(name)]),
            BaseOp::Exact | BaseOp::HasKey => Query::term(name, value),
            BaseOp::Gt | BaseOp::Gte | BaseOp::Lt | BaseOp::Lte => {
                let mut bounds = IndexMap::new();
                bounds.insert(op.base.suffix(), value);
                Query::range(name, bounds)
            }
            BaseOp::Range => {
                let [low, high] = <[Value; 2]>::try_from(into_list(value))
                    .map_err(|_| CompileError::invalid_attribute(key, "range expects exactly two values"))?;
                let mut bounds = IndexMap::new();
                bounds.insert("gte", low);
                bounds.insert("lte", high);
                Query::range(name, bounds)
            }
            BaseOp::In | BaseOp::HasAny | BaseOp::Overlap => Query::terms(name, into_list(value)),
            BaseOp::HasAll => {
                let mut clauses: Vec<Query> = into_list(value)
                    .into_iter()
                    .map(|item| Query::term(name.clone(), item))
                    .collect();
                match clauses.len() {
                    1 => clauses.remove(0),
                    _ => Query::must(clauses),
                }
            }
            BaseOp::Contains if field.multi => Query::terms(name, into_list(value)),
            BaseOp::Contains => Query::Wildcard {
                field: name,
                pattern: format!("*{}*", escape_wildcard(&text_operand(key, &value)?)),
            },
            BaseOp::EndsWith => Query::Wildcard {
                field: name,
                pattern: format!("*{}", escape_wildcard(&text_operand(key, &value)?)),
            },
            BaseOp::StartsWith => Query::Prefix { field: name, value },
            BaseOp::Match => Query::Match {
                field: name,
                query: value,
                options: None,
            },
            BaseOp::IsNull | BaseOp::IsNotNull => {
                let flag = value.as_bool().unwrap_or(true);
                if (op.base == BaseOp::IsNotNull) == flag {
                    Query::exists(name)
                } else {
                    Query::must_not(vec![Query::exists(name)])
                }
            }
            BaseOp::IExact
            | BaseOp::IContains
            | BaseOp::IStartsWith
            | BaseOp::IEndsWith
            | BaseOp::Year
            | BaseOp::Month
            | BaseOp::Day
            | BaseOp::Func
            | BaseOp::SFunc
            | BaseOp::EFunc => return Err(unsupported(key, &op.suffix())),
        };
        Ok(if op.negated {
            Query::must_not(vec![query])
        } else {
            query
        })
    }
}

impl Backend for DocumentBackend {
    type Field = DocField;
    type Expr = Query;
    type Order = Sort;

    fn resolve_relationship(&mut self, _path: &ResolvedPath, _outer: bool) -> CompileResult<()> {
        Ok(())
    }

    fn resolve_field(&mut self, path: &ResolvedPath) -> CompileResult<DocField> {
        let mut parts: Vec<&str> = Vec::with_capacity(path.hops.len() + 1);
        let mut nested = None;
        for hop in &path.hops {
            parts.push(&hop.relationship.name);
            if hop.relationship.nested {
                nested = Some(parts.join("."));
            }
        }
        parts.push(&path.field.name);
        let mut name = parts.join(".");
        if path.mode == Mode::Aggregate && path.field.raw && path.field.field_type == FieldType::String {
            name.push_str(RAW_SUFFIX);
        }
        Ok(DocField {
            path: name,
            nested,
            field_type: path.field.field_type,
            multi: path.field.multi,
        })
    }

    fn build_leaf_expression(&mut self, leaf: Leaf<DocField>) -> CompileResult<Query> {
        let Leaf {
            path,
            field,
            wrappers,
            terminal,
            operand,
        } = leaf;
        if let Some(name) = wrappers.first() {
            return Err(unsupported(&path.path, name));
        }
        let value = match operand {
            Operand::Value(value) => value,
            Operand::Field(_) => return Err(unsupported(&path.path, BaseOp::EFunc.suffix())),
        };
        let query = match terminal {
            Terminal::Compare(op) => self.compare(&path, &field, op, value)?,
            Terminal::Call { name, .. } => return Err(unsupported(&path.path, &name)),
            Terminal::Text(conjunction) => text_query(&path.path, &field, conjunction, &value)?,
        };
        Ok(match field.nested {
            Some(nested) => Query::nested(nested, query),
            None => query,
        })
    }

    fn combine(&mut self, op: LogicalOp, children: Vec<Query>) -> Query {
        match op {
            LogicalOp::Or => Query::should(children),
            _ => Query::must(children),
        }
    }

    fn negate(&mut self, expr: Query) -> Query {
        Query::must_not(vec![expr])
    }

    fn group_siblings(&mut self, children: Vec<Query>, op: LogicalOp) -> Vec<Query> {
        nested::group_siblings(children, op)
    }

    fn build_order(&mut self, key: OrderKey<DocField, Query>) -> CompileResult<Sort> {
        match key.target {
            Target::Field(field) => Ok(Sort::Field {
                field: field.path,
                ascending: key.ascending,
                nested: field.nested,
            }),
            Target::Expression(_) => Err(CompileError::invalid_attribute(
                &key.path.path,
                "only plain columns can be used to sort documents",
            )),
        }
    }

    fn special_order(&mut self, name: &str, ascending: bool) -> Option<Sort> {
        (name == SCORE).then_some(Sort::Score { ascending })
    }
}

fn unsupported(key: &str, operator: &str) -> CompileError {
    CompileError::invalid_attribute(
        key,
        format!("{} is not supported by the document backend", operator),
    )
}

fn into_list(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        scalar => vec![scalar],
    }
}

fn text_operand(key: &str, value: &Value) -> CompileResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(CompileError::invalid_attribute(
            key,
            format!("{} is expected to be a string", other),
        )),
    }
}

fn escape_wildcard(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '*' | '?' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// `match` query over the search terms. A list of terms becomes a string
/// of quoted phrases.
fn text_query(key: &str, field: &DocField, conjunction: Conjunction, value: &Value) -> CompileResult<Query> {
    let query = match value {
        Value::Array(terms) => {
            let phrases = terms
                .iter()
                .map(|term| {
                    text_operand(key, term)
                        .map(|t| format!("\"{}\"", t.replace('\\', "\\\\").replace('"', "\\\"")))
                })
                .collect::<CompileResult<Vec<_>>>()?;
            Value::String(phrases.join(" "))
        }
        other => Value::String(text_operand(key, other)?),
    };
    let operator = match conjunction {
        Conjunction::Or => "or",
        Conjunction::And => "and",
    };
    Ok(Query::Match {
        field: field.path.clone(),
        query,
        options: Some(MatchOptions { operator, boost: 1 }),
    })
}
