//! Relational backend: compiles filters, order criteria and totals into the
//! typed SQL AST of [`crate::sql`].
//!
//! - [`RelationalBackend`] - the [`Backend`] adapter producing [`Expr`]s
//! - [`joins`] - materialization of join chains into `JOIN` clauses
//! - [`totals`] - grouped aggregate queries
//! - [`rows`] - flattening of aggregate rows into totals mappings

pub mod joins;
pub mod rows;
pub mod totals;

pub use rows::flatten_rows;
pub use totals::TotalsQuery;

use std::sync::Arc;

use serde_json::Value;

use crate::config::Settings;
use crate::error::{CompileError, CompileResult};
use crate::filter::{
    Backend, BaseOp, Conjunction, JoinRegistry, Leaf, LogicalOp, Operand, Operator, OrderKey,
    ResolvedPath, Target, Terminal,
};
use crate::schema::{EntitySchema, FieldType};
use crate::sql::{
    extract, func, lit_bool, lit_float, lit_int, lit_null, lit_str, table_col, BinaryOperator,
    DatePart, Dialect, Expr, ExprExt, OrderByExpr, Query, SqlDialect, TableRef,
};

/// Character escaping `%`, `_` and itself in generated LIKE patterns.
const LIKE_ESCAPE: char = '\\';

/// Request-scoped SQL backend.
#[derive(Debug)]
pub struct RelationalBackend<'a> {
    root: Arc<EntitySchema>,
    settings: &'a Settings,
    dialect: Dialect,
    joins: JoinRegistry,
}

impl<'a> RelationalBackend<'a> {
    pub fn new(root: Arc<EntitySchema>, settings: &'a Settings, dialect: Dialect) -> Self {
        Self::with_joins(root, settings, dialect, JoinRegistry::new())
    }

    pub fn with_joins(
        root: Arc<EntitySchema>,
        settings: &'a Settings,
        dialect: Dialect,
        joins: JoinRegistry,
    ) -> Self {
        Self {
            root,
            settings,
            dialect,
            joins,
        }
    }

    pub fn root(&self) -> &Arc<EntitySchema> {
        &self.root
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn joins(&self) -> &JoinRegistry {
        &self.joins
    }

    /// `FROM` item of the root entity.
    pub fn root_table(&self) -> TableRef {
        TableRef::new(&self.root.table).with_schema(self.root.schema.as_deref())
    }

    /// Assemble the row query: root columns, materialized joins, the filter
    /// and the order.
    ///
    /// `DISTINCT` is applied when a join was made for a filter. Order
    /// expressions that are not root columns are then added to the select
    /// list, since `SELECT DISTINCT` may only order by selected values.
    pub fn into_query(self, filter: Option<Expr>, order: Vec<OrderByExpr>) -> Query {
        let distinct = filter.is_some() && !self.joins.is_empty();
        let mut select = vec![Expr::Star {
            table: Some(self.root.table.clone()),
        }];
        if distinct {
            select.extend(
                order
                    .iter()
                    .filter(|o| !is_column_of(&o.expr, &self.root.table))
                    .map(|o| o.expr.clone()),
            );
        }

        let mut query = Query::new().select(select).from(self.root_table());
        query = joins::apply(query, &self.root, &self.joins.materialize());
        if distinct {
            query = query.distinct();
        }
        if let Some(filter) = filter {
            query = query.filter(filter);
        }
        query.order_by(order)
    }

    fn compare(
        &self,
        path: &ResolvedPath,
        expr: Expr,
        op: Operator,
        operand: Operand<Expr>,
        coerce: bool,
    ) -> CompileResult<Expr> {
        let key = path.path.as_str();
        let field_type = coerce.then_some(path.field.field_type);
        let value = match operand {
            Operand::Field(other) => return self.compare_fields(key, expr, op, other),
            Operand::Value(value) => value,
        };

        let compared = match op.base {
            BaseOp::Exact if value.is_null() => {
                return Ok(if op.negated {
                    expr.is_not_null()
                } else {
                    expr.is_null()
                });
            }
            BaseOp::Exact => {
                let value = literal(&coerce_value(key, field_type, &value)?);
                return Ok(if op.negated { expr.ne(value) } else { expr.eq(value) });
            }
            BaseOp::Gt => expr.gt(literal(&coerce_value(key, field_type, &value)?)),
            BaseOp::Gte => expr.gte(literal(&coerce_value(key, field_type, &value)?)),
            BaseOp::Lt => expr.lt(literal(&coerce_value(key, field_type, &value)?)),
            BaseOp::Lte => expr.lte(literal(&coerce_value(key, field_type, &value)?)),
            BaseOp::Range => {
                let bounds = coerce_list(key, field_type, &value)?;
                let [low, high] = <[Value; 2]>::try_from(bounds).map_err(|_| {
                    CompileError::invalid_attribute(key, "range expects exactly two values")
                })?;
                return Ok(if op.negated {
                    expr.not_between(literal(&low), literal(&high))
                } else {
                    expr.between(literal(&low), literal(&high))
                });
            }
            BaseOp::In => {
                let values = coerce_list(key, field_type, &value)?
                    .iter()
                    .map(literal)
                    .collect();
                return Ok(if op.negated {
                    expr.not_in_list(values)
                } else {
                    expr.in_list(values)
                });
            }
            BaseOp::Contains if is_container(path, coerce) => {
                self.require_containers(key, op)?;
                expr.binary(BinaryOperator::Contains, container_literal(&path.field.field_type, &value))
            }
            BaseOp::Contains
            | BaseOp::IContains
            | BaseOp::StartsWith
            | BaseOp::IStartsWith
            | BaseOp::EndsWith
            | BaseOp::IEndsWith => {
                let text = escape_like(&text_operand(key, &value)?);
                let pattern = match op.base {
                    BaseOp::StartsWith | BaseOp::IStartsWith => format!("{}%", text),
                    BaseOp::EndsWith | BaseOp::IEndsWith => format!("%{}", text),
                    _ => format!("%{}%", text),
                };
                return Ok(expr.like(
                    lit_str(&pattern),
                    Some(LIKE_ESCAPE),
                    op.base.is_case_insensitive(),
                    op.negated,
                ));
            }
            BaseOp::IExact => {
                let text = text_operand(key, &value)?;
                return Ok(expr.like(lit_str(&text), None, true, op.negated));
            }
            BaseOp::Match => {
                if !self.dialect.supports_full_text_search() {
                    return Err(self.unsupported(key, op));
                }
                let query = func("to_tsquery", vec![lit_str(&text_operand(key, &value)?)]);
                expr.binary(BinaryOperator::TextMatch, query)
            }
            BaseOp::HasKey | BaseOp::HasAll | BaseOp::HasAny | BaseOp::Overlap => {
                if !is_container(path, coerce) {
                    return Err(CompileError::invalid_attribute(
                        key,
                        format!("{} requires an array or json column", op.suffix()),
                    ));
                }
                self.require_containers(key, op)?;
                let (operator, right) = match op.base {
                    BaseOp::HasKey => (BinaryOperator::HasKey, lit_str(&text_operand(key, &value)?)),
                    BaseOp::HasAll => (BinaryOperator::HasAll, string_array(key, &value)?),
                    BaseOp::HasAny => (BinaryOperator::HasAny, string_array(key, &value)?),
                    _ => (
                        BinaryOperator::Overlap,
                        container_literal(&FieldType::Array, &value),
                    ),
                };
                expr.binary(operator, right)
            }
            BaseOp::IsNull | BaseOp::IsNotNull => {
                let flag = value.as_bool().unwrap_or(true);
                return Ok(if (op.base == BaseOp::IsNull) == flag {
                    expr.is_null()
                } else {
                    expr.is_not_null()
                });
            }
            BaseOp::Year | BaseOp::Month | BaseOp::Day => {
                let part = match op.base {
                    BaseOp::Year => DatePart::Year,
                    BaseOp::Month => DatePart::Month,
                    _ => DatePart::Day,
                };
                let value = literal(&coerce_value(key, Some(FieldType::Int), &value)?);
                let part = extract(part, expr);
                return Ok(if op.negated { part.ne(value) } else { part.eq(value) });
            }
            BaseOp::Func | BaseOp::SFunc | BaseOp::EFunc => {
                return Err(CompileError::invalid_attribute(
                    key,
                    format!("part {} is expected to be a known operator", op.suffix()),
                ));
            }
        };

        Ok(if op.negated { compared.not() } else { compared })
    }

    /// Comparison of two fields, from `efunc` paths ending in an operator.
    fn compare_fields(&self, key: &str, expr: Expr, op: Operator, other: Expr) -> CompileResult<Expr> {
        let compared = match op.base {
            BaseOp::Exact if op.negated => return Ok(expr.ne(other)),
            BaseOp::Exact => expr.eq(other),
            BaseOp::Gt => expr.gt(other),
            BaseOp::Gte => expr.gte(other),
            BaseOp::Lt => expr.lt(other),
            BaseOp::Lte => expr.lte(other),
            _ => {
                return Err(CompileError::invalid_attribute(
                    key,
                    format!("{} cannot compare two columns", op.suffix()),
                ));
            }
        };
        Ok(if op.negated { compared.not() } else { compared })
    }

    fn text_query(&self, path: &ResolvedPath, expr: Expr, conjunction: Conjunction, value: &Value) -> CompileResult<Expr> {
        let key = path.path.as_str();
        if !self.dialect.supports_full_text_search() {
            return Err(CompileError::invalid_attribute(
                key,
                format!("{:?} has no full-text search", self.dialect),
            ));
        }
        let terms = match value {
            Value::Array(items) => items
                .iter()
                .map(|item| text_operand(key, item))
                .collect::<CompileResult<Vec<_>>>()?,
            other => vec![text_operand(key, other)?],
        };
        let language = &self.settings.relational.text_search_language;
        let operator = match conjunction {
            Conjunction::Or => BinaryOperator::QueryOr,
            Conjunction::And => BinaryOperator::QueryAnd,
        };
        let query = terms
            .iter()
            .map(|term| func("plainto_tsquery", vec![lit_str(language), lit_str(term)]))
            .reduce(|acc, next| Expr::Paren(Box::new(acc.binary(operator, next))))
            .ok_or_else(|| CompileError::invalid_attribute(key, "expects at least one search term"))?;
        Ok(func("to_tsvector", vec![expr]).binary(BinaryOperator::TextMatch, query))
    }

    fn require_containers(&self, key: &str, op: Operator) -> CompileResult<()> {
        if self.dialect.supports_container_operators() {
            Ok(())
        } else {
            Err(self.unsupported(key, op))
        }
    }

    fn unsupported(&self, key: &str, op: Operator) -> CompileError {
        CompileError::invalid_attribute(
            key,
            format!("operator {} is not supported by {:?}", op.suffix(), self.dialect),
        )
    }
}

impl Backend for RelationalBackend<'_> {
    type Field = Expr;
    type Expr = Expr;
    type Order = OrderByExpr;

    fn resolve_relationship(&mut self, path: &ResolvedPath, outer: bool) -> CompileResult<()> {
        self.joins.register(&path.hops, outer);
        Ok(())
    }

    fn resolve_field(&mut self, path: &ResolvedPath) -> CompileResult<Expr> {
        if path.hops.is_empty() {
            return Ok(table_col(&self.root.table, &path.field.name));
        }
        let alias = self.joins.alias(&path.relationship_path()).ok_or_else(|| {
            CompileError::invalid_attribute(&path.path, "relationship was not joined")
        })?;
        Ok(table_col(&alias.name, &path.field.name))
    }

    fn build_leaf_expression(&mut self, leaf: Leaf<Expr>) -> CompileResult<Expr> {
        let Leaf {
            path,
            field,
            wrappers,
            terminal,
            operand,
        } = leaf;
        let coerce = wrappers.is_empty();
        let expr = wrappers
            .iter()
            .fold(field, |expr, name| func(name, vec![expr]));

        match terminal {
            Terminal::Compare(op) => self.compare(&path, expr, op, operand, coerce),
            Terminal::Call { name, unary: true } => Ok(func(&name, vec![expr])),
            Terminal::Call { name, unary: false } => {
                let argument = match operand {
                    Operand::Field(other) => other,
                    Operand::Value(value) => literal(&value),
                };
                Ok(func(&name, vec![expr, argument]))
            }
            Terminal::Text(conjunction) => match operand {
                Operand::Value(value) => self.text_query(&path, expr, conjunction, &value),
                Operand::Field(_) => Err(CompileError::invalid_attribute(
                    &path.path,
                    "a text query expects search terms",
                )),
            },
        }
    }

    fn combine(&mut self, op: LogicalOp, children: Vec<Expr>) -> Expr {
        children
            .into_iter()
            .map(Expr::grouped)
            .reduce(|acc, next| match op {
                LogicalOp::Or => acc.or(next),
                _ => acc.and(next),
            })
            .unwrap_or_else(|| lit_bool(op != LogicalOp::Or))
    }

    fn negate(&mut self, expr: Expr) -> Expr {
        expr.not()
    }

    fn build_order(&mut self, key: OrderKey<Expr, Expr>) -> CompileResult<OrderByExpr> {
        let expr = match key.target {
            Target::Field(expr) | Target::Expression(expr) => expr,
        };
        Ok(if key.ascending {
            OrderByExpr::asc(expr)
        } else {
            OrderByExpr::desc(expr)
        })
    }
}

fn is_column_of(expr: &Expr, table: &str) -> bool {
    matches!(expr, Expr::Column { table: Some(t), .. } if t == table)
}

fn is_container(path: &ResolvedPath, coerce: bool) -> bool {
    coerce && path.field.field_type.is_container()
}

/// Convert a request value to a SQL literal.
pub fn literal(value: &Value) -> Expr {
    match value {
        Value::Null => lit_null(),
        Value::Bool(b) => lit_bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => lit_int(i),
            None => lit_float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => lit_str(s),
        Value::Array(items) => Expr::Array(items.iter().map(literal).collect()),
        Value::Object(_) => lit_str(&value.to_string()),
    }
}

/// `ARRAY[...]` for array columns, a JSON document literal for json columns.
fn container_literal(field_type: &FieldType, value: &Value) -> Expr {
    match (field_type, value) {
        (FieldType::Array, Value::Array(_)) => literal(value),
        (FieldType::Array, scalar) => Expr::Array(vec![literal(scalar)]),
        _ => lit_str(&value.to_string()),
    }
}

fn string_array(key: &str, value: &Value) -> CompileResult<Expr> {
    let items = match value {
        Value::Array(items) => items.clone(),
        scalar => vec![scalar.clone()],
    };
    let keys = items
        .iter()
        .map(|item| text_operand(key, item).map(|s| lit_str(&s)))
        .collect::<CompileResult<Vec<_>>>()?;
    Ok(Expr::Array(keys))
}

fn coerce_value(key: &str, field_type: Option<FieldType>, value: &Value) -> CompileResult<Value> {
    match field_type {
        Some(field_type) => field_type
            .coerce(value)
            .map_err(|reason| CompileError::invalid_attribute(key, reason)),
        None => Ok(value.clone()),
    }
}

fn coerce_list(key: &str, field_type: Option<FieldType>, value: &Value) -> CompileResult<Vec<Value>> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| coerce_value(key, field_type, item))
            .collect(),
        scalar => Ok(vec![coerce_value(key, field_type, scalar)?]),
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

fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_') || c == LIKE_ESCAPE {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}
