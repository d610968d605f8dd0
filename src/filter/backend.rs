//! The seam between the shared filter algorithm and a query backend.

use std::fmt::Debug;

use serde_json::Value;

use super::condition::LogicalOp;
use super::ops::Operator;
use super::path::{Conjunction, ResolvedPath};
use crate::error::CompileResult;

/// What a leaf does with its (possibly wrapped) field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminal {
    /// Comparison against the operand.
    Compare(Operator),
    /// `name(expr, operand)`, or `name(expr)` when `unary`.
    Call { name: String, unary: bool },
    /// Free-text query with the operand as search terms.
    Text(Conjunction),
}

/// Right-hand side of a leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand<F> {
    /// A request value: a list for multi-value operators, a boolean flag
    /// for `isnull`/`isnotnull`, otherwise the raw decoded value.
    Value(Value),
    /// Another field, from `efunc`.
    Field(F),
}

/// A fully resolved leaf condition handed to the backend.
#[derive(Debug, Clone)]
pub struct Leaf<F> {
    pub path: ResolvedPath,
    pub field: F,
    /// Single-argument functions wrapped around the field, innermost first.
    pub wrappers: Vec<String>,
    pub terminal: Terminal,
    pub operand: Operand<F>,
}

/// What an order criterion or a totals column refers to.
#[derive(Debug, Clone)]
pub enum Target<F, E> {
    Field(F),
    /// An operator or function suffix applied to the field.
    Expression(E),
}

#[derive(Debug, Clone)]
pub struct OrderKey<F, E> {
    pub path: ResolvedPath,
    pub target: Target<F, E>,
    pub ascending: bool,
}

/// Query backend driven by the filter, order and totals builders.
///
/// A backend keeps the request-scoped state it needs (join registry,
/// nesting contexts) and is consumed once the query is assembled.
pub trait Backend {
    type Field: Clone + Debug;
    type Expr: Debug;
    type Order: Debug;

    /// Register the relationship hops of `path`. `outer` is set when rows
    /// without a related row must survive the join.
    fn resolve_relationship(&mut self, path: &ResolvedPath, outer: bool) -> CompileResult<()>;

    /// Reference to the field `path` ends in. Its relationships have been
    /// registered before.
    fn resolve_field(&mut self, path: &ResolvedPath) -> CompileResult<Self::Field>;

    fn build_leaf_expression(&mut self, leaf: Leaf<Self::Field>) -> CompileResult<Self::Expr>;

    /// Join two or more expressions. `op` is `And` or `Or`.
    fn combine(&mut self, op: LogicalOp, children: Vec<Self::Expr>) -> Self::Expr;

    fn negate(&mut self, expr: Self::Expr) -> Self::Expr;

    /// Regroup sibling expressions before they are combined with `op`.
    fn group_siblings(&mut self, children: Vec<Self::Expr>, _op: LogicalOp) -> Vec<Self::Expr> {
        children
    }

    fn build_order(
        &mut self,
        key: OrderKey<Self::Field, Self::Expr>,
    ) -> CompileResult<Self::Order>;

    /// Order names the backend understands without a schema path.
    fn special_order(&mut self, _name: &str, _ascending: bool) -> Option<Self::Order> {
        None
    }
}
