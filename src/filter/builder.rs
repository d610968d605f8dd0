//! Backend-independent filter compilation.
//!
//! Walks a [`Condition`] tree, resolves every leaf path, normalizes its
//! operand and hands the leaf to the [`Backend`]. Levels are combined the
//! same way for every backend: an empty level vanishes, a single child
//! stands alone and a `not` level negates the conjunction of its children.

use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use super::backend::{Backend, Leaf, Operand, Target, Terminal};
use super::condition::{Condition, LogicalOp};
use super::ops::{check_function_name, BaseOp, Operator};
use super::path::{Mode, PathKind, ResolvedPath, Resolver, SEPARATOR};
use crate::config::Settings;
use crate::error::{CompileError, CompileResult};
use crate::schema::parse_flag;

/// Drives a backend through filters and order criteria of one request.
pub struct FilterBuilder<'a, B: Backend> {
    resolver: Resolver<'a>,
    settings: &'a Settings,
    backend: B,
}

impl<'a, B: Backend> FilterBuilder<'a, B> {
    pub fn new(resolver: Resolver<'a>, settings: &'a Settings, backend: B) -> Self {
        Self {
            resolver,
            settings,
            backend,
        }
    }

    pub fn resolver(&self) -> &Resolver<'a> {
        &self.resolver
    }

    pub fn settings(&self) -> &'a Settings {
        self.settings
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Compile a condition tree. `None` when nothing is left to filter on.
    pub fn build(&mut self, condition: &Condition) -> CompileResult<Option<B::Expr>> {
        match condition {
            Condition::Leaf { key, value, .. } => self.build_leaf(key, value, Mode::Filter),
            Condition::Logical { op, children } => {
                let mut expressions = Vec::with_capacity(children.len());
                for child in children {
                    if let Some(expr) = self.build(child)? {
                        expressions.push(expr);
                    }
                }
                Ok(self.combine_level(*op, expressions))
            }
        }
    }

    fn combine_level(&mut self, op: LogicalOp, mut expressions: Vec<B::Expr>) -> Option<B::Expr> {
        let inner = match op {
            LogicalOp::Not => LogicalOp::And,
            other => other,
        };
        if expressions.len() > 1 {
            expressions = self.backend.group_siblings(expressions, inner);
        }
        let combined = match expressions.len() {
            0 => return None,
            1 => expressions.pop()?,
            _ => self.backend.combine(inner, expressions),
        };
        Some(match op {
            LogicalOp::Not => self.backend.negate(combined),
            _ => combined,
        })
    }

    pub(crate) fn build_leaf(
        &mut self,
        key: &str,
        value: &Value,
        mode: Mode,
    ) -> CompileResult<Option<B::Expr>> {
        let path = match self.resolver.resolve_tokens(key, mode) {
            Ok(path) => path,
            Err(e) if e.unknown_column && self.settings.filter.ignore_unknown => {
                warn!(param = key, "skipping parameter naming an unknown column");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let leaf = self.leaf(path, value)?;
        self.backend.build_leaf_expression(leaf).map(Some)
    }

    /// Resolve a column reference for ordering or aggregation.
    ///
    /// A plain field path yields the field itself; an operator or function
    /// suffix yields the leaf expression built with `value` as operand.
    /// `None` when the path names an unknown column that is ignored.
    pub fn build_target(
        &mut self,
        key: &str,
        value: &Value,
        mode: Mode,
    ) -> CompileResult<Option<(ResolvedPath, Target<B::Field, B::Expr>)>> {
        let path = match self.resolver.resolve_tokens(key, mode) {
            Ok(path) => path,
            Err(e) if e.unknown_column && self.settings.filter.ignore_unknown => {
                warn!(param = key, "skipping reference to an unknown column");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let target = if is_plain(&path) {
            self.backend.resolve_relationship(&path, false)?;
            Target::Field(self.backend.resolve_field(&path)?)
        } else {
            let leaf = self.leaf(path.clone(), value)?;
            Target::Expression(self.backend.build_leaf_expression(leaf)?)
        };
        Ok(Some((path, target)))
    }

    /// Turn a resolved path and its request value into a backend leaf.
    pub(crate) fn leaf(&mut self, path: ResolvedPath, value: &Value) -> CompileResult<Leaf<B::Field>> {
        if let PathKind::Text { conjunction } = path.kind {
            self.backend.resolve_relationship(&path, false)?;
            let field = self.backend.resolve_field(&path)?;
            return Ok(Leaf {
                path,
                field,
                wrappers: Vec::new(),
                terminal: Terminal::Text(conjunction),
                operand: Operand::Value(value.clone()),
            });
        }
        let (operator, args) = match &path.kind {
            PathKind::Comparison { operator, args } => (*operator, args.clone()),
            PathKind::Text { .. } => (Operator::EXACT, Vec::new()),
        };

        let key = path.path.clone();
        let settings = self.settings;
        let functions = &settings.functions;
        let mut wrappers = Vec::new();
        let mut argument = None;

        let terminal = if operator.base.is_func() {
            let Some((last, middle)) = args.split_last() else {
                return Err(CompileError::invalid_attribute(
                    &key,
                    format!(
                        "part {} is expected to be followed by a function name",
                        operator.suffix()
                    ),
                ));
            };
            if operator.base == BaseOp::EFunc && !middle.is_empty() {
                argument = Some(self.resolve_argument(&path, middle)?);
            } else {
                for name in middle {
                    check_function_name(name, functions, &key)?;
                    wrappers.push(name.clone());
                }
            }
            match Operator::parse(last) {
                Some(op) if op.base.is_func() => {
                    return Err(CompileError::invalid_attribute(
                        &key,
                        format!("part {} is expected to be a known operator", last),
                    ));
                }
                Some(op) => Terminal::Compare(op),
                None => {
                    check_function_name(last, functions, &key)?;
                    Terminal::Call {
                        name: last.clone(),
                        unary: operator.base == BaseOp::SFunc,
                    }
                }
            }
        } else {
            Terminal::Compare(operator)
        };

        let (value, outer) = match &terminal {
            Terminal::Compare(op) => normalize_operand(&key, *op, value)?,
            _ => (value.clone(), false),
        };

        self.backend.resolve_relationship(&path, outer)?;
        let field = self.backend.resolve_field(&path)?;
        let operand = match argument {
            Some(other) => {
                self.backend.resolve_relationship(&other, outer)?;
                Operand::Field(self.backend.resolve_field(&other)?)
            }
            None => Operand::Value(value),
        };

        Ok(Leaf {
            path,
            field,
            wrappers,
            terminal,
            operand,
        })
    }

    /// Resolve the field path between `efunc` and the function name,
    /// relative to the entity owning the filtered field.
    fn resolve_argument(&self, path: &ResolvedPath, tokens: &[String]) -> CompileResult<ResolvedPath> {
        let resolver = Resolver::new(
            self.resolver.registry(),
            Arc::clone(&path.entity),
            self.resolver.text_key(),
        );
        let other = resolver
            .resolve(&tokens.join(SEPARATOR), path.mode)
            .map_err(|e| e.with_path(&path.path))?;
        if !is_plain(&other) {
            return Err(CompileError::invalid_attribute(
                &path.path,
                "efunc arguments are expected to name a column",
            ));
        }
        let mut hops = path.hops.clone();
        hops.extend(other.hops);
        Ok(ResolvedPath {
            path: path.path.clone(),
            hops,
            ..other
        })
    }
}

/// A bare field reference, without operator or function suffix.
fn is_plain(path: &ResolvedPath) -> bool {
    matches!(
        &path.kind,
        PathKind::Comparison { operator, args } if *operator == Operator::EXACT && args.is_empty()
    )
}

/// Shape the operand for `op` and tell whether the test needs an outer join.
fn normalize_operand(key: &str, op: Operator, value: &Value) -> CompileResult<(Value, bool)> {
    if op.base.is_null_test() {
        let flag = parse_flag(value).ok_or_else(|| {
            CompileError::invalid_attribute(key, format!("{} is expected to be a boolean flag", value))
        })?;
        // Both `isnull=true` and `isnotnull=false` test for IS NULL.
        let outer = (op.base == BaseOp::IsNull) == flag;
        return Ok((Value::Bool(flag), outer));
    }

    let value = if op.base.takes_list() && !value.is_array() {
        Value::Array(vec![value.clone()])
    } else {
        value.clone()
    };
    if op.base == BaseOp::Range && value.as_array().map(Vec::len) != Some(2) {
        return Err(CompileError::invalid_attribute(
            key,
            "range expects exactly two values",
        ));
    }

    let outer = op == Operator::EXACT && value.is_null();
    Ok((value, outer))
}
