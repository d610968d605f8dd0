//! Token path resolution.
//!
//! A parameter name such as `other_models__third_models__name__startswith`
//! is split on `__` and walked against the entity schemas. Relationship
//! hops are committed lazily: a buffer naming a relationship only becomes a
//! hop once the next token cannot extend it into a longer field or
//! relationship name, so `meta__created` can be a field even when `meta`
//! is a relationship.

use std::sync::Arc;

use super::ops::Operator;
use crate::error::{CompileError, CompileResult};
use crate::schema::{EntitySchema, Field, Relationship, SchemaRegistry};

/// Separator between path tokens.
pub const SEPARATOR: &str = "__";

/// What a path is resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Filter,
    Order,
    /// Grouping and metrics. Document backends prefer `.raw` sub-fields.
    Aggregate,
}

/// How the terms of a free-text query are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conjunction {
    And,
    Or,
}

/// One relationship hop.
#[derive(Debug, Clone)]
pub struct Hop {
    pub relationship: Relationship,
    pub parent: Arc<EntitySchema>,
    pub target: Arc<EntitySchema>,
}

/// What the path ends in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathKind {
    /// A field, optionally followed by an operator and its argument tokens.
    Comparison {
        operator: Operator,
        /// Tokens after a `func`/`sfunc`/`efunc` operator.
        args: Vec<String>,
    },
    /// The free-text marker was found.
    Text { conjunction: Conjunction },
}

/// Result of resolving one parameter name.
#[derive(Debug, Clone)]
pub struct ResolvedPath {
    /// The original parameter name, used in error messages.
    pub path: String,
    pub hops: Vec<Hop>,
    /// Schema owning `field`.
    pub entity: Arc<EntitySchema>,
    pub field: Field,
    pub kind: PathKind,
    pub mode: Mode,
}

impl ResolvedPath {
    /// Relationship names of the hops.
    pub fn relationship_path(&self) -> Vec<String> {
        self.hops.iter().map(|h| h.relationship.name.clone()).collect()
    }

    /// Operator of a comparison, `exact` for free text.
    pub fn operator(&self) -> Operator {
        match &self.kind {
            PathKind::Comparison { operator, .. } => *operator,
            PathKind::Text { .. } => Operator::EXACT,
        }
    }
}

/// Resolution failure, telling unknown columns apart from other errors.
#[derive(Debug)]
pub(crate) struct PathError {
    pub error: CompileError,
    pub unknown_column: bool,
}

impl From<PathError> for CompileError {
    fn from(e: PathError) -> Self {
        e.error
    }
}

/// Walks token paths from a root entity.
#[derive(Debug, Clone)]
pub struct Resolver<'a> {
    registry: &'a SchemaRegistry,
    root: Arc<EntitySchema>,
    text_key: &'a str,
}

impl<'a> Resolver<'a> {
    pub fn new(registry: &'a SchemaRegistry, root: Arc<EntitySchema>, text_key: &'a str) -> Self {
        Self {
            registry,
            root,
            text_key,
        }
    }

    pub fn root(&self) -> &Arc<EntitySchema> {
        &self.root
    }

    pub fn registry(&self) -> &'a SchemaRegistry {
        self.registry
    }

    pub fn text_key(&self) -> &'a str {
        self.text_key
    }

    /// Resolve a `__`-separated parameter name.
    pub fn resolve(&self, key: &str, mode: Mode) -> CompileResult<ResolvedPath> {
        Ok(self.resolve_tokens(key, mode)?)
    }

    pub(crate) fn resolve_tokens(&self, key: &str, mode: Mode) -> Result<ResolvedPath, PathError> {
        let tokens: Vec<&str> = key.split(SEPARATOR).collect();
        let mut current = Arc::clone(&self.root);
        let mut hops: Vec<Hop> = Vec::new();
        let mut buffer = String::new();
        // Field bound so far and the number of tokens in the buffer when it was bound.
        let mut bound: Option<(Field, usize)> = None;
        let mut buffered = 0usize;

        for (index, &token) in tokens.iter().enumerate() {
            if token == self.text_key {
                if bound.is_none() {
                    self.commit_pending(&mut current, &mut hops, &mut buffer, key)?;
                }
                return self.text_query(key, mode, current, hops, bound.map(|b| b.0), &tokens);
            }

            if let Some((field, used)) = &bound {
                if let Some(operator) = Operator::parse(token) {
                    if *used != buffered {
                        return Err(unknown(key, tokens[index - buffered + *used], true));
                    }
                    let field = field.clone();
                    let args = if operator.base.is_func() {
                        tokens[index + 1..].iter().map(|t| t.to_string()).collect()
                    } else if index + 1 < tokens.len() {
                        return Err(unknown(key, tokens[index + 1], true));
                    } else {
                        Vec::new()
                    };
                    return Ok(ResolvedPath {
                        path: key.to_string(),
                        hops,
                        entity: current,
                        field,
                        kind: PathKind::Comparison { operator, args },
                        mode,
                    });
                }
            }

            if !buffer.is_empty() && current.relationship(&buffer).is_some() {
                let longer = format!("{}{}{}", buffer, SEPARATOR, token);
                if current.field(&longer).is_none()
                    && current.relationship(&longer).is_none()
                    && !current.has_prefix(&longer)
                {
                    self.commit_pending(&mut current, &mut hops, &mut buffer, key)?;
                    buffered = 0;
                    bound = None;
                }
            }

            if !buffer.is_empty() {
                buffer.push_str(SEPARATOR);
            }
            buffer.push_str(token);
            buffered += 1;

            if let Some(field) = current.field(&buffer) {
                bound = Some((field.clone(), buffered));
            } else if current.relationship(&buffer).is_none() && !current.has_prefix(&buffer) {
                return Err(unknown(key, token, bound.is_some()));
            }
        }

        match bound {
            Some((field, used)) => {
                if used != buffered {
                    return Err(unknown(key, tokens[tokens.len() - buffered + used], true));
                }
                Ok(ResolvedPath {
                    path: key.to_string(),
                    hops,
                    entity: current,
                    field,
                    kind: PathKind::Comparison {
                        operator: Operator::EXACT,
                        args: Vec::new(),
                    },
                    mode,
                })
            }
            None => Err(PathError {
                error: CompileError::invalid_attribute(
                    key,
                    "it is expected to be a known column name",
                ),
                unknown_column: true,
            }),
        }
    }

    /// Turn a buffer naming a relationship of `current` into a hop.
    fn commit_pending(
        &self,
        current: &mut Arc<EntitySchema>,
        hops: &mut Vec<Hop>,
        buffer: &mut String,
        key: &str,
    ) -> Result<(), PathError> {
        let Some(relationship) = current.relationship(buffer) else {
            return Ok(());
        };
        let target = self
            .registry
            .get(&relationship.target)
            .map_err(|error| PathError {
                error: CompileError::invalid_attribute(key, error.to_string()),
                unknown_column: false,
            })?;
        hops.push(Hop {
            relationship: relationship.clone(),
            parent: Arc::clone(current),
            target: Arc::clone(target),
        });
        *current = Arc::clone(target);
        buffer.clear();
        Ok(())
    }

    fn text_query(
        &self,
        key: &str,
        mode: Mode,
        entity: Arc<EntitySchema>,
        hops: Vec<Hop>,
        bound: Option<Field>,
        tokens: &[&str],
    ) -> Result<ResolvedPath, PathError> {
        let fail = |reason: &str| PathError {
            error: CompileError::invalid_attribute(key, reason),
            unknown_column: false,
        };
        if mode != Mode::Filter {
            return Err(fail("free-text queries can only be used as filters"));
        }
        let Some(text) = &entity.text_search else {
            return Err(fail("specific object can't provide a query"));
        };
        let field = match bound {
            Some(field) => field,
            None => entity
                .field(&text.default_field)
                .cloned()
                .ok_or_else(|| fail("specific object can't provide a query"))?,
        };
        let conjunction = if tokens.last() == Some(&"or") {
            Conjunction::Or
        } else {
            Conjunction::And
        };
        Ok(ResolvedPath {
            path: key.to_string(),
            hops,
            entity,
            field,
            kind: PathKind::Text { conjunction },
            mode,
        })
    }
}

fn unknown(key: &str, token: &str, expects_operator: bool) -> PathError {
    let expected = if expects_operator {
        "a known operator"
    } else {
        "a known column name"
    };
    PathError {
        error: CompileError::invalid_attribute(
            key,
            format!("part {} is expected to be {}", token, expected),
        ),
        unknown_column: !expects_operator,
    }
}
