//! Request-scoped join/alias registry.
//!
//! Every relationship path met while compiling gets one alias, and every
//! use of a path records a join chain. Once compilation is done only the
//! maximal chains are materialized; a chain that is a prefix of another one
//! hands its outer-join requirement to it.

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::debug;

use super::path::Hop;
use crate::schema::JoinKey;

/// Alias assigned to one relationship path.
#[derive(Debug, Clone)]
pub struct JoinAlias {
    pub name: String,
    /// Alias of the link table of a secondary join.
    pub link: Option<String>,
    pub hop: Hop,
}

/// One join to emit, parents before children.
#[derive(Debug, Clone)]
pub struct JoinStep {
    pub path: Vec<String>,
    pub alias: JoinAlias,
    /// Alias of the parent step, `None` for a step off the root entity.
    pub parent: Option<String>,
    pub outer: bool,
}

#[derive(Debug, Clone, Default)]
pub struct JoinRegistry {
    prefix: String,
    aliases: IndexMap<Vec<String>, JoinAlias>,
    counters: HashMap<String, usize>,
    /// Registered chains and whether any use of them needs an outer join.
    chains: IndexMap<Vec<String>, bool>,
}

impl JoinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose aliases start with `prefix`, e.g. `totals_`.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    /// Record the chain of `hops` and return the alias of its last hop.
    pub fn register(&mut self, hops: &[Hop], outer: bool) -> Option<&JoinAlias> {
        if hops.is_empty() {
            return None;
        }
        let mut path = Vec::with_capacity(hops.len());
        for hop in hops {
            path.push(hop.relationship.name.clone());
            if !self.aliases.contains_key(&path) {
                let name = self.next_name(&hop.relationship.name);
                let link = match &hop.relationship.join {
                    JoinKey::Secondary { table, .. } => Some(self.next_name(table)),
                    JoinKey::Direct { .. } => None,
                };
                self.aliases.insert(
                    path.clone(),
                    JoinAlias {
                        name,
                        link,
                        hop: hop.clone(),
                    },
                );
            }
        }
        *self.chains.entry(path.clone()).or_insert(false) |= outer;
        self.aliases.get(&path)
    }

    fn next_name(&mut self, base: &str) -> String {
        let counter = self.counters.entry(base.to_string()).or_insert(0);
        *counter += 1;
        format!("{}{}_{}", self.prefix, base, counter)
    }

    pub fn alias(&self, path: &[String]) -> Option<&JoinAlias> {
        self.aliases.get(path)
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// Number of aliased relationship paths.
    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    /// Chains not contained in a longer registered chain, with the outer
    /// requirement of every chain they contain folded in.
    pub fn maximal_chains(&self) -> Vec<(Vec<String>, bool)> {
        self.chains
            .iter()
            .filter(|(path, _)| {
                !self
                    .chains
                    .keys()
                    .any(|other| other.len() > path.len() && other.starts_with(path))
            })
            .map(|(path, _)| {
                let outer = self
                    .chains
                    .iter()
                    .any(|(other, outer)| *outer && path.starts_with(other));
                (path.clone(), outer)
            })
            .collect()
    }

    /// Joins to emit, deduplicated by relationship path.
    ///
    /// A step is outer when any maximal chain through it is outer, or when
    /// its parent step is.
    pub fn materialize(&self) -> Vec<JoinStep> {
        let maximal = self.maximal_chains();
        let mut steps: IndexMap<Vec<String>, JoinStep> = IndexMap::new();

        for (path, _) in &maximal {
            for depth in 1..=path.len() {
                let step_path = &path[..depth];
                if steps.contains_key(step_path) {
                    continue;
                }
                let Some(alias) = self.aliases.get(step_path) else {
                    continue;
                };
                let parent_path = &path[..depth - 1];
                let parent = steps.get(parent_path);
                let through_outer = maximal
                    .iter()
                    .any(|(other, outer)| *outer && other.starts_with(step_path));
                let outer = through_outer || parent.is_some_and(|p| p.outer);
                let step = JoinStep {
                    path: step_path.to_vec(),
                    alias: alias.clone(),
                    parent: parent.map(|p| p.alias.name.clone()),
                    outer,
                };
                steps.insert(step_path.to_vec(), step);
            }
        }

        debug!(
            chains = self.chains.len(),
            maximal = maximal.len(),
            joins = steps.len(),
            "materialized join chains"
        );
        steps.into_values().collect()
    }
}
