//! Regrouping sibling clauses by nesting context.
//!
//! Clauses on the same nested path are evaluated against separate nested
//! documents unless they share one `nested` clause. Siblings
//! `{a.b: c, a.b: d, a: e, f}` become `{a: {a.b: {c, d}, e}, f}`.

use tracing::debug;

use super::dsl::Query;
use crate::filter::LogicalOp;

/// Merge sibling `nested` clauses sharing a path.
///
/// The deepest path (by number of dots) shared by at least two clauses is
/// merged first. A clause on a deeper path counts as a member of every
/// enclosing path and is kept whole inside the merged clause. Merging
/// repeats until no path has more than one member.
pub fn group_siblings(mut clauses: Vec<Query>, op: LogicalOp) -> Vec<Query> {
    while let Some(path) = deepest_shared_path(&clauses) {
        let mut merged = Vec::new();
        let mut inner = Vec::new();
        let mut position = None;
        for clause in clauses {
            match clause {
                Query::Nested {
                    path: clause_path,
                    query,
                } if clause_path == path => {
                    position.get_or_insert(merged.len());
                    inner.push(*query);
                }
                clause if clause.nested_path().is_some_and(|p| is_below(p, &path)) => {
                    position.get_or_insert(merged.len());
                    inner.push(clause);
                }
                clause => merged.push(clause),
            }
        }
        debug!(path = %path, members = inner.len(), "merging nested clauses");

        let mut inner = group_siblings(inner, op);
        let query = if inner.len() == 1 {
            inner.remove(0)
        } else {
            match op {
                LogicalOp::Or => Query::should(inner),
                _ => Query::must(inner),
            }
        };
        merged.insert(position.unwrap_or(merged.len()), Query::nested(path, query));
        clauses = merged;
    }
    clauses
}

fn is_below(path: &str, ancestor: &str) -> bool {
    path.len() > ancestor.len() + 1
        && path.starts_with(ancestor)
        && path.as_bytes()[ancestor.len()] == b'.'
}

fn depth(path: &str) -> usize {
    path.matches('.').count()
}

/// Deepest nested path with two or more member clauses, first seen wins
/// among equally deep ones.
fn deepest_shared_path(clauses: &[Query]) -> Option<String> {
    let paths: Vec<&str> = clauses.iter().filter_map(Query::nested_path).collect();
    let mut best: Option<&str> = None;
    for &path in &paths {
        let members = paths
            .iter()
            .filter(|other| **other == path || is_below(other, path))
            .count();
        if members < 2 {
            continue;
        }
        if best.map_or(true, |b| depth(path) > depth(b)) {
            best = Some(path);
        }
    }
    best.map(str::to_string)
}
