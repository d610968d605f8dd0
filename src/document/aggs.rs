//! Bucket aggregations for totals directives.
//!
//! Grouping dimensions become nested bucket levels, outermost first, and
//! the innermost level holds the metrics. Moving between nesting contexts
//! adds `nested` or `reverse_nested` levels:
//!
//! ```json
//! {"nested": {"nested": {"path": "other_models"}, "aggs": {
//!   "other_models__name": {
//!     "terms": {"field": "other_models.name.raw", "size": 10000,
//!               "order": {"reverse_nested>sum": "desc"}},
//!     "aggs": {"reverse_nested": {"reverse_nested": {}, "aggs": {
//!       "sum": {"sum": {"field": "id"}}}}}}}}}
//! ```

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, instrument};

use super::dsl::{Aggregation, Aggs, Query};
use super::DocumentBackend;
use crate::config::Settings;
use crate::error::{CompileError, CompileResult};
use crate::filter::{
    Condition, FilterBuilder, GroupDim, LogicalOp, Mode, Resolver, Target, TotalsSpec,
};
use crate::schema::{EntitySchema, SchemaRegistry};

pub const NESTED: &str = "nested";
pub const REVERSE_NESTED: &str = "reverse_nested";
pub const FILTERED: &str = "filtered";

/// Nesting context: `None` is the root document.
type Context = Option<String>;

/// Build the aggregations of a totals directive.
///
/// `count` needs no aggregation: bucket and hit counts serve it. An empty
/// result means nothing beyond the hit count was requested.
#[instrument(name = "document::aggs", level = "trace", skip_all)]
pub fn build_aggregations(
    registry: &SchemaRegistry,
    settings: &Settings,
    root: Arc<EntitySchema>,
    spec: &TotalsSpec,
) -> CompileResult<Aggs> {
    let resolver = Resolver::new(registry, Arc::clone(&root), &settings.filter.text_query_key);
    let mut builder = FilterBuilder::new(resolver, settings, DocumentBackend::new());
    let size = spec
        .group_limit
        .unwrap_or_else(|| u64::from(settings.document.bucket_size));

    let mut levels: Vec<(String, Aggregation)> = Vec::new();
    let mut current: Context = None;
    for dim in &spec.group_by {
        let (name, context, level) = match dim {
            GroupDim::Path(path) => match builder.build_target(path, &Value::Null, Mode::Aggregate)? {
                Some((_, Target::Field(field))) => (
                    path.clone(),
                    field.nested,
                    Aggregation::Terms {
                        field: field.path,
                        size,
                        order: Vec::new(),
                        aggs: Aggs::new(),
                    },
                ),
                Some((resolved, Target::Expression(_))) => {
                    return Err(CompileError::invalid_attribute(
                        &resolved.path,
                        "only plain columns can be used to group documents",
                    ));
                }
                None => continue,
            },
            GroupDim::Filter(conditions) => {
                let condition = Condition::parse(conditions, LogicalOp::And)?;
                let Some(query) = builder.build(&condition)? else {
                    continue;
                };
                let (context, filter) = match query {
                    Query::Nested { path, query } => (Some(path), *query),
                    other => (None, other),
                };
                (
                    FILTERED.to_string(),
                    context,
                    Aggregation::Filter {
                        filter,
                        aggs: Aggs::new(),
                    },
                )
            }
        };
        levels.extend(transitions(current.as_deref(), context.as_deref()));
        levels.push((name, level));
        current = context;
    }

    let mut groups: IndexMap<Context, Aggs> = IndexMap::new();
    for metric in spec.metrics.iter().filter(|m| !m.is_count()) {
        let (field, context) = match &metric.path {
            None => (primary_key(&root, &metric.name)?, None),
            Some(path) => match builder.build_target(path, &Value::Null, Mode::Aggregate)? {
                Some((_, Target::Field(field))) => (field.path, field.nested),
                Some((resolved, Target::Expression(_))) => {
                    return Err(CompileError::invalid_attribute(
                        &resolved.path,
                        "only plain columns can be aggregated in documents",
                    ));
                }
                None => continue,
            },
        };
        groups.entry(context).or_default().insert(
            metric.name.clone(),
            Aggregation::Metric {
                function: metric.function.clone(),
                field,
            },
        );
    }

    let mut aggs = Aggs::new();
    for (context, metrics) in groups {
        if context == current {
            aggs.extend(metrics);
            continue;
        }
        let wrappers = transitions(current.as_deref(), context.as_deref());
        if let Some((name, wrapped)) = nest(wrappers, metrics).into_iter().next() {
            let name = unique_name(&aggs, &name);
            aggs.insert(name, wrapped);
        }
    }
    debug!(
        levels = levels.len(),
        metrics = spec.metrics.len(),
        "built totals aggregations"
    );
    Ok(nest(levels, aggs))
}

/// Wrap `inner` in `levels`, outermost first. Terms levels order their
/// buckets by the metrics directly below them.
fn nest(levels: Vec<(String, Aggregation)>, inner: Aggs) -> Aggs {
    let mut aggs = inner;
    for (name, level) in levels.into_iter().rev() {
        let level = match level {
            Aggregation::Terms { field, size, .. } => Aggregation::Terms {
                field,
                size,
                order: metric_paths(&aggs),
                aggs,
            },
            Aggregation::Nested { path, .. } => Aggregation::Nested { path, aggs },
            Aggregation::ReverseNested { .. } => Aggregation::ReverseNested { aggs },
            Aggregation::Filter { filter, .. } => Aggregation::Filter { filter, aggs },
            metric @ Aggregation::Metric { .. } => metric,
        };
        aggs = Aggs::new();
        aggs.insert(name, level);
    }
    aggs
}

/// Paths of the metrics reachable through single-bucket aggregations.
fn metric_paths(aggs: &Aggs) -> Vec<String> {
    let mut paths = Vec::new();
    for (name, agg) in aggs {
        match agg {
            Aggregation::Metric { .. } => paths.push(name.clone()),
            _ if agg.is_single_bucket() => {
                if let Some(children) = agg.aggs() {
                    paths.extend(
                        metric_paths(children)
                            .into_iter()
                            .map(|path| format!("{}>{}", name, path)),
                    );
                }
            }
            _ => {}
        }
    }
    paths
}

/// Levels that move from one nesting context to another.
fn transitions(from: Option<&str>, to: Option<&str>) -> Vec<(String, Aggregation)> {
    let reverse = || {
        (
            REVERSE_NESTED.to_string(),
            Aggregation::ReverseNested { aggs: Aggs::new() },
        )
    };
    let nested = |path: &str| {
        (
            NESTED.to_string(),
            Aggregation::Nested {
                path: path.to_string(),
                aggs: Aggs::new(),
            },
        )
    };
    match (from, to) {
        (from, to) if from == to => Vec::new(),
        (_, None) => vec![reverse()],
        (None, Some(path)) => vec![nested(path)],
        (Some(from), Some(path)) if is_below(path, from) => vec![nested(path)],
        (Some(_), Some(path)) => vec![reverse(), nested(path)],
    }
}

fn is_below(path: &str, ancestor: &str) -> bool {
    path.len() > ancestor.len() + 1
        && path.starts_with(ancestor)
        && path.as_bytes()[ancestor.len()] == b'.'
}

fn unique_name(aggs: &Aggs, base: &str) -> String {
    if !aggs.contains_key(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{}_{}", base, n))
        .find(|name| !aggs.contains_key(name))
        .unwrap_or_else(|| base.to_string())
}

fn primary_key(root: &EntitySchema, name: &str) -> CompileResult<String> {
    match root.primary_key.as_slice() {
        [column] => Ok(column.clone()),
        _ => Err(CompileError::invalid_specification(
            name,
            "composite primary keys cannot be aggregated in documents",
        )),
    }
}
