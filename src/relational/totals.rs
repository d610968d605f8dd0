//! Grouped aggregate queries for totals directives.
//!
//! ```sql
//! SELECT totals_other_models_1.name AS other_models__name, count(some_table.id) AS count
//! FROM some_table <filter joins> <totals joins>
//! WHERE <filter>
//! GROUP BY totals_other_models_1.name
//! ORDER BY 1, 2 DESC
//! ```
//!
//! With a `group_limit` a `row_number()` window partitioned by all but the
//! last dimension is added and the query is wrapped in
//! `SELECT anon_1.* FROM (...) AS anon_1 WHERE anon_1.row_number <= N`.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, instrument};

use super::{joins, rows, RelationalBackend};
use crate::config::Settings;
use crate::error::{CompileError, CompileResult};
use crate::filter::{
    Condition, FilterBuilder, GroupDim, JoinRegistry, LogicalOp, Mode, Resolver, Target,
    TotalsSpec,
};
use crate::schema::{EntitySchema, SchemaRegistry};
use crate::sql::{
    func, lit_int, row, row_number, table_col, Dialect, Expr, ExprExt, OrderByExpr, Query,
    SelectExpr, SqlDialect, TableRef, WindowExt, WindowOrderBy,
};

/// Alias prefix of joins made for totals columns.
pub const ALIAS_PREFIX: &str = "totals_";
const SUBQUERY_ALIAS: &str = "anon_1";
const ROW_NUMBER: &str = "row_number";

/// A compiled totals query and the labels needed to read its rows.
#[derive(Debug, Clone, PartialEq)]
pub struct TotalsQuery {
    pub query: Query,
    /// Labels of the grouping columns, in select order.
    pub dimensions: Vec<String>,
    /// Labels of the metric columns, in select order.
    pub metrics: Vec<String>,
}

impl TotalsQuery {
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.query.to_sql(dialect)
    }

    /// Fold result rows into `total_<metric>` entries.
    pub fn flatten(&self, rows: &[Map<String, Value>]) -> Map<String, Value> {
        rows::flatten_rows(rows, self)
    }

    /// Build the totals query of a request.
    ///
    /// The row query's joins and filter are reused, so totals cover exactly
    /// the filtered rows. Columns named by the totals get their own
    /// `totals_`-prefixed joins.
    #[instrument(name = "relational::totals", level = "trace", skip_all)]
    pub fn build(
        registry: &SchemaRegistry,
        settings: &Settings,
        row_backend: &RelationalBackend<'_>,
        filter: Option<&Expr>,
        spec: &TotalsSpec,
    ) -> CompileResult<TotalsQuery> {
        let root = Arc::clone(row_backend.root());
        let dialect = row_backend.dialect();
        let resolver = Resolver::new(
            registry,
            Arc::clone(&root),
            &settings.filter.text_query_key,
        );
        let backend = RelationalBackend::with_joins(
            Arc::clone(&root),
            settings,
            dialect,
            JoinRegistry::with_prefix(ALIAS_PREFIX),
        );
        let mut builder = FilterBuilder::new(resolver, settings, backend);

        let mut dimensions = Vec::new();
        let mut group_exprs = Vec::new();
        let mut filters = 0;
        for dim in &spec.group_by {
            let built = match dim {
                GroupDim::Path(path) => builder
                    .build_target(path, &Value::Null, Mode::Aggregate)?
                    .map(|(_, target)| (path.clone(), target_expr(target))),
                GroupDim::Filter(conditions) => {
                    let condition = Condition::parse(conditions, LogicalOp::And)?;
                    builder.build(&condition)?.map(|expr| {
                        filters += 1;
                        (format!("filter_{}", filters), expr)
                    })
                }
            };
            if let Some((label, expr)) = built {
                dimensions.push(label);
                group_exprs.push(expr);
            }
        }

        let mut metrics = Vec::new();
        let mut metric_exprs = Vec::new();
        for metric in &spec.metrics {
            let argument = match &metric.path {
                None => primary_key(&root, dialect, &metric.name)?,
                Some(path) => match builder.build_target(path, &Value::Null, Mode::Aggregate)? {
                    Some((_, target)) => target_expr(target),
                    None => continue,
                },
            };
            metrics.push(metric.name.clone());
            metric_exprs.push(func(&metric.function, vec![argument]));
        }

        let totals_joins = builder.into_backend().joins().materialize();
        debug!(
            dimensions = dimensions.len(),
            metrics = metrics.len(),
            joins = totals_joins.len(),
            "built totals columns"
        );

        let mut select: Vec<SelectExpr> = group_exprs
            .iter()
            .zip(&dimensions)
            .map(|(expr, label)| expr.clone().alias(label))
            .chain(
                metric_exprs
                    .iter()
                    .zip(&metrics)
                    .map(|(expr, label)| expr.clone().alias(label)),
            )
            .collect();
        if let Some(limit) = spec.group_limit {
            let partition = group_exprs[..group_exprs.len().saturating_sub(1)].to_vec();
            let order = metric_exprs.iter().cloned().map(WindowOrderBy::desc).collect();
            let window = row_number()
                .over()
                .partition_by(partition)
                .order_by(order)
                .build();
            select.push(window.alias(ROW_NUMBER));
            debug!(limit, "limiting rows per group");
        }

        let mut query = Query::new().select(select).from(row_backend.root_table());
        query = joins::apply(query, &root, &row_backend.joins().materialize());
        query = joins::apply(query, &root, &totals_joins);
        if let Some(filter) = filter {
            query = query.filter(filter.clone());
        }
        if !group_exprs.is_empty() {
            query = query.group_by(group_exprs);
        }

        let ordinals = ordinal_order(dimensions.len(), metrics.len());
        let query = match spec.group_limit {
            Some(limit) => {
                let limit = i64::try_from(limit).unwrap_or(i64::MAX);
                Query::new()
                    .select(vec![Expr::Star {
                        table: Some(SUBQUERY_ALIAS.to_string()),
                    }])
                    .from(TableRef::subquery(query, SUBQUERY_ALIAS))
                    .filter(table_col(SUBQUERY_ALIAS, ROW_NUMBER).lte(lit_int(limit)))
                    .order_by(ordinals)
            }
            None => query.order_by(ordinals),
        };

        Ok(TotalsQuery {
            query,
            dimensions,
            metrics,
        })
    }
}

fn target_expr(target: Target<Expr, Expr>) -> Expr {
    match target {
        Target::Field(expr) | Target::Expression(expr) => expr,
    }
}

/// Argument of a metric without a column: the primary key, or a row of
/// all its columns.
fn primary_key(root: &EntitySchema, dialect: Dialect, name: &str) -> CompileResult<Expr> {
    let mut columns: Vec<Expr> = root
        .primary_key
        .iter()
        .map(|column| table_col(&root.table, column))
        .collect();
    if columns.len() == 1 {
        return Ok(columns.remove(0));
    }
    if !dialect.supports_row_constructor() {
        return Err(CompileError::invalid_specification(
            name,
            format!("composite primary keys cannot be aggregated in {:?}", dialect),
        ));
    }
    Ok(row(columns))
}

/// `ORDER BY 1, 2, ... , n DESC, ...`: dimensions ascending, metrics
/// descending.
fn ordinal_order(dimensions: usize, metrics: usize) -> Vec<OrderByExpr> {
    (1..=dimensions)
        .map(|i| OrderByExpr::new(lit_int(i as i64)))
        .chain((dimensions + 1..=dimensions + metrics).map(|i| OrderByExpr::desc(lit_int(i as i64))))
        .collect()
}
