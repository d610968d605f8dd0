//! End-to-end compilation of request parameters.
//!
//! ```text
//! params → RequestParams → Condition tree → FilterBuilder<Backend> → query + totals
//! ```
//!
//! # Example
//!
//! ```ignore
//! use sift::compile::{CompileOptions, Compiler};
//! use sift::config::Settings;
//! use sift::schema::SchemaRegistry;
//! use sift::sql::Dialect;
//!
//! let registry = SchemaRegistry::from_file("models.toml")?;
//! let compiler = Compiler::new(registry, Settings::default());
//! let params = serde_json::json!({
//!     "other_models__name__startswith": "foo",
//!     "order": "-name",
//!     "totals": [{"group_by": "name"}, {"count": null}],
//! });
//!
//! let options = CompileOptions::default().with_dialect(Dialect::Postgres);
//! let output = compiler.compile_relational("Model", params.as_object().unwrap(), &options)?;
//! println!("{}", output.sql());
//! ```

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::config::Settings;
use crate::document::{self, DocumentBackend, SearchBody};
use crate::filter::{Condition, FilterBuilder, LogicalOp, OrderCriterion, Resolver, TotalsSpec};
use crate::params::RequestParams;
use crate::relational::{RelationalBackend, TotalsQuery};
use crate::schema::{EntitySchema, SchemaRegistry};
use crate::sql::{Dialect, Query};

pub use crate::error::{CompileError, CompileResult};

// ============================================================================
// Options
// ============================================================================

/// Options for compilation.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// SQL dialect to generate. Defaults to the configured dialect.
    pub dialect: Option<Dialect>,
}

impl CompileOptions {
    /// Set the SQL dialect.
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// Result of compiling a request for the relational backend.
#[derive(Debug, Clone)]
pub struct RelationalOutput {
    /// The row query.
    pub query: Query,

    /// The aggregate query, when totals were requested.
    pub totals: Option<TotalsQuery>,

    /// The dialect the request was checked against.
    pub dialect: Dialect,
}

impl RelationalOutput {
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.query.to_sql(dialect)
    }

    /// The row query in the dialect it was compiled for.
    pub fn sql(&self) -> String {
        self.to_sql(self.dialect)
    }

    pub fn totals_sql(&self) -> Option<String> {
        self.totals.as_ref().map(|totals| totals.to_sql(self.dialect))
    }
}

/// Result of compiling a request for the document backend.
#[derive(Debug, Clone)]
pub struct DocumentOutput {
    /// Query, sort and aggregations.
    pub body: SearchBody,

    /// The totals directive the aggregations were built from.
    pub totals: Option<TotalsSpec>,
}

impl DocumentOutput {
    pub fn to_value(&self) -> Value {
        self.body.to_value()
    }

    /// Read the totals out of a search response.
    pub fn flatten(&self, response: &Value) -> Map<String, Value> {
        if self.totals.is_none() {
            return Map::new();
        }
        document::flatten_response(response)
    }
}

// ============================================================================
// Compiler
// ============================================================================

/// Compiles request parameters against a fixed set of entity schemas.
#[derive(Debug, Clone)]
pub struct Compiler {
    registry: SchemaRegistry,
    settings: Settings,
}

impl Compiler {
    pub fn new(registry: SchemaRegistry, settings: Settings) -> Self {
        Self { registry, settings }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn resolver(&self, root: &Arc<EntitySchema>) -> Resolver<'_> {
        Resolver::new(
            &self.registry,
            Arc::clone(root),
            &self.settings.filter.text_query_key,
        )
    }

    /// Compile a request into a SQL query, plus an aggregate query when
    /// totals are requested.
    ///
    /// Without an explicit order, rows are ordered by primary key.
    #[instrument(name = "compile::relational", level = "trace", skip(self, params, options))]
    pub fn compile_relational(
        &self,
        entity: &str,
        params: &Map<String, Value>,
        options: &CompileOptions,
    ) -> CompileResult<RelationalOutput> {
        let root = Arc::clone(self.registry.get(entity)?);
        let request = RequestParams::from_map(params, &self.settings)?;
        let dialect = options.dialect.unwrap_or(self.settings.relational.dialect);

        let backend = RelationalBackend::new(Arc::clone(&root), &self.settings, dialect);
        let mut builder = FilterBuilder::new(self.resolver(&root), &self.settings, backend);
        let condition = Condition::parse(&request.conditions, LogicalOp::And)?;
        let filter = builder.build(&condition)?;

        let criteria = if request.order.is_empty() {
            OrderCriterion::primary_key(&root)
        } else {
            request.order.clone()
        };
        let order = builder.build_order(&criteria)?;
        let backend = builder.into_backend();

        let totals = match request.totals_spec(&self.settings)? {
            Some(spec) if !spec.is_empty() => Some(TotalsQuery::build(
                &self.registry,
                &self.settings,
                &backend,
                filter.as_ref(),
                &spec,
            )?),
            _ => None,
        };
        debug!(
            joins = backend.joins().len(),
            filtered = filter.is_some(),
            totals = totals.is_some(),
            "compiled relational query"
        );

        Ok(RelationalOutput {
            query: backend.into_query(filter, order),
            totals,
            dialect,
        })
    }

    /// Compile a request into a search body.
    ///
    /// Results keep relevance order unless an order is given. An order
    /// without `_score` turns the query into a non-scoring filter.
    #[instrument(name = "compile::document", level = "trace", skip(self, params))]
    pub fn compile_document(
        &self,
        entity: &str,
        params: &Map<String, Value>,
    ) -> CompileResult<DocumentOutput> {
        let root = Arc::clone(self.registry.get(entity)?);
        let request = RequestParams::from_map(params, &self.settings)?;

        let mut builder =
            FilterBuilder::new(self.resolver(&root), &self.settings, DocumentBackend::new());
        let condition = Condition::parse(&request.conditions, LogicalOp::And)?;
        let query = builder.build(&condition)?;
        let sort = builder.build_order(&request.order)?;

        let scored = request
            .order
            .iter()
            .any(|criterion| criterion.path == document::SCORE);
        let query = match query {
            Some(query) if !request.order.is_empty() && !scored => Some(query.constant_score()),
            other => other,
        };

        let totals = request
            .totals_spec(&self.settings)?
            .filter(|spec| !spec.is_empty());
        let aggs = match &totals {
            Some(spec) => {
                document::build_aggregations(&self.registry, &self.settings, Arc::clone(&root), spec)?
            }
            None => document::Aggs::new(),
        };
        debug!(
            sorted = sort.len(),
            aggregations = aggs.len(),
            "compiled document query"
        );

        Ok(DocumentOutput {
            body: SearchBody { query, sort, aggs },
            totals,
        })
    }
}
