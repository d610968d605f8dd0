//! # Sift
//!
//! Compiles flat, URL-friendly request parameters into queries for a
//! relational database or a document-search engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  {"other_models__name__startswith": "foo", "or": {...}}  │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [params]
//! ┌─────────────────────────────────────────────────────────┐
//! │        conditions, order criteria, totals directives     │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [filter: path resolution, condition tree]
//! ┌─────────────────────────────────────────────────────────┐
//! │          FilterBuilder driving a Backend                 │
//! └─────────────────────────────────────────────────────────┘
//!               │                              │
//!               ▼ [relational]                 ▼ [document]
//! ┌───────────────────────────┐  ┌───────────────────────────┐
//! │ SQL AST, joins, totals    │  │ query DSL, nested, aggs   │
//! └───────────────────────────┘  └───────────────────────────┘
//! ```

pub mod compile;
pub mod config;
pub mod document;
pub mod error;
pub mod filter;
pub mod params;
pub mod relational;
pub mod schema;
pub mod sql;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::compile::{CompileOptions, Compiler, DocumentOutput, RelationalOutput};
    pub use crate::config::Settings;
    pub use crate::document::{flatten_response, Query as DocumentQuery, SearchBody, Sort};
    pub use crate::error::{CompileError, CompileResult};
    pub use crate::filter::{Condition, FilterBuilder, LogicalOp, OrderCriterion, TotalsSpec};
    pub use crate::params::RequestParams;
    pub use crate::relational::{flatten_rows, TotalsQuery};
    pub use crate::schema::{
        Cardinality, EntitySchema, Field, FieldType, JoinKey, Relationship, SchemaRegistry,
    };
    pub use crate::sql::{Dialect, Expr, Query, SqlDialect};
}

// Also export at crate root for convenience
pub use compile::{CompileOptions, Compiler};
pub use error::{CompileError, CompileResult};
pub use sql::Dialect;
