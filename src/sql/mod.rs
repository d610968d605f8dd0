//! SQL generation module.
//!
//! A small type-safe SQL builder that renders the relational output of the
//! filter compiler for several dialects:
//!
//! - [`query`] - SELECT query builder
//! - [`expr`] - Expression AST and builder DSL
//! - [`token`] - Token types for SQL generation
//! - [`dialect`] - SQL dialect implementations

pub mod dialect;
pub mod expr;
pub mod query;
pub mod token;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types at the sql module level
pub use dialect::{Dialect, SqlDialect};
pub use expr::{
    col, extract, func, lit_bool, lit_float, lit_int, lit_null, lit_str, row,
    row_number, star, table_col, BinaryOperator, DatePart, Expr, ExprExt, Literal, SortDir,
    UnaryOperator, WindowExt, WindowOrderBy,
};
pub use query::{Join, JoinType, OrderByExpr, Query, SelectExpr, TableRef, TableSource};
pub use token::{Token, TokenStream};
