//! SQL Dialect definitions and formatting rules.
//!
//! Each dialect implements `SqlDialect` to handle the syntax differences
//! that matter to compiled filters:
//!
//! - Identifier quoting: `"` (PG/DuckDB), `` ` `` (MySQL), `[]` (T-SQL)
//! - Boolean literals: true/false vs 1/0
//! - Case-insensitive matching: native ILIKE vs LOWER() emulation
//! - Container operators (`@>`, `&&`, `?`, `?&`, `?|`) and full-text `@@`
//! - Date part extraction: EXTRACT vs DATEPART
//!
//! | Feature | PostgreSQL | DuckDB | MySQL | SQL Server |
//! |---------|-----------|--------|-------|------------|
//! | ILIKE | ✓ | ✓ | ❌ | ❌ |
//! | jsonb/array operators | ✓ | ❌ | ❌ | ❌ |
//! | tsvector `@@` | ✓ | ❌ | ❌ | ❌ |
//! | ROW() constructor in aggregates | ✓ | ✓ | ❌ | ❌ |
//!
//! Operators a dialect cannot express are rejected when the filter is compiled,
//! never at render time.

pub mod helpers;
mod duckdb;
mod mysql;
mod postgres;
mod tsql;

pub use duckdb::DuckDb;
pub use mysql::MySql;
pub use postgres::Postgres;
pub use tsql::TSql;

use serde::{Deserialize, Serialize};

use super::expr::DatePart;
use super::token::{Token, TokenStream};

/// SQL dialect trait - defines how SQL constructs are rendered.
///
/// The default implementations follow ANSI SQL where possible.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    // =========================================================================
    // Identifier and Literal Quoting
    // =========================================================================

    /// Quote an identifier (table, column, alias).
    fn quote_identifier(&self, ident: &str) -> String;

    /// Quote a string literal.
    ///
    /// All dialects use single quotes with `''` for escaping.
    fn quote_string(&self, s: &str) -> String {
        helpers::quote_string_single(s)
    }

    /// Format a boolean literal.
    fn format_bool(&self, b: bool) -> &'static str;

    // =========================================================================
    // Operators
    // =========================================================================

    /// Whether `ILIKE` exists. Otherwise both sides are wrapped in `LOWER()`.
    fn supports_ilike(&self) -> bool {
        false
    }

    /// Whether container operators (`@>`, `&&`, `?`, `?&`, `?|`) exist.
    fn supports_container_operators(&self) -> bool {
        false
    }

    /// Whether `tsvector @@ tsquery` full-text matching exists.
    fn supports_full_text_search(&self) -> bool {
        false
    }

    /// Whether `ROW(a, b)` may be used as an aggregate argument.
    fn supports_row_constructor(&self) -> bool {
        true
    }

    // =========================================================================
    // Date/Time
    // =========================================================================

    /// Emit a date part extraction: `EXTRACT(YEAR FROM expr)` by default.
    fn emit_extract(&self, part: DatePart, expr: TokenStream) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Extract)
            .lparen()
            .push(Token::Keyword(part.keyword()))
            .space()
            .push(Token::From)
            .space()
            .append(&expr)
            .rparen();
        ts
    }

    // =========================================================================
    // Function Remapping
    // =========================================================================

    /// Remap a function name for this dialect.
    ///
    /// Returns `Some(new_name)` if the function should be remapped, `None` to keep original.
    /// The input is matched case-insensitively.
    fn remap_function(&self, name: &str) -> Option<&'static str> {
        let _ = name;
        None
    }
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Postgres,
    DuckDb,
    MySql,
    TSql,
}

impl Dialect {
    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::Postgres => &Postgres,
            Dialect::DuckDb => &DuckDb,
            Dialect::MySql => &MySql,
            Dialect::TSql => &TSql,
        }
    }
}

impl std::str::FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "duckdb" => Ok(Dialect::DuckDb),
            "mysql" => Ok(Dialect::MySql),
            "tsql" | "mssql" => Ok(Dialect::TSql),
            other => Err(format!("unknown SQL dialect: {}", other)),
        }
    }
}

// Implement SqlDialect for Dialect enum by delegating to concrete types
impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        self.dialect().quote_string(s)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        self.dialect().format_bool(b)
    }

    fn supports_ilike(&self) -> bool {
        self.dialect().supports_ilike()
    }

    fn supports_container_operators(&self) -> bool {
        self.dialect().supports_container_operators()
    }

    fn supports_full_text_search(&self) -> bool {
        self.dialect().supports_full_text_search()
    }

    fn supports_row_constructor(&self) -> bool {
        self.dialect().supports_row_constructor()
    }

    fn emit_extract(&self, part: DatePart, expr: TokenStream) -> TokenStream {
        self.dialect().emit_extract(part, expr)
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        self.dialect().remap_function(name)
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dialect().name())
    }
}
