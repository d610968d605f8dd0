//! PostgreSQL SQL dialect.
//!
//! PostgreSQL features used by compiled filters:
//! - ANSI identifier quoting (`"`)
//! - Native boolean type (true/false)
//! - ILIKE
//! - jsonb/array container operators (`@>`, `&&`, `?`, `?&`, `?|`)
//! - Full-text search via `to_tsvector(..) @@ plainto_tsquery(..)`

use super::helpers;
use super::SqlDialect;

/// PostgreSQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }

    fn supports_ilike(&self) -> bool {
        true
    }

    fn supports_container_operators(&self) -> bool {
        true
    }

    fn supports_full_text_search(&self) -> bool {
        true
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        helpers::remap_function_postgres(name)
    }
}
