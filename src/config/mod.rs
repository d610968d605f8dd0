//! Configuration module for sift.
//!
//! Compiler behaviour that is not part of a request: unknown-filter policy,
//! function allow-list, SQL dialect and document aggregation sizing.

mod settings;

pub use settings::{
    DocumentSettings, FilterSettings, FunctionSettings, RelationalSettings, Settings,
    SettingsError,
};
