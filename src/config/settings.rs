//! TOML-based configuration for sift.
//!
//! Example configuration:
//! ```toml
//! [filter]
//! ignore_unknown = false
//! text_query_key = "q"
//!
//! [functions]
//! allow = ["lower", "jsonb_object_field_text"]
//!
//! [relational]
//! dialect = "postgres"
//! text_search_language = "english"
//!
//! [document]
//! bucket_size = 10000
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::sql::Dialect;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub filter: FilterSettings,
    pub functions: FunctionSettings,
    pub relational: RelationalSettings,
    pub document: DocumentSettings,
}

/// Filter parsing settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FilterSettings {
    /// Skip filters naming unknown columns instead of failing.
    pub ignore_unknown: bool,

    /// Token that turns a parameter into a free-text query.
    pub text_query_key: String,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            ignore_unknown: false,
            text_query_key: "q".to_string(),
        }
    }
}

/// Policy for `func`/`sfunc`/`efunc` filters.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct FunctionSettings {
    /// When set, only these function names (case-insensitive) may be called.
    pub allow: Option<Vec<String>>,
}

impl FunctionSettings {
    pub fn is_allowed(&self, name: &str) -> bool {
        match &self.allow {
            Some(list) => list.iter().any(|f| f.eq_ignore_ascii_case(name)),
            None => true,
        }
    }
}

/// Relational backend settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelationalSettings {
    /// Default SQL dialect.
    pub dialect: Dialect,

    /// Text search configuration passed to `plainto_tsquery`.
    pub text_search_language: String,
}

impl Default for RelationalSettings {
    fn default() -> Self {
        Self {
            dialect: Dialect::Postgres,
            text_search_language: "english".to_string(),
        }
    }
}

/// Document backend settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DocumentSettings {
    /// Terms aggregation size when no `group_limit` is given.
    pub bucket_size: u32,
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self { bucket_size: 10000 }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `SIFT_CONFIG`
    /// 2. `./sift.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("SIFT_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("sift.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        Ok(Settings::default())
    }

    fn validate(&self) -> Result<(), SettingsError> {
        let key = &self.filter.text_query_key;
        if key.is_empty() || key.contains("__") {
            return Err(SettingsError::InvalidConfig(format!(
                "filter.text_query_key must be a single token, got {:?}",
                key
            )));
        }
        if self.document.bucket_size == 0 {
            return Err(SettingsError::InvalidConfig(
                "document.bucket_size must be positive".to_string(),
            ));
        }
        if let Some(allow) = &self.functions.allow {
            if let Some(bad) = allow.iter().find(|f| !crate::filter::ops::is_identifier(f)) {
                return Err(SettingsError::InvalidConfig(format!(
                    "functions.allow entry {:?} is not an identifier",
                    bad
                )));
            }
        }
        Ok(())
    }
}
