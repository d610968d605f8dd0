//! Registry of entity schemas shared by every compilation.

use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use super::file::SchemaFile;
use super::{EntitySchema, JoinKey, SchemaError};
use crate::error::{CompileError, CompileResult};

/// Read-only set of entity schemas, keyed by entity name.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    entities: IndexMap<String, Arc<EntitySchema>>,
}

impl SchemaRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Load and validate a TOML schema file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SchemaError> {
        RegistryBuilder::from_file(path)?.build()
    }

    pub fn from_toml_str(content: &str) -> Result<Self, SchemaError> {
        RegistryBuilder::from_toml_str(content)?.build()
    }

    pub fn get(&self, name: &str) -> CompileResult<&Arc<EntitySchema>> {
        self.entities
            .get(name)
            .ok_or_else(|| CompileError::UnknownEntity(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Collects entity schemas and checks cross-entity references on `build`.
#[derive(Default)]
#[must_use]
pub struct RegistryBuilder {
    entities: Vec<EntitySchema>,
}

impl RegistryBuilder {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SchemaError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, SchemaError> {
        let file: SchemaFile = toml::from_str(content)?;
        let mut builder = Self::default();
        for def in file.entities {
            builder = builder.entity(def.into_schema()?);
        }
        Ok(builder)
    }

    pub fn entity(mut self, schema: EntitySchema) -> Self {
        self.entities.push(schema);
        self
    }

    /// Attach a cleaner to an entity that was loaded from a file.
    pub fn cleaner<F>(mut self, entity: &str, field: impl Into<String>, cleaner: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        if let Some(schema) = self.entities.iter_mut().find(|e| e.name == entity) {
            schema.cleaners.insert(field.into(), Arc::new(cleaner));
        }
        self
    }

    pub fn build(self) -> Result<SchemaRegistry, SchemaError> {
        let mut entities: IndexMap<String, Arc<EntitySchema>> = IndexMap::new();
        for schema in self.entities {
            if entities.contains_key(&schema.name) {
                return Err(SchemaError::DuplicateEntity(schema.name));
            }
            entities.insert(schema.name.clone(), Arc::new(schema));
        }

        for schema in entities.values() {
            for column in schema.cleaners.keys() {
                if schema.field(column).is_none() {
                    return Err(SchemaError::UnknownColumn {
                        entity: schema.name.clone(),
                        owner: schema.name.clone(),
                        column: column.clone(),
                    });
                }
            }
            for rel in schema.relationships.values() {
                let target = entities.get(&rel.target).ok_or_else(|| SchemaError::UnknownTarget {
                    entity: schema.name.clone(),
                    relationship: rel.name.clone(),
                    target: rel.target.clone(),
                })?;
                let remote = match &rel.join {
                    JoinKey::Direct { remote, .. } | JoinKey::Secondary { remote, .. } => remote,
                };
                if target.field(remote).is_none() {
                    return Err(SchemaError::UnknownColumn {
                        entity: schema.name.clone(),
                        owner: target.name.clone(),
                        column: remote.clone(),
                    });
                }
            }
        }

        Ok(SchemaRegistry { entities })
    }
}
