//! Entity schemas: the static description of fields and relationships that
//! parameter paths are resolved against.
//!
//! Schemas are built once (through [`EntitySchemaBuilder`] or a TOML file,
//! see [`file`]) and shared read-only through a [`SchemaRegistry`].

mod coerce;
pub mod file;
mod registry;

pub use coerce::parse_flag;
pub use registry::{RegistryBuilder, SchemaRegistry};

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CompileError, CompileResult};

/// Errors raised while building or loading schemas.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Duplicate entity: {0}")]
    DuplicateEntity(String),

    #[error("Entity {entity}: duplicate name {name}")]
    DuplicateName { entity: String, name: String },

    #[error("Entity {entity}: relationship {relationship} targets unknown entity {target}")]
    UnknownTarget {
        entity: String,
        relationship: String,
        target: String,
    },

    #[error("Entity {entity}: {column} is not a field of {owner}")]
    UnknownColumn {
        entity: String,
        owner: String,
        column: String,
    },

    #[error("Entity {0}: primary key must name at least one field")]
    EmptyPrimaryKey(String),

    #[error("Entity {entity}: {name} is not a valid name")]
    InvalidName { entity: String, name: String },

    #[error("Failed to read schema file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse schema file: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Semantic type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Int,
    Float,
    Bool,
    DateTime,
    Time,
    Array,
    Json,
}

impl FieldType {
    /// Containers support `@>`, `&&`, `?`, `?&` and `?|`.
    pub fn is_container(&self) -> bool {
        matches!(self, FieldType::Array | FieldType::Json)
    }
}

/// A column of an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
    /// Holds several values in the document store.
    pub multi: bool,
    /// Has a not-analyzed `.raw` keyword sub-field in the document store.
    pub raw: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            multi: false,
            raw: false,
        }
    }

    pub fn multi(mut self) -> Self {
        self.multi = true;
        self
    }

    pub fn raw(mut self) -> Self {
        self.raw = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    One,
    Many,
}

/// How a relationship is joined in SQL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKey {
    /// `parent.local = child.remote`
    Direct { local: String, remote: String },
    /// `parent.local = link.local_ref AND link.remote_ref = child.remote`
    Secondary {
        table: String,
        local: String,
        local_ref: String,
        remote_ref: String,
        remote: String,
    },
}

impl JoinKey {
    pub fn direct(local: impl Into<String>, remote: impl Into<String>) -> Self {
        JoinKey::Direct {
            local: local.into(),
            remote: remote.into(),
        }
    }

    pub fn secondary(
        table: impl Into<String>,
        local: impl Into<String>,
        local_ref: impl Into<String>,
        remote_ref: impl Into<String>,
        remote: impl Into<String>,
    ) -> Self {
        JoinKey::Secondary {
            table: table.into(),
            local: local.into(),
            local_ref: local_ref.into(),
            remote_ref: remote_ref.into(),
            remote: remote.into(),
        }
    }

    /// Column of the parent entity.
    pub fn local(&self) -> &str {
        match self {
            JoinKey::Direct { local, .. } | JoinKey::Secondary { local, .. } => local,
        }
    }

    /// Column of the target entity.
    pub fn remote(&self) -> &str {
        match self {
            JoinKey::Direct { remote, .. } | JoinKey::Secondary { remote, .. } => remote,
        }
    }
}

/// A named link to another entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub name: String,
    pub target: String,
    pub cardinality: Cardinality,
    pub join: JoinKey,
    /// Opens a separate nesting context in the document store.
    pub nested: bool,
}

impl Relationship {
    pub fn one(name: impl Into<String>, target: impl Into<String>, join: JoinKey) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            cardinality: Cardinality::One,
            join,
            nested: false,
        }
    }

    pub fn many(name: impl Into<String>, target: impl Into<String>, join: JoinKey) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            cardinality: Cardinality::Many,
            join,
            nested: false,
        }
    }

    pub fn nested(mut self) -> Self {
        self.nested = true;
        self
    }
}

/// Free-text search hook of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSearch {
    /// Field searched when the text marker is not preceded by a field.
    pub default_field: String,
}

/// Validator/cleaner for one field of a payload.
pub type Cleaner = Arc<dyn Fn(&Value) -> Result<Value, String> + Send + Sync>;

/// Immutable descriptor of one entity type.
#[derive(Clone)]
pub struct EntitySchema {
    pub name: String,
    pub table: String,
    pub schema: Option<String>,
    pub fields: IndexMap<String, Field>,
    pub relationships: IndexMap<String, Relationship>,
    pub primary_key: Vec<String>,
    pub text_search: Option<TextSearch>,
    pub cleaners: IndexMap<String, Cleaner>,
}

impl fmt::Debug for EntitySchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntitySchema")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("schema", &self.schema)
            .field("fields", &self.fields)
            .field("relationships", &self.relationships)
            .field("primary_key", &self.primary_key)
            .field("text_search", &self.text_search)
            .field("cleaners", &self.cleaners.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl EntitySchema {
    pub fn builder(name: impl Into<String>, table: impl Into<String>) -> EntitySchemaBuilder {
        EntitySchemaBuilder::new(name, table)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.get(name)
    }

    /// Whether some field or relationship name continues `prefix` with more
    /// `__`-separated tokens.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        let is_extension = |name: &String| {
            name.len() > prefix.len() + 2
                && name.starts_with(prefix)
                && name[prefix.len()..].starts_with("__")
        };
        self.fields.keys().any(is_extension) || self.relationships.keys().any(is_extension)
    }

    /// Run the registered cleaner of every field present in `payload`.
    ///
    /// Fields without a cleaner pass through unchanged. The first failing
    /// field is reported.
    pub fn clean(&self, payload: &Map<String, Value>) -> CompileResult<Map<String, Value>> {
        let mut cleaned = Map::with_capacity(payload.len());
        for (key, value) in payload {
            let value = match self.cleaners.get(key) {
                Some(cleaner) => {
                    cleaner(value).map_err(|reason| CompileError::invalid_attribute(key, reason))?
                }
                None => value.clone(),
            };
            cleaned.insert(key.clone(), value);
        }
        Ok(cleaned)
    }
}

/// Builder for [`EntitySchema`].
#[must_use]
pub struct EntitySchemaBuilder {
    schema: EntitySchema,
    duplicates: Vec<String>,
}

impl EntitySchemaBuilder {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: EntitySchema {
                name: name.into(),
                table: table.into(),
                schema: None,
                fields: IndexMap::new(),
                relationships: IndexMap::new(),
                primary_key: Vec::new(),
                text_search: None,
                cleaners: IndexMap::new(),
            },
            duplicates: Vec::new(),
        }
    }

    /// Database schema the table lives in.
    pub fn db_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema.schema = Some(schema.into());
        self
    }

    pub fn field(self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.field_def(Field::new(name, field_type))
    }

    pub fn field_def(mut self, field: Field) -> Self {
        if self.schema.fields.contains_key(&field.name) {
            self.duplicates.push(field.name.clone());
        }
        self.schema.fields.insert(field.name.clone(), field);
        self
    }

    pub fn relationship(mut self, relationship: Relationship) -> Self {
        if self.schema.relationships.contains_key(&relationship.name) {
            self.duplicates.push(relationship.name.clone());
        }
        self.schema
            .relationships
            .insert(relationship.name.clone(), relationship);
        self
    }

    pub fn primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schema.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn text_search(mut self, default_field: impl Into<String>) -> Self {
        self.schema.text_search = Some(TextSearch {
            default_field: default_field.into(),
        });
        self
    }

    pub fn cleaner<F>(mut self, field: impl Into<String>, cleaner: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.schema.cleaners.insert(field.into(), Arc::new(cleaner));
        self
    }

    /// Validate everything that can be checked without the other entities.
    pub fn build(self) -> Result<EntitySchema, SchemaError> {
        let schema = self.schema;
        if let Some(name) = self.duplicates.into_iter().next() {
            return Err(SchemaError::DuplicateName {
                entity: schema.name,
                name,
            });
        }
        if let Some(name) = schema
            .fields
            .keys()
            .find(|name| schema.relationships.contains_key(*name))
        {
            return Err(SchemaError::DuplicateName {
                entity: schema.name.clone(),
                name: name.clone(),
            });
        }
        if let Some(name) = schema
            .fields
            .keys()
            .chain(schema.relationships.keys())
            .find(|name| !is_valid_name(name))
        {
            return Err(SchemaError::InvalidName {
                entity: schema.name.clone(),
                name: name.clone(),
            });
        }
        if schema.primary_key.is_empty() {
            return Err(SchemaError::EmptyPrimaryKey(schema.name));
        }
        let required = schema
            .primary_key
            .iter()
            .chain(schema.text_search.iter().map(|t| &t.default_field))
            .chain(schema.cleaners.keys())
            .chain(schema.relationships.values().map(|r| match &r.join {
                JoinKey::Direct { local, .. } | JoinKey::Secondary { local, .. } => local,
            }));
        for column in required {
            if !schema.fields.contains_key(column) {
                return Err(SchemaError::UnknownColumn {
                    entity: schema.name.clone(),
                    owner: schema.name.clone(),
                    column: column.clone(),
                });
            }
        }
        Ok(schema)
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.starts_with('_') && !name.ends_with('_') && !name.contains('.')
}
