//! TOML schema files.
//!
//! ```toml
//! [[entity]]
//! name = "Model"
//! table = "some_table"
//! primary_key = ["id"]
//! text_search = { default_field = "name" }
//!
//! [[entity.field]]
//! name = "id"
//! type = "int"
//!
//! [[entity.field]]
//! name = "name"
//! type = "string"
//! raw = true
//!
//! [[entity.relationship]]
//! name = "other_models"
//! target = "OtherModel"
//! cardinality = "many"
//! nested = true
//! join = { secondary = { table = "m2m_table", local = "id", local_ref = "model_id", remote_ref = "other_model_id", remote = "id" } }
//! ```

use serde::Deserialize;

use super::{
    Cardinality, EntitySchema, Field, FieldType, JoinKey, Relationship, SchemaError, TextSearch,
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaFile {
    #[serde(default, rename = "entity")]
    pub entities: Vec<EntityDef>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityDef {
    pub name: String,
    pub table: String,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default = "default_primary_key")]
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub text_search: Option<TextSearch>,
    #[serde(default, rename = "field")]
    pub fields: Vec<FieldDef>,
    #[serde(default, rename = "relationship")]
    pub relationships: Vec<RelationshipDef>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub multi: bool,
    #[serde(default)]
    pub raw: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelationshipDef {
    pub name: String,
    pub target: String,
    pub cardinality: Cardinality,
    pub join: JoinKey,
    #[serde(default)]
    pub nested: bool,
}

fn default_primary_key() -> Vec<String> {
    vec!["id".to_string()]
}

impl EntityDef {
    pub fn into_schema(self) -> Result<EntitySchema, SchemaError> {
        let mut builder = EntitySchema::builder(self.name, self.table).primary_key(self.primary_key);
        if let Some(schema) = self.schema {
            builder = builder.db_schema(schema);
        }
        if let Some(text) = self.text_search {
            builder = builder.text_search(text.default_field);
        }
        for f in self.fields {
            builder = builder.field_def(Field {
                name: f.name,
                field_type: f.field_type,
                multi: f.multi,
                raw: f.raw,
            });
        }
        for r in self.relationships {
            builder = builder.relationship(Relationship {
                name: r.name,
                target: r.target,
                cardinality: r.cardinality,
                join: r.join,
                nested: r.nested,
            });
        }
        builder.build()
    }
}
