use serde_json::{json, Map, Value};
use sift::schema::{Cardinality, FieldType, JoinKey, RegistryBuilder, SchemaError, SchemaRegistry};
use sift::CompileError;

const MODELS: &str = include_str!("../fixtures/models.toml");

#[test]
fn test_load_fixture() {
    let registry = SchemaRegistry::from_toml_str(MODELS).unwrap();
    assert_eq!(registry.len(), 4);
    assert_eq!(
        registry.names().collect::<Vec<_>>(),
        vec!["Model", "OtherModel", "ThirdModel", "Pair"]
    );

    let model = registry.get("Model").unwrap();
    assert_eq!(model.table, "some_table");
    assert_eq!(model.primary_key, vec!["id"]);
    assert_eq!(model.text_search.as_ref().unwrap().default_field, "name");
    assert!(model.field("name").unwrap().raw);
    assert!(model.field("tags").unwrap().multi);
    assert_eq!(model.field("meta").unwrap().field_type, FieldType::Json);
    assert!(model.field("meta").unwrap().field_type.is_container());

    let rel = model.relationship("other_models").unwrap();
    assert_eq!(rel.cardinality, Cardinality::Many);
    assert!(rel.nested);
    assert_eq!(
        rel.join,
        JoinKey::secondary("m2m_table", "id", "model_id", "other_model_id", "id")
    );

    let pair = registry.get("Pair").unwrap();
    assert_eq!(pair.schema.as_deref(), Some("reporting"));
    assert_eq!(pair.primary_key, vec!["left_id", "right_id"]);
}

#[test]
fn test_unknown_entity() {
    let registry = SchemaRegistry::from_toml_str(MODELS).unwrap();
    let err = registry.get("Missing").unwrap_err();
    assert_eq!(err, CompileError::UnknownEntity("Missing".into()));
    assert_eq!(err.to_string(), "Unknown entity: Missing");
}

#[test]
fn test_unknown_target() {
    let err = SchemaRegistry::from_toml_str(
        r#"
[[entity]]
name = "Model"
table = "some_table"

[[entity.field]]
name = "id"
type = "int"

[[entity.relationship]]
name = "parent"
target = "Parent"
cardinality = "one"
join = { direct = { local = "id", remote = "id" } }
"#,
    )
    .unwrap_err();
    assert!(matches!(err, SchemaError::UnknownTarget { ref target, .. } if target == "Parent"));
}

#[test]
fn test_duplicate_entity() {
    let content = r#"
[[entity]]
name = "Model"
table = "a"

[[entity.field]]
name = "id"
type = "int"

[[entity]]
name = "Model"
table = "b"

[[entity.field]]
name = "id"
type = "int"
"#;
    let err = SchemaRegistry::from_toml_str(content).unwrap_err();
    assert!(matches!(err, SchemaError::DuplicateEntity(ref name) if name == "Model"));
}

#[test]
fn test_entity_checks() {
    let missing_pk = r#"
[[entity]]
name = "Model"
table = "some_table"

[[entity.field]]
name = "name"
type = "string"
"#;
    let err = SchemaRegistry::from_toml_str(missing_pk).unwrap_err();
    assert!(matches!(err, SchemaError::UnknownColumn { ref column, .. } if column == "id"));

    let bad_name = r#"
[[entity]]
name = "Model"
table = "some_table"

[[entity.field]]
name = "id"
type = "int"

[[entity.field]]
name = "_hidden"
type = "string"
"#;
    let err = SchemaRegistry::from_toml_str(bad_name).unwrap_err();
    assert!(matches!(err, SchemaError::InvalidName { ref name, .. } if name == "_hidden"));
}

#[test]
fn test_parse_errors() {
    let err = SchemaRegistry::from_toml_str("[[entity]]\nname = \"Model\"\n").unwrap_err();
    assert!(matches!(err, SchemaError::ParseError(_)));

    let unknown_key = r#"
[[entity]]
name = "Model"
table = "some_table"
color = "blue"
"#;
    let err = SchemaRegistry::from_toml_str(unknown_key).unwrap_err();
    assert!(matches!(err, SchemaError::ParseError(_)));
    assert!(err.to_string().starts_with("Failed to parse schema file"));

    let err = SchemaRegistry::from_file("does/not/exist.toml").unwrap_err();
    assert!(matches!(err, SchemaError::ReadError(_)));
}

#[test]
fn test_cleaners_on_loaded_entities() {
    let registry = RegistryBuilder::from_toml_str(MODELS)
        .unwrap()
        .cleaner("ThirdModel", "name", |value: &Value| match value {
            Value::String(s) => Ok(Value::String(s.trim().to_string())),
            _ => Err("must be a string".to_string()),
        })
        .build()
        .unwrap();
    let third = registry.get("ThirdModel").unwrap();

    let payload: Map<String, Value> = json!({"name": "  x ", "id": 3}).as_object().unwrap().clone();
    let cleaned = third.clean(&payload).unwrap();
    assert_eq!(Value::Object(cleaned), json!({"name": "x", "id": 3}));

    let payload: Map<String, Value> = json!({"name": 5}).as_object().unwrap().clone();
    let err = third.clean(&payload).unwrap_err();
    assert_eq!(err.path(), "name");
    assert_eq!(err.to_string(), "Param name is invalid, must be a string");
}
