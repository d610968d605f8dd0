//! Order criteria compiled to SQL.

use serde_json::{json, Map, Value};
use sift::compile::{CompileOptions, Compiler};
use sift::config::Settings;
use sift::schema::SchemaRegistry;
use sift::sql::Dialect;
use sift::CompileResult;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

fn compile_with(params: Value, settings: Settings) -> CompileResult<String> {
    let registry = SchemaRegistry::from_toml_str(include_str!("../fixtures/models.toml")).unwrap();
    let params: Map<String, Value> = params.as_object().unwrap().clone();
    let output = Compiler::new(registry, settings).compile_relational(
        "Model",
        &params,
        &CompileOptions::default().with_dialect(Dialect::Postgres),
    )?;
    let sql = output.sql();
    if let Err(e) = Parser::parse_sql(&PostgreSqlDialect {}, &sql) {
        panic!("invalid SQL: {}\n{}", e, sql);
    }
    Ok(sql)
}

fn compile(params: Value) -> CompileResult<String> {
    compile_with(params, Settings::default())
}

#[test]
fn test_default_order_is_primary_key() {
    let sql = compile(json!({})).unwrap();
    assert_eq!(
        sql,
        "SELECT\n  \"some_table\".*\nFROM \"some_table\"\nORDER BY \"some_table\".\"id\" ASC"
    );
}

#[test]
fn test_composite_primary_key_order() {
    let registry = SchemaRegistry::from_toml_str(include_str!("../fixtures/models.toml")).unwrap();
    let output = Compiler::new(registry, Settings::default())
        .compile_relational("Pair", &Map::new(), &CompileOptions::default())
        .unwrap();
    assert!(output.sql().ends_with(
        "ORDER BY \"pair_table\".\"left_id\" ASC, \"pair_table\".\"right_id\" ASC"
    ));
    assert!(output.sql().contains("FROM \"reporting\".\"pair_table\""));
}

#[test]
fn test_order_forms() {
    let sql = compile(json!({"order": "-price"})).unwrap();
    assert!(sql.ends_with("ORDER BY \"some_table\".\"price\" DESC"));

    let sql = compile(json!({"order": ["+name", "-id"]})).unwrap();
    assert!(sql.ends_with("ORDER BY \"some_table\".\"name\" ASC, \"some_table\".\"id\" DESC"));

    let sql = compile(json!({"order": "[\"name\", \"-price\"]"})).unwrap();
    assert!(sql.ends_with("ORDER BY \"some_table\".\"name\" ASC, \"some_table\".\"price\" DESC"));
}

#[test]
fn test_related_order_joins() {
    let sql = compile(json!({"order": "-other_models__third_models__name"})).unwrap();
    assert!(!sql.contains("DISTINCT"));
    assert!(sql.contains("INNER JOIN \"third_table\" AS \"third_models_1\""));
    assert!(sql.ends_with("ORDER BY \"third_models_1\".\"name\" DESC"));
}

#[test]
fn test_order_shares_filter_joins() {
    let sql = compile(json!({
        "other_models__name__contains": "a",
        "order": ["other_models__id", "id"],
    }))
    .unwrap();
    assert_eq!(sql.matches("AS \"other_models_1\"").count(), 1);
    assert!(sql.starts_with("SELECT DISTINCT\n  \"some_table\".*,\n  \"other_models_1\".\"id\"\n"));
    assert!(sql.ends_with("ORDER BY \"other_models_1\".\"id\" ASC, \"some_table\".\"id\" ASC"));
}

#[test]
fn test_order_by_function() {
    let sql = compile(json!({"order": {"-name__sfunc__length": null}})).unwrap();
    assert!(sql.ends_with("ORDER BY LENGTH(\"some_table\".\"name\") DESC"));

    let sql = compile(json!({"order": {"price__func__round": 2}})).unwrap();
    assert!(sql.ends_with("ORDER BY ROUND(\"some_table\".\"price\", 2) ASC"));
}

#[test]
fn test_invalid_order() {
    let err = compile(json!({"order": "-"})).unwrap_err();
    assert_eq!(err.path(), "order");

    let err = compile(json!({"order": "bogus"})).unwrap_err();
    assert_eq!(err.path(), "bogus");

    let err = compile(json!({"order": "q"})).unwrap_err();
    assert_eq!(err.path(), "q");
}

#[test]
fn test_unknown_order_column_ignored() {
    let settings = Settings::from_toml_str("[filter]\nignore_unknown = true").unwrap();
    let sql = compile_with(json!({"order": ["bogus", "-id"]}), settings).unwrap();
    assert!(sql.ends_with("ORDER BY \"some_table\".\"id\" DESC"));
}
