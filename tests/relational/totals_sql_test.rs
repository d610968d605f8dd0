//! Totals compiled to aggregate SQL, and aggregate rows read back.

use serde_json::{json, Map, Value};
use sift::compile::{CompileOptions, Compiler, RelationalOutput};
use sift::config::Settings;
use sift::schema::SchemaRegistry;
use sift::sql::Dialect;
use sift::CompileResult;
use sqlparser::dialect::{MsSqlDialect, PostgreSqlDialect};
use sqlparser::parser::Parser;

fn compile_for(entity: &str, params: Value, dialect: Dialect) -> CompileResult<RelationalOutput> {
    let registry = SchemaRegistry::from_toml_str(include_str!("../fixtures/models.toml")).unwrap();
    let params: Map<String, Value> = params.as_object().unwrap().clone();
    Compiler::new(registry, Settings::default()).compile_relational(
        entity,
        &params,
        &CompileOptions::default().with_dialect(dialect),
    )
}

fn totals_sql(params: Value) -> String {
    let sql = compile_for("Model", params, Dialect::Postgres)
        .unwrap()
        .totals_sql()
        .unwrap();
    if let Err(e) = Parser::parse_sql(&PostgreSqlDialect {}, &sql) {
        panic!("invalid SQL: {}\n{}", e, sql);
    }
    sql
}

fn rows(value: Value) -> Vec<Map<String, Value>> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row.as_object().unwrap().clone())
        .collect()
}

#[test]
fn test_no_totals_requested() {
    let output = compile_for("Model", json!({"name": "a"}), Dialect::Postgres).unwrap();
    assert!(output.totals.is_none());
    assert_eq!(output.totals_sql(), None);
}

#[test]
fn test_total_count_flag() {
    let sql = totals_sql(json!({"total_count": 1}));
    assert_eq!(
        sql,
        "SELECT\n  COUNT(\"some_table\".\"id\") AS \"count\"\nFROM \"some_table\"\nORDER BY 1 DESC"
    );
}

#[test]
fn test_grouped_totals_full_query() {
    let sql = totals_sql(json!({
        "price__gt": 5,
        "totals": [{"group_by": "other_models__name"}, {"sum": "price"}, "count"],
    }));
    insta::assert_snapshot!(sql, @r#"
    SELECT
      "totals_other_models_1"."name" AS "other_models__name",
      SUM("some_table"."price") AS "sum",
      COUNT("some_table"."id") AS "count"
    FROM "some_table"
    INNER JOIN "m2m_table" AS "totals_m2m_table_1" ON "some_table"."id" = "totals_m2m_table_1"."model_id"
    INNER JOIN "other_table" AS "totals_other_models_1" ON "totals_other_models_1"."id" = "totals_m2m_table_1"."other_model_id"
    WHERE "some_table"."price" > 5.0
    GROUP BY "totals_other_models_1"."name"
    ORDER BY 1, 2 DESC, 3 DESC
    "#);
}

#[test]
fn test_metric_labels() {
    let output = compile_for(
        "Model",
        json!({"totals": [{"max": ["id", "price"]}, {"min": "price"}]}),
        Dialect::Postgres,
    )
    .unwrap();
    let totals = output.totals.unwrap();
    assert_eq!(totals.metrics, vec!["max__id", "max__price", "min"]);
    assert!(totals.dimensions.is_empty());
}

#[test]
fn test_group_limit() {
    let sql = totals_sql(json!({
        "totals": [{"group_by": ["name", "other_models__name"]}, {"group_limit": 2}, {"count": null}],
    }));
    assert!(sql.contains(
        "ROW_NUMBER() OVER (PARTITION BY \"some_table\".\"name\" ORDER BY COUNT(\"some_table\".\"id\") DESC) AS \"row_number\""
    ));
    assert!(sql.contains("WHERE \"anon_1\".\"row_number\" <= 2"));
}

#[test]
fn test_composite_key_in_tsql() {
    let err = compile_for("Pair", json!({"total_count": true}), Dialect::TSql).unwrap_err();
    assert_eq!(err.path(), "count");

    let output = compile_for("Pair", json!({"totals": [{"sum": "weight"}]}), Dialect::TSql).unwrap();
    let sql = output.totals_sql().unwrap();
    assert!(sql.contains("SUM([pair_table].[weight]) AS [sum]"));
    if let Err(e) = Parser::parse_sql(&MsSqlDialect {}, &sql) {
        panic!("invalid SQL: {}\n{}", e, sql);
    }
}

#[test]
fn test_rows_flatten_ungrouped() {
    let output = compile_for(
        "Model",
        json!({"totals": [{"sum": "price"}, "count"]}),
        Dialect::Postgres,
    )
    .unwrap();
    let totals = output.totals.unwrap();
    assert_eq!(
        Value::Object(totals.flatten(&rows(json!([{"sum": 10.5, "count": 4}])))),
        json!({"total_sum": 10.5, "total_count": 4})
    );
    assert_eq!(
        Value::Object(totals.flatten(&[])),
        json!({"total_sum": null, "total_count": null})
    );
}

#[test]
fn test_rows_flatten_grouped() {
    let output = compile_for(
        "Model",
        json!({"totals": [{"group_by": ["name", "other_models__name"]}, "count"]}),
        Dialect::Postgres,
    )
    .unwrap();
    let totals = output.totals.unwrap();
    let flattened = totals.flatten(&rows(json!([
        {"name": "a", "other_models__name": "x", "count": 2},
        {"name": "a", "other_models__name": "y", "count": 1},
        {"name": "b", "other_models__name": null, "count": 3},
    ])));
    assert_eq!(
        Value::Object(flattened),
        json!({"total_count": {"a": {"x": 2, "y": 1}, "b": {"null": 3}}})
    );
}
