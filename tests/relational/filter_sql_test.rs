//! Filters compiled to SQL through the public compiler, across dialects.

use serde_json::{json, Map, Value};
use sift::compile::{CompileOptions, Compiler};
use sift::config::Settings;
use sift::schema::SchemaRegistry;
use sift::sql::Dialect;
use sift::CompileResult;
use sqlparser::dialect::{DuckDbDialect, MsSqlDialect, MySqlDialect, PostgreSqlDialect};
use sqlparser::parser::Parser;

fn compiler() -> Compiler {
    let registry = SchemaRegistry::from_toml_str(include_str!("../fixtures/models.toml")).unwrap();
    Compiler::new(registry, Settings::default())
}

fn assert_parses(sql: &str, dialect: Dialect) {
    let parser: Box<dyn sqlparser::dialect::Dialect> = match dialect {
        Dialect::Postgres => Box::new(PostgreSqlDialect {}),
        Dialect::DuckDb => Box::new(DuckDbDialect {}),
        Dialect::MySql => Box::new(MySqlDialect {}),
        Dialect::TSql => Box::new(MsSqlDialect {}),
    };
    if let Err(e) = Parser::parse_sql(&*parser, sql) {
        panic!("invalid SQL for {:?}: {}\n{}", dialect, e, sql);
    }
}

fn compile_for(params: Value, dialect: Dialect) -> CompileResult<String> {
    let params: Map<String, Value> = params.as_object().unwrap().clone();
    let options = CompileOptions::default().with_dialect(dialect);
    let sql = compiler().compile_relational("Model", &params, &options)?.sql();
    assert_parses(&sql, dialect);
    Ok(sql)
}

fn compile(params: Value) -> CompileResult<String> {
    compile_for(params, Dialect::Postgres)
}

#[test]
fn test_related_filter_full_query() {
    let sql = compile(json!({"other_models__name__startswith": "foo"})).unwrap();
    insta::assert_snapshot!(sql, @r#"
    SELECT DISTINCT
      "some_table".*
    FROM "some_table"
    INNER JOIN "m2m_table" AS "m2m_table_1" ON "some_table"."id" = "m2m_table_1"."model_id"
    INNER JOIN "other_table" AS "other_models_1" ON "other_models_1"."id" = "m2m_table_1"."other_model_id"
    WHERE "other_models_1"."name" LIKE 'foo%' ESCAPE '\'
    ORDER BY "some_table"."id" ASC
    "#);
}

#[test]
fn test_every_dialect_parses() {
    let params = json!({
        "name__icontains": "o'brien",
        "id__in": [1, 2, 3],
        "price__range": [1, 9.5],
        "created__year": 2024,
        "or": {"other_models__third_models__name__isnull": true, "name__notexact": "x"},
    });
    for dialect in [Dialect::Postgres, Dialect::DuckDb, Dialect::MySql, Dialect::TSql] {
        let sql = compile_for(params.clone(), dialect).unwrap();
        assert!(sql.contains("LEFT OUTER JOIN"), "{:?}: {}", dialect, sql);
    }
}

#[test]
fn test_dialect_quoting() {
    let sql = compile_for(json!({"name": "a"}), Dialect::MySql).unwrap();
    assert!(sql.contains("WHERE `some_table`.`name` = 'a'"));

    let sql = compile_for(json!({"name": "a"}), Dialect::TSql).unwrap();
    assert!(sql.contains("WHERE [some_table].[name] = 'a'"));
}

#[test]
fn test_case_insensitive_without_ilike() {
    let sql = compile_for(json!({"name__istartswith": "Ab"}), Dialect::MySql).unwrap();
    assert!(sql.contains("LOWER(`some_table`.`name`) LIKE LOWER("));

    let sql = compile_for(json!({"name__istartswith": "Ab"}), Dialect::DuckDb).unwrap();
    assert!(sql.contains("\"some_table\".\"name\" ILIKE 'Ab%'"));
}

#[test]
fn test_negated_operators() {
    let sql = compile(json!({"name__notcontains": "x", "id__notin": [1]})).unwrap();
    assert!(sql.contains("\"some_table\".\"name\" NOT LIKE '%x%'"));
    assert!(sql.contains("\"some_table\".\"id\" NOT IN (1)"));
}

#[test]
fn test_not_group() {
    let sql = compile(json!({"not": {"id": 1, "name": "a"}})).unwrap();
    assert!(sql.contains("WHERE NOT (\"some_table\".\"id\" = 1 AND \"some_table\".\"name\" = 'a')"));
}

#[test]
fn test_or_list_of_groups() {
    let sql = compile(json!({"or": [{"id": 1, "name": "a"}, {"id": 2}]})).unwrap();
    assert!(sql.contains(
        "(\"some_table\".\"id\" = 1 AND \"some_table\".\"name\" = 'a') OR \"some_table\".\"id\" = 2"
    ));
}

#[test]
fn test_search_parameter() {
    let sql = compile(json!({"search": "{\"price__lte\": \"12.5\"}"})).unwrap();
    assert!(sql.contains("WHERE \"some_table\".\"price\" <= 12.5"));
}

#[test]
fn test_text_query_requires_postgres() {
    let sql = compile(json!({"q": "hello"})).unwrap();
    assert!(sql.contains("@@ PLAINTO_TSQUERY('english', 'hello')"));

    let err = compile_for(json!({"q": "hello"}), Dialect::MySql).unwrap_err();
    assert_eq!(err.path(), "q");
}

#[test]
fn test_container_operators_require_postgres() {
    let sql = compile(json!({"tags__overlap": ["a", "b"], "meta__hasall": ["k"]})).unwrap();
    assert!(sql.contains("\"some_table\".\"tags\" && ARRAY['a', 'b']"));
    assert!(sql.contains("\"some_table\".\"meta\" ?& ARRAY['k']"));

    let err = compile_for(json!({"tags__overlap": ["a"]}), Dialect::TSql).unwrap_err();
    assert_eq!(err.path(), "tags__overlap");
}

#[test]
fn test_invalid_values() {
    let err = compile(json!({"created__gte": "yesterday"})).unwrap_err();
    assert_eq!(err.path(), "created__gte");

    let err = compile(json!({"price__range": [1]})).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Param price__range is invalid, range expects exactly two values"
    );
}

/// Join lines, and the WHERE clause split into its OR-ed leaves.
fn joins_and_leaves(sql: &str) -> (Vec<String>, Vec<String>) {
    let joins = sql
        .lines()
        .filter(|line| line.contains(" JOIN "))
        .map(str::to_string)
        .collect();
    let mut leaves: Vec<String> = sql
        .lines()
        .find_map(|line| line.strip_prefix("WHERE "))
        .map(|clause| clause.split(" OR ").map(str::to_string).collect())
        .unwrap_or_default();
    leaves.sort();
    (joins, leaves)
}

#[test]
fn test_or_children_order_does_not_matter() {
    let forward = compile(json!({"or": [
        {"other_models__name__isnull": true},
        {"name": "a"},
        {"other_models__id__gt": 3}
    ]}))
    .unwrap();
    let reversed = compile(json!({"or": [
        {"other_models__id__gt": 3},
        {"name": "a"},
        {"other_models__name__isnull": true}
    ]}))
    .unwrap();

    let (joins, leaves) = joins_and_leaves(&forward);
    assert_eq!(joins_and_leaves(&reversed), (joins.clone(), leaves.clone()));
    assert_eq!(joins.len(), 2);
    assert!(joins.iter().all(|line| line.starts_with("LEFT OUTER JOIN")));
    assert_eq!(
        leaves,
        vec![
            "\"other_models_1\".\"id\" > 3".to_string(),
            "\"other_models_1\".\"name\" IS NULL".to_string(),
            "\"some_table\".\"name\" = 'a'".to_string(),
        ]
    );
}
