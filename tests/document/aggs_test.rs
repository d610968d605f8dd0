//! Totals compiled to bucket aggregations and read back from responses.

use serde_json::{json, Map, Value};
use sift::compile::{Compiler, DocumentOutput};
use sift::config::Settings;
use sift::schema::SchemaRegistry;
use sift::CompileResult;

fn compile_for(entity: &str, params: Value, settings: Settings) -> CompileResult<DocumentOutput> {
    let registry = SchemaRegistry::from_toml_str(include_str!("../fixtures/models.toml")).unwrap();
    let params: Map<String, Value> = params.as_object().unwrap().clone();
    Compiler::new(registry, settings).compile_document(entity, &params)
}

fn compile(params: Value) -> CompileResult<DocumentOutput> {
    compile_for("Model", params, Settings::default())
}

#[test]
fn test_metric_in_group_context() {
    let output = compile(json!({
        "totals": [{"group_by": "other_models__name"}, {"max": "other_models__id"}]
    }))
    .unwrap();
    assert_eq!(
        output.to_value(),
        json!({"aggs": {"nested": {
            "nested": {"path": "other_models"},
            "aggs": {"other_models__name": {
                "terms": {"field": "other_models.name.raw", "size": 10000, "order": {"max": "desc"}},
                "aggs": {"max": {"max": {"field": "other_models.id"}}}
            }}
        }}})
    );
}

#[test]
fn test_two_nested_levels() {
    let output = compile(json!({
        "totals": [
            {"group_by": ["other_models__name", "other_models__third_models__name"]},
            {"count": null}
        ]
    }))
    .unwrap();
    assert_eq!(
        output.to_value(),
        json!({"aggs": {"nested": {
            "nested": {"path": "other_models"},
            "aggs": {"other_models__name": {
                "terms": {"field": "other_models.name.raw", "size": 10000},
                "aggs": {"nested": {
                    "nested": {"path": "other_models.third_models"},
                    "aggs": {"other_models__third_models__name": {
                        "terms": {"field": "other_models.third_models.name", "size": 10000}
                    }}
                }}
            }}
        }}})
    );

    let response = json!({
        "hits": {"total": {"value": 5}},
        "aggregations": {"nested": {"doc_count": 7, "other_models__name": {"buckets": [
            {"key": "a", "doc_count": 4, "nested": {"doc_count": 4, "other_models__third_models__name": {"buckets": [
                {"key": "t1", "doc_count": 3},
                {"key": "t2", "doc_count": 1}
            ]}}}
        ]}}}
    });
    assert_eq!(
        Value::Object(output.flatten(&response)),
        json!({"total_count": {"a": {"t1": 3, "t2": 1}}})
    );
}

#[test]
fn test_group_limit_and_encoded_totals() {
    let output = compile(json!({
        "totals": "[{\"group_limit\": 3}, {\"group_by\": \"name\"}, {\"avg\": \"price\"}]"
    }))
    .unwrap();
    assert_eq!(
        output.to_value(),
        json!({"aggs": {"name": {
            "terms": {"field": "name.raw", "size": 3, "order": {"avg": "desc"}},
            "aggs": {"avg": {"avg": {"field": "price"}}}
        }}})
    );
}

#[test]
fn test_bucket_size_setting() {
    let settings = Settings::from_toml_str("[document]\nbucket_size = 50").unwrap();
    let output = compile_for("Model", json!({"totals": [{"group_by": "id"}]}), settings).unwrap();
    assert_eq!(
        output.to_value(),
        json!({"aggs": {"id": {"terms": {"field": "id", "size": 50}}}})
    );
}

#[test]
fn test_count_comes_from_hits() {
    let output = compile(json!({"price__gte": 1, "total_count": true})).unwrap();
    assert_eq!(
        output.to_value(),
        json!({"query": {"range": {"price": {"gte": 1}}}})
    );
    let response = json!({"hits": {"total": 12, "hits": []}});
    assert_eq!(
        Value::Object(output.flatten(&response)),
        json!({"total_count": 12})
    );
}

#[test]
fn test_no_totals_flattens_to_nothing() {
    let output = compile(json!({"name": "a"})).unwrap();
    assert!(output.totals.is_none());
    assert!(output.flatten(&json!({"hits": {"total": 3}})).is_empty());
}

#[test]
fn test_invalid_totals() {
    let err = compile_for("Pair", json!({"totals": ["sum"]}), Settings::default()).unwrap_err();
    assert_eq!(err.path(), "sum");

    let err = compile(json!({"totals": [{"group_by": "name__gt"}]})).unwrap_err();
    assert!(err.to_string().contains("only plain columns can be used to group documents"));
}
