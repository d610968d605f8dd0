//! Filters and order criteria compiled to search bodies.

use serde_json::{json, Map, Value};
use sift::compile::Compiler;
use sift::config::Settings;
use sift::schema::SchemaRegistry;
use sift::CompileResult;

fn compiler() -> Compiler {
    let registry = SchemaRegistry::from_toml_str(include_str!("../fixtures/models.toml")).unwrap();
    Compiler::new(registry, Settings::default())
}

fn body(params: Value) -> CompileResult<Value> {
    let params: Map<String, Value> = params.as_object().unwrap().clone();
    compiler()
        .compile_document("Model", &params)
        .map(|output| output.to_value())
}

#[test]
fn test_empty_request() {
    assert_eq!(body(json!({})).unwrap(), json!({}));
}

#[test]
fn test_siblings_share_nested_context() {
    assert_eq!(
        body(json!({"other_models__name": "a", "name": "x", "other_models__id__gt": 1})).unwrap(),
        json!({"query": {"bool": {"must": [
            {"nested": {"path": "other_models", "query": {"bool": {"must": [
                {"term": {"other_models.name": "a"}},
                {"range": {"other_models.id": {"gt": 1}}}
            ]}}}},
            {"term": {"name": "x"}}
        ]}}})
    );
}

#[test]
fn test_deeper_context_kept_inside_parent() {
    assert_eq!(
        body(json!({
            "other_models__third_models__name": "t",
            "other_models__name": "o",
        }))
        .unwrap(),
        json!({"query": {"nested": {"path": "other_models", "query": {"bool": {"must": [
            {"nested": {"path": "other_models.third_models", "query": {"term": {"other_models.third_models.name": "t"}}}},
            {"term": {"other_models.name": "o"}}
        ]}}}}})
    );
}

#[test]
fn test_or_siblings_merge_with_should() {
    assert_eq!(
        body(json!({"or": {"other_models__name": "a", "other_models__id": 2}})).unwrap(),
        json!({"query": {"nested": {"path": "other_models", "query": {"bool": {"should": [
            {"term": {"other_models.name": "a"}},
            {"term": {"other_models.id": 2}}
        ]}}}}})
    );
}

/// Sort the children of every boolean clause so bodies compare up to order.
fn unordered(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, child)| {
                    let child = match (key.as_str(), unordered(child)) {
                        ("must" | "should" | "must_not" | "filter", Value::Array(mut items)) => {
                            items.sort_by_key(|item| item.to_string());
                            Value::Array(items)
                        }
                        (_, other) => other,
                    };
                    (key.clone(), child)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(unordered).collect()),
        other => other.clone(),
    }
}

#[test]
fn test_or_children_order_does_not_matter() {
    let forward = body(json!({"or": [
        {"other_models__name": "a"},
        {"name": "x"},
        {"other_models__id__gt": 3}
    ]}))
    .unwrap();
    let reversed = body(json!({"or": [
        {"other_models__id__gt": 3},
        {"name": "x"},
        {"other_models__name": "a"}
    ]}))
    .unwrap();
    assert_eq!(unordered(&forward), unordered(&reversed));

    let clauses = forward["query"]["bool"]["should"].as_array().unwrap();
    assert_eq!(clauses.len(), 2);
    let nested: Vec<&Value> = clauses.iter().filter(|c| c.get("nested").is_some()).collect();
    assert_eq!(nested.len(), 1);
    assert_eq!(nested[0]["nested"]["path"], json!("other_models"));
}

#[test]
fn test_search_and_text() {
    assert_eq!(
        body(json!({"search": {"q__or": ["red", "blue"]}})).unwrap(),
        json!({"query": {"match": {"name": {
            "query": "\"red\" \"blue\"",
            "operator": "or",
            "boost": 1
        }}}})
    );
}

#[test]
fn test_explicit_order_disables_scoring() {
    assert_eq!(
        body(json!({"name__startswith": "a", "order": ["-other_models__name", "id"]})).unwrap(),
        json!({
            "query": {"constant_score": {"filter": {"prefix": {"name": "a"}}}},
            "sort": [
                {"other_models.name": {"order": "desc", "nested": {"path": "other_models"}}},
                "id"
            ]
        })
    );
}

#[test]
fn test_score_order_keeps_scoring() {
    assert_eq!(
        body(json!({"q": "words", "order": "-_score"})).unwrap(),
        json!({
            "query": {"match": {"name": {"query": "words", "operator": "and", "boost": 1}}},
            "sort": [{"_score": {"order": "desc"}}]
        })
    );
}

#[test]
fn test_unsupported_in_documents() {
    let err = body(json!({"name__istartswith": "a"})).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Param name__istartswith is invalid, istartswith is not supported by the document backend"
    );

    let err = body(json!({"order": "name__sfunc__length"})).unwrap_err();
    assert_eq!(err.path(), "name__sfunc__length");
}

#[test]
fn test_unknown_entity() {
    let err = compiler().compile_document("Missing", &Map::new()).unwrap_err();
    assert_eq!(err.path(), "Missing");
}
