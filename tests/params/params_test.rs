use serde_json::{json, Value};
use sift::config::Settings;
use sift::filter::{GroupDim, OrderCriterion};
use sift::params::RequestParams;
use sift::CompileResult;

fn parse_with(value: Value, settings: &Settings) -> CompileResult<RequestParams> {
    RequestParams::from_map(value.as_object().unwrap(), settings)
}

fn parse(value: Value) -> CompileResult<RequestParams> {
    parse_with(value, &Settings::default())
}

#[test]
fn test_conditions_keep_input_order() {
    let params = parse(json!({
        "z": 1, "limit": 20, "a__gt": 2, "relations": ["other_models"], "m": null
    }))
    .unwrap();
    assert_eq!(params.conditions.keys().collect::<Vec<_>>(), vec!["z", "a__gt", "m"]);
    assert_eq!(params.limit, Some(20));
    assert_eq!(params.offset, None);
    assert_eq!(params.relations, Some(json!(["other_models"])));
}

#[test]
fn test_null_paging_is_absent() {
    let params = parse(json!({"limit": null, "offset": " 7 "})).unwrap();
    assert_eq!(params.limit, None);
    assert_eq!(params.offset, Some(7));

    let err = parse(json!({"offset": -1})).unwrap_err();
    assert_eq!(err.path(), "offset");
}

#[test]
fn test_search_wins_over_plain_keys() {
    let params = parse(json!({
        "search": {"name__startswith": "x", "id": 3},
        "id": 1
    }))
    .unwrap();
    assert_eq!(params.conditions["id"], json!(3));
    assert_eq!(params.conditions["name__startswith"], json!("x"));

    assert!(parse(json!({"search": null})).unwrap().conditions.is_empty());

    let err = parse(json!({"search": "[1, 2]"})).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Param search is invalid, value of search filter attribute is invalid"
    );
    assert!(parse(json!({"search": 5})).is_err());
}

#[test]
fn test_order_values() {
    let params = parse(json!({"order": {"-name__func__lower": null, "price__round": 2}})).unwrap();
    assert_eq!(
        params.order,
        vec![
            OrderCriterion {
                path: "name__func__lower".into(),
                ascending: false,
                value: Value::Null,
            },
            OrderCriterion {
                path: "price__round".into(),
                ascending: true,
                value: json!(2),
            },
        ]
    );

    assert!(parse(json!({"order": ""})).unwrap().order.is_empty());
    assert!(parse(json!({"order": "{\"-id\": null}"})).unwrap().order[0].path == "id");

    let err = parse(json!({"order": [["id"]]})).unwrap_err();
    assert_eq!(err.path(), "order");
}

#[test]
fn test_totals_spec() {
    let params = parse(json!({
        "totals": [
            {"sum": ["id", "price"]},
            {"group_by": ["name", {"price__gt": 3}]},
            {"group_limit": 4},
            "count"
        ]
    }))
    .unwrap();
    let spec = params.totals_spec(&Settings::default()).unwrap().unwrap();
    assert_eq!(spec.group_limit, Some(4));
    assert_eq!(spec.group_by[0], GroupDim::Path("name".into()));
    assert!(matches!(spec.group_by[1], GroupDim::Filter(_)));
    assert_eq!(spec.group_by.len(), 2);
    let names: Vec<&str> = spec.metrics.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["sum__id", "sum__price", "count"]);
    assert!(spec.metrics[2].is_count());
    assert_eq!(spec.metrics[2].path, None);
}

#[test]
fn test_total_count_flag() {
    let params = parse(json!({"total_count": 1})).unwrap();
    assert_eq!(params.totals, vec![json!({"count": null})]);

    let params = parse(json!({"total_count": "yes"})).unwrap();
    assert_eq!(params.totals.len(), 1);

    let params = parse(json!({"total_count": 0, "totals": ""})).unwrap();
    assert!(params.totals.is_empty());
}

#[test]
fn test_invalid_totals() {
    let err = parse(json!({"totals": "{not json"})).unwrap_err();
    assert_eq!(err.to_string(), "Specification totals is invalid, value is not valid JSON");

    let err = parse(json!({"totals": [{"group_limit": "many"}]})).unwrap_err();
    assert_eq!(err.path(), "group_limit");

    let err = parse(json!({"totals": [{"sum": 5}]})).unwrap_err();
    assert_eq!(err.path(), "sum");

    let err = parse(json!({"totals": [[1]]})).unwrap_err();
    assert_eq!(err.path(), "totals");
}

#[test]
fn test_totals_respect_function_allow_list() {
    let settings = Settings::from_toml_str("[functions]\nallow = [\"sum\", \"count\"]").unwrap();
    assert!(parse_with(json!({"totals": ["count", {"sum": "id"}]}), &settings).is_ok());

    let err = parse_with(json!({"totals": [{"avg": "id"}]}), &settings).unwrap_err();
    assert_eq!(err.to_string(), "Param avg is invalid, function avg is not allowed");

    let err = parse(json!({"totals": [{"drop table": "id"}]})).unwrap_err();
    assert!(err.to_string().ends_with("is not a valid function name"));
}
