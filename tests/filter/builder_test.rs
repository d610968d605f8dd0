//! Driving a custom backend through the public `Backend` seam.

use std::sync::Arc;

use serde_json::{json, Value};
use sift::config::Settings;
use sift::filter::{
    Backend, Condition, FilterBuilder, Leaf, LogicalOp, Mode, Operand, OrderCriterion, OrderKey,
    Resolver, Target, Terminal,
};
use sift::schema::SchemaRegistry;
use sift::CompileResult;

/// Renders expressions as s-expressions.
#[derive(Debug, Default)]
struct SexprBackend {
    relationships: Vec<(String, bool)>,
    regrouped: usize,
}

impl Backend for SexprBackend {
    type Field = String;
    type Expr = String;
    type Order = String;

    fn resolve_relationship(&mut self, path: &sift::filter::ResolvedPath, outer: bool) -> CompileResult<()> {
        if !path.hops.is_empty() {
            self.relationships.push((path.relationship_path().join("."), outer));
        }
        Ok(())
    }

    fn resolve_field(&mut self, path: &sift::filter::ResolvedPath) -> CompileResult<String> {
        let mut parts = path.relationship_path();
        parts.push(path.field.name.clone());
        Ok(parts.join("."))
    }

    fn build_leaf_expression(&mut self, leaf: Leaf<String>) -> CompileResult<String> {
        let field = leaf
            .wrappers
            .iter()
            .fold(leaf.field, |expr, name| format!("({} {})", name, expr));
        let operand = match leaf.operand {
            Operand::Value(value) => value.to_string(),
            Operand::Field(other) => other,
        };
        Ok(match leaf.terminal {
            Terminal::Compare(op) => format!("({} {} {})", op.suffix(), field, operand),
            Terminal::Call { name, unary: true } => format!("({} {})", name, field),
            Terminal::Call { name, .. } => format!("({} {} {})", name, field, operand),
            Terminal::Text(_) => format!("(text {} {})", field, operand),
        })
    }

    fn combine(&mut self, op: LogicalOp, children: Vec<String>) -> String {
        format!("({} {})", op.keyword(), children.join(" "))
    }

    fn negate(&mut self, expr: String) -> String {
        format!("(not {})", expr)
    }

    fn group_siblings(&mut self, children: Vec<String>, _op: LogicalOp) -> Vec<String> {
        self.regrouped += 1;
        children
    }

    fn build_order(&mut self, key: OrderKey<String, String>) -> CompileResult<String> {
        let target = match key.target {
            Target::Field(field) => field,
            Target::Expression(expr) => expr,
        };
        Ok(format!("{}{}", if key.ascending { "+" } else { "-" }, target))
    }
}

fn registry() -> SchemaRegistry {
    SchemaRegistry::from_toml_str(include_str!("../fixtures/models.toml")).unwrap()
}

fn compile_with(params: Value, settings: &Settings) -> (CompileResult<Option<String>>, SexprBackend) {
    let registry = registry();
    let root = Arc::clone(registry.get("Model").unwrap());
    let resolver = Resolver::new(&registry, root, "q");
    let mut builder = FilterBuilder::new(resolver, settings, SexprBackend::default());
    let result = Condition::parse(params.as_object().unwrap(), LogicalOp::And)
        .and_then(|condition| builder.build(&condition));
    (result, builder.into_backend())
}

fn compile(params: Value) -> CompileResult<Option<String>> {
    compile_with(params, &Settings::default()).0
}

#[test]
fn test_nested_logic() {
    let expr = compile(json!({
        "id__gt": 1,
        "or": {"name": "a", "not": {"price__lt": 3}},
    }))
    .unwrap()
    .unwrap();
    assert_eq!(
        expr,
        r#"(and (gt id 1) (or (exact name "a") (not (lt price 3))))"#
    );
}

#[test]
fn test_single_children_are_not_combined() {
    assert_eq!(
        compile(json!({"and": {"or": {"name": "a"}}})).unwrap().unwrap(),
        r#"(exact name "a")"#
    );
    assert_eq!(compile(json!({"not": {}})).unwrap(), None);
}

#[test]
fn test_siblings_offered_for_regrouping() {
    let (result, backend) = compile_with(json!({"id": 1, "name": "a"}), &Settings::default());
    assert!(result.unwrap().is_some());
    assert_eq!(backend.regrouped, 1);

    let (_, backend) = compile_with(json!({"id": 1}), &Settings::default());
    assert_eq!(backend.regrouped, 0);
}

#[test]
fn test_relationships_and_outer_joins() {
    let (result, backend) = compile_with(
        json!({
            "other_models__name": "x",
            "other_models__third_models__name__isnull": "true",
        }),
        &Settings::default(),
    );
    assert_eq!(
        result.unwrap().unwrap(),
        r#"(and (exact other_models.name "x") (isnull other_models.third_models.name true))"#
    );
    assert_eq!(
        backend.relationships,
        vec![
            ("other_models".to_string(), false),
            ("other_models.third_models".to_string(), true),
        ]
    );
}

#[test]
fn test_function_leaves() {
    assert_eq!(
        compile(json!({"name__sfunc__lower__length": null})).unwrap().unwrap(),
        "(length (lower name))"
    );
    assert_eq!(
        compile(json!({"price__efunc__other_models__id__greatest": null}))
            .unwrap()
            .unwrap(),
        "(greatest price other_models.id)"
    );
}

#[test]
fn test_function_allow_list() {
    let settings = Settings::from_toml_str("[functions]\nallow = [\"lower\"]").unwrap();
    let (result, _) = compile_with(json!({"name__func__upper__exact": "A"}), &settings);
    assert_eq!(result.unwrap_err().path(), "name__func__upper__exact");
    let (result, _) = compile_with(json!({"name__func__lower__exact": "a"}), &settings);
    assert_eq!(result.unwrap().unwrap(), r#"(exact (lower name) "a")"#);
}

#[test]
fn test_unknown_columns_can_be_ignored() {
    let settings = Settings::from_toml_str("[filter]\nignore_unknown = true").unwrap();
    let (result, _) = compile_with(json!({"bogus": 1}), &settings);
    assert_eq!(result.unwrap(), None);
    assert!(compile(json!({"bogus": 1})).is_err());
}

#[test]
fn test_order_targets() {
    let registry = registry();
    let settings = Settings::default();
    let resolver = Resolver::new(&registry, Arc::clone(registry.get("Model").unwrap()), "q");
    let mut builder = FilterBuilder::new(resolver, &settings, SexprBackend::default());

    let criteria = OrderCriterion::parse(&json!({"-other_models__name": null, "name__func__lower": null})).unwrap();
    assert_eq!(
        builder.build_order(&criteria).unwrap(),
        vec!["-other_models.name".to_string(), "+(lower name null)".to_string()]
    );

    let target = builder
        .build_target("price", &Value::Null, Mode::Aggregate)
        .unwrap()
        .map(|(path, _)| path.field.name);
    assert_eq!(target.as_deref(), Some("price"));
}
