//! Path resolution against the shared schema fixture.

use std::sync::Arc;

use sift::filter::{BaseOp, Conjunction, Mode, PathKind, Resolver};
use sift::schema::SchemaRegistry;

fn registry() -> SchemaRegistry {
    SchemaRegistry::from_toml_str(include_str!("../fixtures/models.toml")).unwrap()
}

fn resolver(registry: &SchemaRegistry) -> Resolver<'_> {
    Resolver::new(registry, Arc::clone(registry.get("Model").unwrap()), "q")
}

#[test]
fn test_secondary_relationship_hop() {
    let registry = registry();
    let path = resolver(&registry)
        .resolve("other_models__name__startswith", Mode::Filter)
        .unwrap();
    assert_eq!(path.relationship_path(), vec!["other_models".to_string()]);
    assert_eq!(path.entity.name, "OtherModel");
    assert_eq!(path.field.name, "name");
    assert_eq!(path.operator().base, BaseOp::StartsWith);
    assert_eq!(path.hops[0].parent.name, "Model");
    assert_eq!(path.hops[0].target.table, "other_table");
}

#[test]
fn test_two_hops() {
    let registry = registry();
    let path = resolver(&registry)
        .resolve("other_models__third_models__id__notin", Mode::Filter)
        .unwrap();
    assert_eq!(
        path.relationship_path(),
        vec!["other_models".to_string(), "third_models".to_string()]
    );
    assert_eq!(path.entity.name, "ThirdModel");
    let operator = path.operator();
    assert_eq!(operator.base, BaseOp::In);
    assert!(operator.negated);
}

#[test]
fn test_text_marker() {
    let registry = registry();
    let resolver = resolver(&registry);

    let path = resolver.resolve("q", Mode::Filter).unwrap();
    assert_eq!(path.field.name, "name");
    assert_eq!(path.kind, PathKind::Text { conjunction: Conjunction::And });

    let path = resolver.resolve("q__or", Mode::Filter).unwrap();
    assert_eq!(path.kind, PathKind::Text { conjunction: Conjunction::Or });

    let err = resolver.resolve("q", Mode::Order).unwrap_err();
    assert_eq!(err.path(), "q");

    // OtherModel declares no text search.
    let err = resolver.resolve("other_models__q", Mode::Filter).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Param other_models__q is invalid, specific object can't provide a query"
    );
}

#[test]
fn test_unknown_tokens() {
    let registry = registry();
    let resolver = resolver(&registry);

    let err = resolver.resolve("bogus", Mode::Filter).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Param bogus is invalid, part bogus is expected to be a known column name"
    );

    let err = resolver.resolve("name__bogus", Mode::Filter).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Param name__bogus is invalid, part bogus is expected to be a known operator"
    );

    let err = resolver.resolve("other_models", Mode::Filter).unwrap_err();
    assert_eq!(err.path(), "other_models");
}

#[test]
fn test_operator_must_end_path() {
    let registry = registry();
    let err = resolver(&registry)
        .resolve("name__exact__id", Mode::Filter)
        .unwrap_err();
    assert_eq!(err.path(), "name__exact__id");
}

#[test]
fn test_mode_is_kept() {
    let registry = registry();
    let path = resolver(&registry)
        .resolve("other_models__name", Mode::Aggregate)
        .unwrap();
    assert_eq!(path.mode, Mode::Aggregate);
    assert!(path.field.raw);
}
