//! Typed search-query DSL and its JSON form.
//!
//! ```json
//! {"query": {"bool": {"must": [{"term": {"name": "value"}},
//!                              {"nested": {"path": "other_models",
//!                                          "query": {"term": {"other_models.name": "x"}}}}]}},
//!  "sort": [{"name": {"order": "desc"}}, "id"],
//!  "aggs": {"name": {"terms": {"field": "name.raw", "size": 10000}}}}
//! ```

use indexmap::IndexMap;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::Value;

/// A query clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Term { field: String, value: Value },
    Terms { field: String, values: Vec<Value> },
    /// Bounds keyed by `gt`, `gte`, `lt` or `lte`.
    Range {
        field: String,
        bounds: IndexMap<&'static str, Value>,
    },
    Wildcard { field: String, pattern: String },
    Prefix { field: String, value: Value },
    Match {
        field: String,
        query: Value,
        options: Option<MatchOptions>,
    },
    Exists { field: String },
    Bool(BoolQuery),
    Nested { path: String, query: Box<Query> },
    ConstantScore { filter: Box<Query> },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BoolQuery {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub must: Vec<Query>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub should: Vec<Query>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub must_not: Vec<Query>,
}

/// Options of a free-text `match` query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchOptions {
    pub operator: &'static str,
    pub boost: u32,
}

impl Query {
    pub fn term(field: impl Into<String>, value: Value) -> Self {
        Query::Term {
            field: field.into(),
            value,
        }
    }

    pub fn terms(field: impl Into<String>, values: Vec<Value>) -> Self {
        Query::Terms {
            field: field.into(),
            values,
        }
    }

    pub fn range(field: impl Into<String>, bounds: IndexMap<&'static str, Value>) -> Self {
        Query::Range {
            field: field.into(),
            bounds,
        }
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Query::Exists {
            field: field.into(),
        }
    }

    pub fn must(clauses: Vec<Query>) -> Self {
        Query::Bool(BoolQuery {
            must: clauses,
            ..BoolQuery::default()
        })
    }

    pub fn should(clauses: Vec<Query>) -> Self {
        Query::Bool(BoolQuery {
            should: clauses,
            ..BoolQuery::default()
        })
    }

    pub fn must_not(clauses: Vec<Query>) -> Self {
        Query::Bool(BoolQuery {
            must_not: clauses,
            ..BoolQuery::default()
        })
    }

    pub fn nested(path: impl Into<String>, query: Query) -> Self {
        Query::Nested {
            path: path.into(),
            query: Box::new(query),
        }
    }

    /// Filter context without relevance scoring.
    pub fn constant_score(self) -> Self {
        Query::ConstantScore {
            filter: Box::new(self),
        }
    }

    /// Path of a top-level `nested` clause.
    pub fn nested_path(&self) -> Option<&str> {
        match self {
            Query::Nested { path, .. } => Some(path),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// `{key: value}`
struct Entry<'a, T: ?Sized>(&'a str, &'a T);

impl<T: Serialize + ?Sized> Serialize for Entry<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.0, self.1)?;
        map.end()
    }
}

#[derive(Serialize)]
struct MatchBody<'a> {
    query: &'a Value,
    #[serde(flatten)]
    options: &'a MatchOptions,
}

#[derive(Serialize)]
struct NestedBody<'a> {
    path: &'a str,
    query: &'a Query,
}

impl Serialize for Query {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            Query::Term { field, value } => map.serialize_entry("term", &Entry(field, value))?,
            Query::Terms { field, values } => map.serialize_entry("terms", &Entry(field, values))?,
            Query::Range { field, bounds } => map.serialize_entry("range", &Entry(field, bounds))?,
            Query::Wildcard { field, pattern } => {
                map.serialize_entry("wildcard", &Entry(field, pattern))?
            }
            Query::Prefix { field, value } => map.serialize_entry("prefix", &Entry(field, value))?,
            Query::Match {
                field,
                query,
                options: None,
            } => map.serialize_entry("match", &Entry(field, query))?,
            Query::Match {
                field,
                query,
                options: Some(options),
            } => map.serialize_entry("match", &Entry(field, &MatchBody { query, options }))?,
            Query::Exists { field } => map.serialize_entry("exists", &Entry("field", field))?,
            Query::Bool(bool_query) => map.serialize_entry("bool", bool_query)?,
            Query::Nested { path, query } => {
                map.serialize_entry("nested", &NestedBody { path, query })?
            }
            Query::ConstantScore { filter } => {
                map.serialize_entry("constant_score", &Entry("filter", filter.as_ref()))?
            }
        }
        map.end()
    }
}

/// One sort criterion.
#[derive(Debug, Clone, PartialEq)]
pub enum Sort {
    Field {
        field: String,
        ascending: bool,
        /// Nesting context of the field.
        nested: Option<String>,
    },
    Score { ascending: bool },
}

#[derive(Serialize)]
struct SortOptions<'a> {
    order: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    nested: Option<Entry<'a, str>>,
}

fn direction(ascending: bool) -> &'static str {
    if ascending {
        "asc"
    } else {
        "desc"
    }
}

impl Serialize for Sort {
    /// Plain ascending fields serialize as their name, everything else as
    /// `{field: {"order": ..., "nested": {"path": ...}}}`.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Sort::Field {
                field,
                ascending: true,
                nested: None,
            } => serializer.serialize_str(field),
            Sort::Field {
                field,
                ascending,
                nested,
            } => {
                let options = SortOptions {
                    order: direction(*ascending),
                    nested: nested.as_deref().map(|path| Entry("path", path)),
                };
                Entry(field, &options).serialize(serializer)
            }
            Sort::Score { ascending } => {
                let options = SortOptions {
                    order: direction(*ascending),
                    nested: None,
                };
                Entry("_score", &options).serialize(serializer)
            }
        }
    }
}

/// Named aggregations of one level.
pub type Aggs = IndexMap<String, Aggregation>;

/// A metric or bucket aggregation.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    /// `{function: {"field": field}}`
    Metric { function: String, field: String },
    Terms {
        field: String,
        size: u64,
        /// Metric paths, descending.
        order: Vec<String>,
        aggs: Aggs,
    },
    Nested { path: String, aggs: Aggs },
    /// Back to the root document.
    ReverseNested { aggs: Aggs },
    Filter { filter: Query, aggs: Aggs },
}

impl Aggregation {
    /// Sub-aggregations of a bucket aggregation.
    pub fn aggs(&self) -> Option<&Aggs> {
        match self {
            Aggregation::Metric { .. } => None,
            Aggregation::Terms { aggs, .. }
            | Aggregation::Nested { aggs, .. }
            | Aggregation::ReverseNested { aggs }
            | Aggregation::Filter { aggs, .. } => Some(aggs),
        }
    }

    /// Whether the aggregation produces exactly one bucket, so metrics
    /// below it can be addressed by a `wrapper>metric` path.
    pub fn is_single_bucket(&self) -> bool {
        matches!(
            self,
            Aggregation::Nested { .. } | Aggregation::ReverseNested { .. } | Aggregation::Filter { .. }
        )
    }
}

#[derive(Serialize)]
struct TermsBody<'a> {
    field: &'a str,
    size: u64,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    order: IndexMap<&'a str, &'static str>,
}

#[derive(Serialize)]
struct Empty {}

impl Serialize for Aggregation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        match self {
            Aggregation::Metric { function, field } => {
                map.serialize_entry(function, &Entry("field", field))?;
            }
            Aggregation::Terms {
                field, size, order, ..
            } => {
                let order = order.iter().map(|path| (path.as_str(), "desc")).collect();
                map.serialize_entry(
                    "terms",
                    &TermsBody {
                        field,
                        size: *size,
                        order,
                    },
                )?;
            }
            Aggregation::Nested { path, .. } => {
                map.serialize_entry("nested", &Entry("path", path))?;
            }
            Aggregation::ReverseNested { .. } => {
                map.serialize_entry("reverse_nested", &Empty {})?;
            }
            Aggregation::Filter { filter, .. } => {
                map.serialize_entry("filter", filter)?;
            }
        }
        if let Some(aggs) = self.aggs().filter(|aggs| !aggs.is_empty()) {
            map.serialize_entry("aggs", aggs)?;
        }
        map.end()
    }
}

/// A complete search request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<Query>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<Sort>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub aggs: Aggs,
}

impl SearchBody {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
