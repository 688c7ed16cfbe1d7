use crate::context::ResolvedValue;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Comparison operator of a single query clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "NOT IN")]
    NotIn,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
        }
    }

    /// Whether this is a (possibly negated) equality, as opposed to a range
    /// or list-membership test.
    pub fn is_equality(self) -> bool {
        matches!(self, Operator::Eq | Operator::NotEq)
    }

    pub fn is_negated(self) -> bool {
        matches!(self, Operator::NotEq | Operator::NotIn)
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical, alias-resolved key of a query clause.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SearchKey {
    pub name: String,
}

impl SearchKey {
    pub fn new(name: impl Into<String>) -> Self {
        SearchKey { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Value of a query clause: a scalar in one of the parsed shapes, an ordered
/// list of raw strings for `IN`-style clauses, or the converted form produced
/// by the value-conversion pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SearchValue {
    Text(String),
    TextList(Vec<String>),
    Number(i64),
    Date(DateTime<Utc>),
    Bool(bool),
    Resolved(Vec<ResolvedValue>),
}

impl SearchValue {
    /// The surface form of the value as it appeared in the query.
    pub fn raw_value(&self) -> String {
        match self {
            SearchValue::Text(text) => text.clone(),
            SearchValue::TextList(items) => format!("[{}]", items.join(", ")),
            SearchValue::Number(n) => n.to_string(),
            SearchValue::Date(dt) => dt.to_rfc3339(),
            SearchValue::Bool(b) => b.to_string(),
            SearchValue::Resolved(values) => {
                serde_json::to_string(values).unwrap_or_else(|_| "<resolved>".to_string())
            }
        }
    }

    /// The value as a list of raw tokens. Scalars become one-element lists;
    /// converters always operate on this shape.
    pub fn raw_values(&self) -> Vec<String> {
        match self {
            SearchValue::TextList(items) => items.clone(),
            other => vec![other.raw_value()],
        }
    }
}

/// One clause of a parsed query, e.g. `is:unresolved` or `release:[a, b]`.
///
/// Filters are immutable; the conversion pipeline replaces them rather than
/// mutating in place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchFilter {
    pub key: SearchKey,
    pub operator: Operator,
    pub value: SearchValue,
}

impl SearchFilter {
    pub fn new(key: impl Into<String>, operator: Operator, value: SearchValue) -> Self {
        SearchFilter {
            key: SearchKey::new(key),
            operator,
            value,
        }
    }

    /// Copy of this filter with a different operator and value. Used by the
    /// conversion pipeline to swap in resolved values.
    pub fn replaced(&self, operator: Operator, value: SearchValue) -> Self {
        SearchFilter {
            key: self.key.clone(),
            operator,
            value,
        }
    }
}

/// An aggregate-function clause such as `count():>10`. Structurally valid only
/// for discover-style searches; issue search rejects these during conversion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateFilter {
    pub key: SearchKey,
    pub operator: Operator,
    pub value: SearchValue,
}

/// A parsed clause: either a plain search filter or an aggregate filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryClause {
    Filter(SearchFilter),
    Aggregate(AggregateFilter),
}

impl QueryClause {
    pub fn key_name(&self) -> &str {
        match self {
            QueryClause::Filter(filter) => filter.key.name(),
            QueryClause::Aggregate(aggregate) => aggregate.key.name(),
        }
    }
}
