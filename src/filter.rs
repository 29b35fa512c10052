//! Metadata filtering for search queries.
//!
//! A [`MetadataFilter`] is a conjunction of equality and range predicates over
//! a document's labeled fields (`timestamp`, `category`, `group_id`,
//! `project`, `escalated`, `resolved`) and its custom typed fields. Filters
//! are read-only views constructed per query and discarded after use.

use crate::document::{Metadata, MetadataValue};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// A typed comparison operand.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// Boolean operand. Supports equality only.
    Boolean(bool),
    /// Integer operand. Comparable with integer and float fields.
    Integer(i64),
    /// Float operand. Comparable with integer and float fields.
    Float(f64),
    /// String operand. Supports equality only.
    String(String),
    /// Timestamp operand, compared against the document timestamp.
    Timestamp(DateTime<Utc>),
}

/// Comparison operator for a single condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// Field equals the operand.
    Eq,
    /// Field is strictly greater than the operand.
    Gt,
    /// Field is greater than or equal to the operand.
    Gte,
    /// Field is strictly less than the operand.
    Lt,
    /// Field is less than or equal to the operand.
    Lte,
}

/// One predicate over a named field.
#[derive(Debug, Clone)]
pub struct FilterCondition {
    /// Field name: a labeled field or a key into the custom map.
    pub field: String,
    /// Comparison operator.
    pub op: FilterOp,
    /// Operand to compare against.
    pub value: FilterValue,
}

/// Conjunction of conditions; a record matches when every condition holds.
///
/// An empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct MetadataFilter {
    /// Conditions, all of which must hold.
    pub all: Vec<FilterCondition>,
}

impl MetadataFilter {
    /// Creates an empty filter that matches every record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a condition, builder-style.
    pub fn and(mut self, field: impl Into<String>, op: FilterOp, value: FilterValue) -> Self {
        self.all.push(FilterCondition {
            field: field.into(),
            op,
            value,
        });
        self
    }

    /// Evaluates the conjunction against a record's timestamp and metadata.
    pub fn matches(&self, timestamp: DateTime<Utc>, metadata: &Metadata) -> bool {
        self.all
            .iter()
            .all(|cond| evaluate(cond, timestamp, metadata))
    }
}

/// A resolved field value, borrowed from the record.
enum Resolved<'a> {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(&'a str),
    Time(DateTime<Utc>),
}

fn resolve<'a>(field: &str, timestamp: DateTime<Utc>, metadata: &'a Metadata) -> Option<Resolved<'a>> {
    match field {
        "timestamp" => Some(Resolved::Time(timestamp)),
        "category" => Some(Resolved::Str(&metadata.category)),
        "group_id" => Some(Resolved::Str(&metadata.group_id)),
        "project" => Some(Resolved::Str(&metadata.project)),
        "escalated" => Some(Resolved::Bool(metadata.escalated)),
        "resolved" => Some(Resolved::Bool(metadata.resolved)),
        other => metadata.custom.get(other).map(|v| match v {
            MetadataValue::Boolean(b) => Resolved::Bool(*b),
            MetadataValue::Integer(i) => Resolved::Int(*i),
            MetadataValue::Float(f) => Resolved::Float(*f),
            MetadataValue::String(s) => Resolved::Str(s),
        }),
    }
}

/// A missing field never matches.
fn evaluate(cond: &FilterCondition, timestamp: DateTime<Utc>, metadata: &Metadata) -> bool {
    let field = match resolve(&cond.field, timestamp, metadata) {
        Some(f) => f,
        None => return false,
    };
    match cond.op {
        FilterOp::Eq => value_eq(&field, &cond.value),
        FilterOp::Gt => value_cmp(&field, &cond.value).is_some_and(|o| o == Ordering::Greater),
        FilterOp::Gte => value_cmp(&field, &cond.value).is_some_and(|o| o != Ordering::Less),
        FilterOp::Lt => value_cmp(&field, &cond.value).is_some_and(|o| o == Ordering::Less),
        FilterOp::Lte => value_cmp(&field, &cond.value).is_some_and(|o| o != Ordering::Greater),
    }
}

fn value_eq(field: &Resolved<'_>, operand: &FilterValue) -> bool {
    match (field, operand) {
        (Resolved::Bool(a), FilterValue::Boolean(b)) => a == b,
        (Resolved::Str(a), FilterValue::String(b)) => *a == b.as_str(),
        (Resolved::Time(a), FilterValue::Timestamp(b)) => a == b,
        (Resolved::Int(a), FilterValue::Integer(b)) => a == b,
        (Resolved::Int(a), FilterValue::Float(b)) => (*a as f64 - b).abs() < f64::EPSILON,
        (Resolved::Float(a), FilterValue::Float(b)) => (a - b).abs() < f64::EPSILON,
        (Resolved::Float(a), FilterValue::Integer(b)) => (a - *b as f64).abs() < f64::EPSILON,
        _ => false,
    }
}

/// Ordering is defined for numeric fields and timestamps; strings and
/// booleans support equality only.
fn value_cmp(field: &Resolved<'_>, operand: &FilterValue) -> Option<Ordering> {
    match (field, operand) {
        (Resolved::Time(a), FilterValue::Timestamp(b)) => Some(a.cmp(b)),
        (Resolved::Int(a), FilterValue::Integer(b)) => Some(a.cmp(b)),
        (Resolved::Int(a), FilterValue::Float(b)) => (*a as f64).partial_cmp(b),
        (Resolved::Float(a), FilterValue::Float(b)) => a.partial_cmp(b),
        (Resolved::Float(a), FilterValue::Integer(b)) => a.partial_cmp(&(*b as f64)),
        _ => None,
    }
}
