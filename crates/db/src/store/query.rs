//! Collection queries: equality filters, one sort key, a limit.

use super::Snapshot;
use serde_json::Value;
use std::cmp::Ordering;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

/// A query over the direct children of one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Collection path.
    pub collection: String,
    filters: Vec<(String, Value)>,
    order: Option<(String, Direction)>,
    limit: Option<usize>,
}

impl Query {
    /// Start a query over `collection`.
    #[must_use]
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    /// Keep documents whose top-level `field` equals `value`.
    #[must_use]
    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    /// Sort by a top-level field. Documents without it are dropped.
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order = Some((field.into(), direction));
        self
    }

    /// Cap the number of results.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Evaluate against an unfiltered listing.
    #[must_use]
    pub fn apply(&self, docs: Vec<Snapshot>) -> Vec<Snapshot> {
        let mut matched: Vec<Snapshot> = docs
            .into_iter()
            .filter(|doc| {
                self.filters
                    .iter()
                    .all(|(field, value)| doc.data.get(field) == Some(value))
            })
            .collect();

        if let Some((field, direction)) = &self.order {
            matched.retain(|doc| doc.data.get(field).is_some_and(|v| !v.is_null()));
            matched.sort_by(|a, b| {
                let ord = compare(&a.data[field.as_str()], &b.data[field.as_str()]);
                let ord = match direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                };
                ord.then_with(|| a.path.cmp(&b.path))
            });
        }

        if let Some(limit) = self.limit {
            matched.truncate(limit);
        }
        matched
    }
}

fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}
