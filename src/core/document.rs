// ============================================================================
// Document Model
// ============================================================================
//
// Documents are JSON objects. Filters, sorts and updates are small typed
// trees evaluated by the store; the facade never builds raw query text.
//
// ============================================================================

use super::{Result, StoreError};
use serde_json::Value;
use std::cmp::Ordering;

pub type Document = serde_json::Map<String, Value>;

/// Primary key field of every stored document
pub const ID_FIELD: &str = "_id";

/// Predicate over a single document
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Filter {
    /// Matches every document
    #[default]
    Empty,
    Eq(String, Value),
    Gt(String, Value),
    Gte(String, Value),
    Lt(String, Value),
    Lte(String, Value),
    And(Vec<Filter>),
}

impl Filter {
    pub fn empty() -> Self {
        Filter::Empty
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Gt(field.into(), value.into())
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Gte(field.into(), value.into())
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Lt(field.into(), value.into())
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Lte(field.into(), value.into())
    }

    pub fn and(filters: Vec<Filter>) -> Self {
        Filter::And(filters)
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Filter::Empty => true,
            Filter::And(filters) => filters.iter().all(Filter::is_empty),
            _ => false,
        }
    }

    /// Evaluate against a document. Missing fields compare as null.
    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Filter::Empty => true,
            Filter::Eq(field, expected) => values_equal(field_value(document, field), expected),
            Filter::Gt(field, bound) => {
                compare_values(field_value(document, field), bound) == Some(Ordering::Greater)
            }
            Filter::Gte(field, bound) => matches!(
                compare_values(field_value(document, field), bound),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Filter::Lt(field, bound) => {
                compare_values(field_value(document, field), bound) == Some(Ordering::Less)
            }
            Filter::Lte(field, bound) => matches!(
                compare_values(field_value(document, field), bound),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Filter::And(filters) => filters.iter().all(|f| f.matches(document)),
        }
    }

    /// The `_id` value when this filter is a plain primary key lookup
    pub fn id_equality(&self) -> Option<&Value> {
        match self {
            Filter::Eq(field, value) if field == ID_FIELD => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }

    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        let ordering = compare_values(field_value(a, &self.field), field_value(b, &self.field))
            .unwrap_or_else(|| type_rank(field_value(a, &self.field)).cmp(&type_rank(field_value(b, &self.field))));

        match self.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

/// Find request: filter, optional sort, optional limit
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    pub filter: Filter,
    pub sort: Option<Sort>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn matching(filter: Filter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    /// Absent filter means match-all
    pub fn from_optional(filter: Option<Filter>) -> Self {
        Self::matching(filter.unwrap_or_default())
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Merge-patch update: every entry is a `$set` of one top-level field.
///
/// An empty update is valid and modifies nothing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Update {
    set: Document,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.insert(field.into(), value.into());
        self
    }

    /// Add a `$set` only when the value is present
    pub fn set_if_some<V: Into<Value>>(self, field: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.set(field, value),
            None => self,
        }
    }

    /// Merge several updates; later entries win on the same field
    pub fn combine(updates: impl IntoIterator<Item = Update>) -> Self {
        let mut combined = Update::new();
        for update in updates {
            combined.set.extend(update.set);
        }
        combined
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.set.keys().map(String::as_str)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.set.get(field)
    }

    /// Apply to a stored document, returning whether anything changed.
    ///
    /// Setting `_id` to a different value fails with `ImmutableField`.
    pub fn apply_to(&self, document: &mut Document) -> Result<bool> {
        if let Some(new_id) = self.set.get(ID_FIELD) {
            if document.get(ID_FIELD) != Some(new_id) {
                return Err(StoreError::ImmutableField(ID_FIELD.to_string()));
            }
        }

        let mut modified = false;
        for (field, value) in &self.set {
            if document.get(field) != Some(value) {
                document.insert(field.clone(), value.clone());
                modified = true;
            }
        }
        Ok(modified)
    }
}

fn field_value<'a>(document: &'a Document, field: &str) -> &'a Value {
    document.get(field).unwrap_or(&Value::Null)
}

/// Ordering between two scalar values of the same kind.
///
/// Numbers compare numerically, strings lexicographically. Values of
/// different kinds are unordered.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                return Some(x.cmp(&y));
            }
            x.as_f64()?.partial_cmp(&y.as_f64()?)
        }
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

pub fn values_equal(a: &Value, b: &Value) -> bool {
    match compare_values(a, b) {
        Some(ordering) => ordering == Ordering::Equal,
        None => a == b,
    }
}

// Cross-type sort order: null < numbers < strings < booleans < containers
fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Bool(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}
