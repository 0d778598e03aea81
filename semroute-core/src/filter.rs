//! Typed, shallow field filters.
//!
//! Filters narrow a pattern match by requiring keys on the event's `who`,
//! `where`, `where.digital`, `why`, `how`, or `metadata` records to hold
//! specific primitive values. Filtering is deliberately shallow: values are
//! primitives, comparisons are O(1), and nested structures are
//! unrepresentable in [`FilterValue`] — structural matching belongs in a
//! predicate pattern.
//!
//! Comparison is strict on runtime type: `Int(5)` never matches the string
//! `"5"`, and `Bool(true)` never matches the number `1`.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::RegisterError;

/// A primitive filter value.
///
/// Nested objects and arrays have no representation here; that is the
/// type-level guarantee keeping filter evaluation shallow.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// A string, matched against JSON strings only.
    Str(String),
    /// An integer, matched against integral JSON numbers only.
    Int(i64),
    /// A float, matched against fractional JSON numbers only.
    Float(f64),
    /// A boolean.
    Bool(bool),
    /// JSON null.
    Null,
}

impl FilterValue {
    /// Strict-typed equality against a JSON value.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Str(expected), Value::String(actual)) => expected == actual,
            (Self::Int(expected), Value::Number(actual)) => {
                !actual.is_f64() && actual.as_i64() == Some(*expected)
            }
            (Self::Float(expected), Value::Number(actual)) => {
                actual.is_f64() && actual.as_f64() == Some(*expected)
            }
            (Self::Bool(expected), Value::Bool(actual)) => expected == actual,
            (Self::Null, Value::Null) => true,
            _ => false,
        }
    }

    /// Strict-typed equality against a plain string (discriminators, ids,
    /// action verbs — fields that are strings by construction).
    pub fn matches_str(&self, value: &str) -> bool {
        matches!(self, Self::Str(expected) if expected == value)
    }

    fn from_json(field: &'static str, key: &str, value: &Value) -> Result<Self, RegisterError> {
        match value {
            Value::String(s) => Ok(Self::Str(s.clone())),
            Value::Number(n) if !n.is_f64() => n.as_i64().map(Self::Int).ok_or_else(|| {
                RegisterError::NestedFilter {
                    field,
                    key: key.to_string(),
                }
            }),
            Value::Number(n) => Ok(Self::Float(n.as_f64().unwrap_or_default())),
            Value::Bool(b) => Ok(Self::Bool(*b)),
            Value::Null => Ok(Self::Null),
            Value::Object(_) | Value::Array(_) => Err(RegisterError::NestedFilter {
                field,
                key: key.to_string(),
            }),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for FilterValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// A shallow key → primitive map applied to one filterable field.
pub type FieldFilter = BTreeMap<String, FilterValue>;

/// True when every filter key exists in `fields` with a strictly
/// type-equal value.
pub fn field_filter_matches(filter: &FieldFilter, fields: &Map<String, Value>) -> bool {
    filter
        .iter()
        .all(|(key, expected)| fields.get(key).is_some_and(|actual| expected.matches(actual)))
}

/// The full filter set of one listener, one optional [`FieldFilter`] per
/// filterable event field.
#[derive(Debug, Clone, Default)]
pub struct Filters {
    /// Keys on the event's `who` entity (`$type` and `id` included).
    pub who: Option<FieldFilter>,
    /// Keys on the event's `where` record.
    pub location: Option<FieldFilter>,
    /// Keys on the event's `where.digital` record.
    pub digital: Option<FieldFilter>,
    /// Keys on the event's `why` record.
    pub why: Option<FieldFilter>,
    /// Keys on the event's `how` record.
    pub how: Option<FieldFilter>,
    /// Keys on the event's metadata (`action` and `verb` included).
    pub metadata: Option<FieldFilter>,
}

impl Filters {
    /// An empty filter set; matches every event.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a key on the `who` entity.
    pub fn who(mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.who
            .get_or_insert_with(FieldFilter::new)
            .insert(key.into(), value.into());
        self
    }

    /// Require a key on the `where` record.
    pub fn location(mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.location
            .get_or_insert_with(FieldFilter::new)
            .insert(key.into(), value.into());
        self
    }

    /// Require a key on the `where.digital` record.
    pub fn digital(mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.digital
            .get_or_insert_with(FieldFilter::new)
            .insert(key.into(), value.into());
        self
    }

    /// Require a key on the `why` record.
    pub fn why(mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.why
            .get_or_insert_with(FieldFilter::new)
            .insert(key.into(), value.into());
        self
    }

    /// Require a key on the `how` record.
    pub fn how(mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.how
            .get_or_insert_with(FieldFilter::new)
            .insert(key.into(), value.into());
        self
    }

    /// Require a key on the metadata record.
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.metadata
            .get_or_insert_with(FieldFilter::new)
            .insert(key.into(), value.into());
        self
    }

    /// True when no field filter is set.
    pub fn is_empty(&self) -> bool {
        self.who.is_none()
            && self.location.is_none()
            && self.digital.is_none()
            && self.why.is_none()
            && self.how.is_none()
            && self.metadata.is_none()
    }

    /// Build a filter set from an untyped JSON specification, e.g.
    /// `{"who": {"id": "u-1"}, "metadata": {"source": "api"}}`.
    ///
    /// A `where` specification may carry a `digital` sub-object, which
    /// becomes the `where.digital` filter. Any other non-primitive value is
    /// rejected with [`RegisterError::NestedFilter`].
    pub fn from_json(spec: &Value) -> Result<Self, RegisterError> {
        let Value::Object(map) = spec else {
            return Err(RegisterError::InvalidFilterSpec {
                got: json_type_name(spec),
            });
        };

        let mut filters = Self::new();
        for (field, value) in map {
            match field.as_str() {
                "who" => filters.who = Some(parse_field_filter("who", value, None)?),
                "where" => {
                    let mut digital = None;
                    filters.location =
                        Some(parse_field_filter("where", value, Some(&mut digital))?);
                    filters.digital = digital;
                }
                "why" => filters.why = Some(parse_field_filter("why", value, None)?),
                "how" => filters.how = Some(parse_field_filter("how", value, None)?),
                "metadata" => filters.metadata = Some(parse_field_filter("metadata", value, None)?),
                _ => {
                    return Err(RegisterError::NestedFilter {
                        field: "filters",
                        key: field.clone(),
                    });
                }
            }
        }
        Ok(filters)
    }
}

/// Parse one field's filter map. When `digital` is supplied (the `where`
/// field), a `digital` sub-object is split out rather than rejected.
fn parse_field_filter(
    field: &'static str,
    value: &Value,
    mut digital: Option<&mut Option<FieldFilter>>,
) -> Result<FieldFilter, RegisterError> {
    let Value::Object(map) = value else {
        return Err(RegisterError::InvalidFilterSpec {
            got: json_type_name(value),
        });
    };

    let mut filter = FieldFilter::new();
    for (key, entry) in map {
        if key == "digital" && entry.is_object() {
            if let Some(slot) = digital.as_deref_mut() {
                *slot = Some(parse_field_filter("where.digital", entry, None)?);
                continue;
            }
        }
        filter.insert(key.clone(), FilterValue::from_json(field, key, entry)?);
    }
    Ok(filter)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
