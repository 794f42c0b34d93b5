//! Runtime values and records.
//!
//! [`Value`] is what flows through predicates, statement parameters and result
//! rows. [`Record`] is an ordered property → value mapping; executors return
//! rows as records and the population engine attaches related records to them.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::{QueryError, QueryResult};

/// A runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// String value.
    String(String),
    /// UUID value.
    Uuid(Uuid),
    /// Timestamp value.
    DateTime(DateTime<Utc>),
    /// JSON value.
    Json(serde_json::Value),
    /// List of values.
    List(Vec<Value>),
    /// An entity-like record. Shared so that populated targets are not duplicated.
    Record(Arc<Record>),
}

impl Value {
    /// Check if this is a null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the string slice, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the integer, if this is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get the list items, if this is a list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Get the record, if this is a record.
    pub fn as_record(&self) -> Option<&Arc<Record>> {
        match self {
            Self::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Identity used to match keys across records (foreign key ↔ primary key).
    ///
    /// Returns `None` for values that cannot act as keys.
    pub fn key(&self) -> Option<String> {
        match self {
            Self::Int(i) => Some(i.to_string()),
            Self::String(s) => Some(s.clone()),
            Self::Uuid(u) => Some(u.to_string()),
            Self::Bool(b) => Some(b.to_string()),
            Self::Float(f) if f.is_finite() => Some(f.to_string()),
            Self::DateTime(d) => Some(d.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            _ => None,
        }
    }

    /// Convert from a JSON value.
    ///
    /// Objects are kept as JSON; use [`Record::from_json`] for entity-like objects.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from_json).collect())
            }
            obj @ serde_json::Value::Object(_) => Self::Json(obj),
        }
    }

    /// Convert to a plain JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Uuid(u) => serde_json::Value::String(u.to_string()),
            Self::DateTime(d) => {
                serde_json::Value::String(d.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Self::Json(j) => j.clone(),
            Self::List(items) => serde_json::Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Record(record) => record.to_json(),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::DateTime(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Self::Record(Arc::new(v))
    }
}

impl From<Arc<Record>> for Value {
    fn from(v: Arc<Record>) -> Self {
        Self::Record(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}

/// An ordered mapping from property name to value.
///
/// Records are plain data. Typed access goes through [`Record::deserialize`]
/// and plain serialization through [`Record::to_json`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: IndexMap<String, Value>,
}

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, returning the record for chaining.
    pub fn set(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(property.into(), value.into());
        self
    }

    /// Insert a field, returning the previous value.
    pub fn insert(&mut self, property: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(property.into(), value.into())
    }

    /// Get a field.
    pub fn get(&self, property: &str) -> Option<&Value> {
        self.fields.get(property)
    }

    /// Remove a field, keeping the order of the remaining fields.
    pub fn remove(&mut self, property: &str) -> Option<Value> {
        self.fields.shift_remove(property)
    }

    /// Check whether a field is present.
    pub fn contains(&self, property: &str) -> bool {
        self.fields.contains_key(property)
    }

    /// Iterate over fields in order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Iterate over property names in order.
    pub fn properties(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Build a record from a JSON object.
    pub fn from_json(value: serde_json::Value) -> QueryResult<Self> {
        match value {
            serde_json::Value::Object(map) => Ok(map
                .into_iter()
                .map(|(key, value)| (key, Value::from_json(value)))
                .collect()),
            other => Err(QueryError::deserialization(format!(
                "expected a JSON object, got {}",
                other
            ))),
        }
    }

    /// Plain serialization of the record, including populated relations.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.fields
                .iter()
                .map(|(key, value)| (key.clone(), value.to_json()))
                .collect(),
        )
    }

    /// Reconstitute a typed value from this record.
    pub fn deserialize<T: DeserializeOwned>(&self) -> QueryResult<T> {
        serde_json::from_value(self.to_json())
            .map_err(|e| QueryError::deserialization(e.to_string()).with_source(e))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}
