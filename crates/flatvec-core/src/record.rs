//! Free-form records and the named, ordered stores that hold them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::codec::FORMAT_VERSION;

/// A single record field. The variant set is closed: anything a record
/// carries must be representable here.
///
/// Externally tagged on the wire, which keeps the encoding self-describing
/// under bincode. `Vector` is the embedding payload and encodes as an element
/// count followed by packed little-endian floats, never a generic sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Vector(Vec<f32>),
    Seq(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<f32>> for Value {
    fn from(v: Vec<f32>) -> Self {
        Value::Vector(v)
    }
}

/// One record: string keys to values, no schema.
///
/// The `text` and `embedding` keys are conventions read through the accessors
/// by the layers that need them; the store itself never validates them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// The conventional `text` field, when present and a string.
    pub fn text(&self) -> Option<&str> {
        match self.fields.get("text") {
            Some(Value::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// The conventional `embedding` field, when present and a vector.
    pub fn embedding(&self) -> Option<&[f32]> {
        match self.fields.get("embedding") {
            Some(Value::Vector(v)) => Some(v),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<BTreeMap<String, Value>> for Record {
    fn from(fields: BTreeMap<String, Value>) -> Self {
        Record { fields }
    }
}

/// A named, ordered collection of records.
///
/// Position is identity: references into a store are record indices, so
/// reordering or truncating records invalidates any index built over it.
#[derive(Debug, Clone, PartialEq)]
pub struct DocStore {
    pub name: String,
    pub version: u32,
    pub records: Vec<Record>,
}

impl DocStore {
    /// Wrap `records` under `name` with the current format version.
    pub fn new(name: impl Into<String>, records: Vec<Record>) -> Self {
        DocStore {
            name: name.into(),
            version: FORMAT_VERSION,
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
