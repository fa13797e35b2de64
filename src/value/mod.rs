//! Runtime values flowing through the engine.
//!
//! [`Value`] is the atomic unit of data: every model input, every computed
//! leaf and every hydrated function argument is one of these. Structured
//! values ([`RecordValue`], [`TableValue`]) mirror the shape of their
//! [`TypeDescriptor`](crate::schema::TypeDescriptor); a table validates its
//! key set against its domains at construction, so an incomplete or
//! over-full table can never enter the graph.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::external::FileRef;
use crate::path::KeyValue;
use crate::schema::{cartesian_keys, Domain};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    #[error("table is missing key '{key}'")]
    MissingKey { key: KeyValue },
    #[error("table has unexpected key '{key}'")]
    UnexpectedKey { key: KeyValue },
    #[error("table has no domains")]
    NoDomains,
}

/// Named fields in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordValue {
    fields: IndexMap<String, Value>,
}

impl RecordValue {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Exhaustive keyed container over one or more finite domains.
///
/// Cells are stored in cartesian-product order regardless of the order they
/// were supplied in, so iteration is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableValue {
    domains: Vec<Arc<Domain>>,
    cells: IndexMap<KeyValue, Value>,
}

impl TableValue {
    /// Fails fast if the supplied key set is not exactly the cartesian
    /// product of `domains`.
    pub fn new<I>(domains: Vec<Arc<Domain>>, cells: I) -> Result<Self, ValueError>
    where
        I: IntoIterator<Item = (KeyValue, Value)>,
    {
        if domains.is_empty() {
            return Err(ValueError::NoDomains);
        }
        let mut supplied: IndexMap<KeyValue, Value> = cells.into_iter().collect();
        let expected = cartesian_keys(&domains);

        if let Some(extra) = supplied.keys().find(|k| !expected.contains(k)) {
            return Err(ValueError::UnexpectedKey { key: extra.clone() });
        }

        let mut ordered = IndexMap::with_capacity(expected.len());
        for key in expected {
            match supplied.shift_remove(&key) {
                Some(value) => {
                    ordered.insert(key, value);
                }
                None => return Err(ValueError::MissingKey { key }),
            }
        }
        Ok(Self {
            domains,
            cells: ordered,
        })
    }

    pub fn domains(&self) -> &[Arc<Domain>] {
        &self.domains
    }

    pub fn get(&self, key: &KeyValue) -> Option<&Value> {
        self.cells.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&KeyValue, &Value)> {
        self.cells.iter()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// The atomic unit of data in the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Record(RecordValue),
    Table(TableValue),
    External(FileRef),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Record(_) => "record",
            Value::Table(_) => "table",
            Value::External(_) => "external",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Ints widen to float; everything else is a mismatch.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&RecordValue> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&TableValue> {
        match self {
            Value::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_external(&self) -> Option<&FileRef> {
        match self {
            Value::External(f) => Some(f),
            _ => None,
        }
    }

    /// A report-friendly JSON rendering: scalars map to JSON scalars,
    /// records and tables to plain objects (table keys as token strings),
    /// externals to their path string.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Bool(b) => serde_json::Value::from(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(x) => serde_json::Value::from(*x),
            Value::Str(s) => serde_json::Value::from(s.as_str()),
            Value::Record(record) => record
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_json()))
                .collect::<serde_json::Map<_, _>>()
                .into(),
            Value::Table(table) => table
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_json()))
                .collect::<serde_json::Map<_, _>>()
                .into(),
            Value::External(file_ref) => {
                serde_json::Value::from(file_ref.path.display().to_string())
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Record(r) => {
                write!(f, "{{")?;
                for (i, (name, value)) in r.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                write!(f, "}}")
            }
            Value::Table(t) => {
                write!(f, "{{")?;
                for (i, (key, value)) in t.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "[{key}]: {value}")?;
                }
                write!(f, "}}")
            }
            Value::External(file_ref) => write!(f, "<file {}>", file_ref.path.display()),
        }
    }
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

impl From<RecordValue> for Value {
    fn from(v: RecordValue) -> Self {
        Value::Record(v)
    }
}

impl From<TableValue> for Value {
    fn from(v: TableValue) -> Self {
        Value::Table(v)
    }
}
