//! Navigation into live values and recomposition from leaf values.

use std::collections::HashMap;

use thiserror::Error;

use crate::path::{KeyValue, PathPart, PathParts};
use crate::schema::TypeDescriptor;
use crate::value::{RecordValue, TableValue, Value, ValueError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HydrationError {
    #[error("expected exactly one leaf entry with an empty suffix, found {found}")]
    Arity { found: usize },
    #[error("no leaf values for field '{field}'")]
    MissingField { field: String },
    #[error("field '{field}' not present in record value")]
    UnknownField { field: String },
    #[error("key '{key}' not present in table value")]
    KeyNotFound { key: KeyValue },
    #[error("attribute access on non-record value of type '{actual}'")]
    NotARecord { actual: &'static str },
    #[error("item access on non-table value of type '{actual}'")]
    NotATable { actual: &'static str },
    #[error("expected an item key at the head of suffix, found attribute '{field}'")]
    ExpectedItemKey { field: String },
    #[error(transparent)]
    Table(#[from] ValueError),
}

/// Walks `value` along `parts`: attributes via record field lookup, items via
/// table cell lookup.
pub fn get_by_parts<'a>(value: &'a Value, parts: &[PathPart]) -> Result<&'a Value, HydrationError> {
    let mut current = value;
    for part in parts {
        current = match (current, part) {
            (Value::Record(record), PathPart::Attribute(name)) => {
                record.get(name).ok_or_else(|| HydrationError::UnknownField {
                    field: name.clone(),
                })?
            }
            (Value::Table(table), PathPart::Item(key)) => {
                table.get(key).ok_or_else(|| HydrationError::KeyNotFound {
                    key: key.clone(),
                })?
            }
            (other, PathPart::Attribute(_)) => {
                return Err(HydrationError::NotARecord {
                    actual: other.type_name(),
                })
            }
            (other, PathPart::Item(_)) => {
                return Err(HydrationError::NotATable {
                    actual: other.type_name(),
                })
            }
        };
    }
    Ok(current)
}

/// Recomposes a value of shape `descriptor` from a map of leaf suffixes.
///
/// An entry at the empty suffix is a whole-object write and dominates any
/// per-cell entries present for the same node. Tables require the
/// reconstructed key set to be exactly the cartesian product of their
/// domains (enforced by [`TableValue::new`]).
pub fn hydrate(
    descriptor: &TypeDescriptor,
    leaves: &HashMap<PathParts, Value>,
) -> Result<Value, HydrationError> {
    if let Some(whole) = leaves.get(&PathParts::new()) {
        return Ok(whole.clone());
    }

    match descriptor {
        TypeDescriptor::Scalar(_) | TypeDescriptor::External => {
            // The empty-suffix entry was absent, so there is nothing to
            // return for an atomic value.
            Err(HydrationError::Arity {
                found: leaves.len(),
            })
        }
        TypeDescriptor::Record(fields) => {
            let mut hydrated = Vec::with_capacity(fields.len());
            for (name, field_descriptor) in fields {
                let sub: HashMap<PathParts, Value> = leaves
                    .iter()
                    .filter(|(suffix, _)| {
                        matches!(suffix.first(), Some(PathPart::Attribute(a)) if a == name)
                    })
                    .map(|(suffix, value)| (suffix[1..].iter().cloned().collect(), value.clone()))
                    .collect();
                if sub.is_empty() {
                    return Err(HydrationError::MissingField {
                        field: name.clone(),
                    });
                }
                hydrated.push((name.clone(), hydrate(field_descriptor, &sub)?));
            }
            Ok(Value::Record(RecordValue::new(hydrated)))
        }
        TypeDescriptor::Table { domains, value } => {
            let mut by_key: HashMap<KeyValue, HashMap<PathParts, Value>> = HashMap::new();
            for (suffix, leaf_value) in leaves {
                match suffix.first() {
                    Some(PathPart::Item(key)) => {
                        by_key
                            .entry(key.clone())
                            .or_default()
                            .insert(suffix[1..].iter().cloned().collect(), leaf_value.clone());
                    }
                    Some(PathPart::Attribute(field)) => {
                        return Err(HydrationError::ExpectedItemKey {
                            field: field.clone(),
                        })
                    }
                    // Empty suffixes were handled by the short-circuit above.
                    None => {}
                }
            }
            let mut cells = Vec::with_capacity(by_key.len());
            for (key, sub) in by_key {
                cells.push((key, hydrate(value, &sub)?));
            }
            let table = TableValue::new(domains.clone(), cells)?;
            Ok(Value::Table(table))
        }
    }
}
