//! Schema trees describing the shape of every addressable value.
//!
//! A [`TypeDescriptor`] is built once when a scope or function is declared
//! and is the only type information the engine ever consults: leaf
//! decomposition, hydration and navigation are all pure functions of the
//! descriptor. Nothing is reflected at runtime.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::path::{KeyValue, PathPart};

/// A closed, ordered enumeration of string tokens.
///
/// Domains are the axes of exhaustive keyed containers; member order is
/// declaration order and drives cartesian-product iteration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Domain {
    name: String,
    members: Vec<String>,
}

impl Domain {
    pub fn new<I, S>(name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            members: members.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.members.iter().any(|m| m == token)
    }
}

/// Every key in the cartesian product of the given domains, in
/// domain-declaration order with members in declaration order.
pub fn cartesian_keys(domains: &[Arc<Domain>]) -> Vec<KeyValue> {
    let mut keys: Vec<Vec<String>> = vec![Vec::new()];
    for domain in domains {
        let mut next = Vec::with_capacity(keys.len() * domain.len());
        for prefix in &keys {
            for member in domain.members() {
                let mut key = prefix.clone();
                key.push(member.clone());
                next.push(key);
            }
        }
        keys = next;
    }
    keys.into_iter().map(KeyValue::from_tokens).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    Bool,
    Int,
    Float,
    Str,
}

/// The schema of one addressable value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeDescriptor {
    Scalar(ScalarKind),
    /// Named fields in declaration order.
    Record(IndexMap<String, TypeDescriptor>),
    /// Exhaustive keyed container: the key set of any conforming value is
    /// exactly the cartesian product of `domains`.
    Table {
        domains: Vec<Arc<Domain>>,
        value: Box<TypeDescriptor>,
    },
    /// An external, atomically-treated reference (e.g. a file). Never
    /// decomposed further.
    External,
}

impl TypeDescriptor {
    pub fn record<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, TypeDescriptor)>,
        S: Into<String>,
    {
        TypeDescriptor::Record(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn table(domains: impl IntoIterator<Item = Arc<Domain>>, value: TypeDescriptor) -> Self {
        TypeDescriptor::Table {
            domains: domains.into_iter().collect(),
            value: Box::new(value),
        }
    }

    /// Walks the descriptor tree along `parts`. `None` when a part does not
    /// fit the shape (unknown field, item access on a non-table, ...).
    pub fn descend(&self, parts: &[PathPart]) -> Option<&TypeDescriptor> {
        let mut current = self;
        for part in parts {
            current = match (current, part) {
                (TypeDescriptor::Record(fields), PathPart::Attribute(name)) => fields.get(name)?,
                (TypeDescriptor::Table { domains, value }, PathPart::Item(key)) => {
                    if key.arity() != domains.len() {
                        return None;
                    }
                    value
                }
                _ => return None,
            };
        }
        Some(current)
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Scalar(kind) => write!(f, "{kind:?}"),
            TypeDescriptor::Record(fields) => {
                write!(f, "{{")?;
                for (i, (name, td)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {td}")?;
                }
                write!(f, "}}")
            }
            TypeDescriptor::Table { domains, value } => {
                write!(f, "Table[")?;
                for (i, d) in domains.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", d.name())?;
                }
                write!(f, "; {value}]")
            }
            TypeDescriptor::External => write!(f, "External"),
        }
    }
}

/// The only legal verification output shapes: a bare pass/fail flag, or a
/// table of pass/fail flags over finite domains.
pub fn is_valid_verification_output(descriptor: &TypeDescriptor) -> bool {
    match descriptor {
        TypeDescriptor::Scalar(ScalarKind::Bool) => true,
        TypeDescriptor::Table { value, .. } => {
            matches!(value.as_ref(), TypeDescriptor::Scalar(ScalarKind::Bool))
        }
        _ => false,
    }
}
