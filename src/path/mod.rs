//! Addressing scheme for the computation graph.
//!
//! Every piece of data the engine touches is named by a [`ProjectPath`]: a
//! scope name plus a [`Path`] rooted at the scope's model (`$`), one of its
//! calculations (`@name`) or one of its verifications (`?name`), followed by
//! a sequence of attribute/item accesses down to a leaf field.
//!
//! Paths are plain data with structural equality and a total order, so they
//! can serve directly as graph node identities and as sort keys for display.

mod access;
mod leaves;

pub use access::{get_by_parts, hydrate, HydrationError};
pub use leaves::leaf_suffixes;

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

/// A key into an exhaustive keyed container: one domain token, or an ordered
/// tuple of tokens for multi-dimensional containers.
///
/// Serializes as its token string (`"a"`, `"a,b"`) so keyed containers stay
/// plain maps on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyValue {
    Single(String),
    Tuple(Vec<String>),
}

impl Serialize for KeyValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for KeyValue {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(KeyValue::from_tokens(raw.split(',').map(str::trim)))
    }
}

impl KeyValue {
    /// Builds a key from domain tokens; a single token collapses to `Single`.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        if tokens.len() == 1 {
            KeyValue::Single(tokens.remove(0))
        } else {
            KeyValue::Tuple(tokens)
        }
    }

    /// The individual domain tokens, in order.
    pub fn tokens(&self) -> Vec<&str> {
        match self {
            KeyValue::Single(t) => vec![t.as_str()],
            KeyValue::Tuple(ts) => ts.iter().map(String::as_str).collect(),
        }
    }

    /// Number of domains this key spans.
    pub fn arity(&self) -> usize {
        match self {
            KeyValue::Single(_) => 1,
            KeyValue::Tuple(ts) => ts.len(),
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Single(t) => write!(f, "{t}"),
            KeyValue::Tuple(ts) => write!(f, "{}", ts.join(",")),
        }
    }
}

/// One step of a path: a record field access or a container item access.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PathPart {
    Attribute(String),
    Item(KeyValue),
}

impl PathPart {
    pub fn attribute(name: impl Into<String>) -> Self {
        PathPart::Attribute(name.into())
    }

    pub fn item(key: KeyValue) -> Self {
        PathPart::Item(key)
    }
}

impl fmt::Display for PathPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathPart::Attribute(name) => write!(f, ".{name}"),
            PathPart::Item(key) => write!(f, "[{key}]"),
        }
    }
}

/// The root a path hangs off: the scope's model, a calculation, or a
/// verification. Rendered as `$`, `@name`, `?name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RootSymbol {
    Model,
    Calculation(String),
    Verification(String),
}

impl RootSymbol {
    /// The bare name for calculation/verification roots, `None` for the model.
    pub fn name(&self) -> Option<&str> {
        match self {
            RootSymbol::Model => None,
            RootSymbol::Calculation(name) | RootSymbol::Verification(name) => Some(name),
        }
    }
}

impl fmt::Display for RootSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RootSymbol::Model => write!(f, "$"),
            RootSymbol::Calculation(name) => write!(f, "@{name}"),
            RootSymbol::Verification(name) => write!(f, "?{name}"),
        }
    }
}

/// Position-significant part sequences are short in practice; keep them inline.
pub type PathParts = SmallVec<[PathPart; 4]>;

/// A root symbol plus an ordered sequence of parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Path {
    pub root: RootSymbol,
    pub parts: PathParts,
}

impl Path {
    pub fn new(root: RootSymbol, parts: impl IntoIterator<Item = PathPart>) -> Self {
        Self {
            root,
            parts: parts.into_iter().collect(),
        }
    }

    /// The bare `$` path.
    pub fn model_root() -> Self {
        Self::new(RootSymbol::Model, [])
    }

    /// The bare `@name` path.
    pub fn calculation(name: impl Into<String>) -> Self {
        Self::new(RootSymbol::Calculation(name.into()), [])
    }

    /// The bare `?name` path.
    pub fn verification(name: impl Into<String>) -> Self {
        Self::new(RootSymbol::Verification(name.into()), [])
    }

    /// A copy of this path extended by the given suffix.
    pub fn join(&self, suffix: &[PathPart]) -> Self {
        let mut parts = self.parts.clone();
        parts.extend(suffix.iter().cloned());
        Self {
            root: self.root.clone(),
            parts,
        }
    }

    /// Parses the string syntax: `$.mass.dry`, `@totals[nominal].margin`,
    /// `?limits[phase_a,safe]`.
    pub fn parse(input: &str) -> Result<Self, PathParseError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(PathParseError::Empty);
        }

        // Root runs up to the first '.' or '['.
        let root_end = s.find(['.', '[']).unwrap_or(s.len());
        let root_str = &s[..root_end];
        let root = match root_str {
            "$" => RootSymbol::Model,
            _ if root_str.starts_with('@') && root_str.len() > 1 => {
                RootSymbol::Calculation(root_str[1..].to_string())
            }
            _ if root_str.starts_with('?') && root_str.len() > 1 => {
                RootSymbol::Verification(root_str[1..].to_string())
            }
            _ => {
                return Err(PathParseError::UnknownRoot {
                    root: root_str.to_string(),
                })
            }
        };

        let mut parts = PathParts::new();
        let rest = &s[root_end..];
        let bytes = rest.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'.' => {
                    i += 1;
                    let start = i;
                    while i < bytes.len() && bytes[i] != b'.' && bytes[i] != b'[' {
                        i += 1;
                    }
                    if start == i {
                        return Err(PathParseError::EmptyAttribute { position: start });
                    }
                    parts.push(PathPart::Attribute(rest[start..i].to_string()));
                }
                b'[' => {
                    i += 1;
                    let start = i;
                    while i < bytes.len() && bytes[i] != b']' {
                        i += 1;
                    }
                    if i == bytes.len() {
                        return Err(PathParseError::UnterminatedKey { position: start });
                    }
                    let key_str = &rest[start..i];
                    i += 1; // skip ']'
                    let key = if key_str.contains(',') {
                        KeyValue::Tuple(key_str.split(',').map(|k| k.trim().to_string()).collect())
                    } else {
                        KeyValue::Single(key_str.trim().to_string())
                    };
                    parts.push(PathPart::Item(key));
                }
                other => {
                    return Err(PathParseError::UnexpectedCharacter {
                        position: root_end + i,
                        character: other as char,
                    })
                }
            }
        }

        Ok(Self { root, parts })
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)?;
        for part in &self.parts {
            write!(f, "{part}")?;
        }
        Ok(())
    }
}

/// Globally unique node identity: a scope name plus a path within it.
///
/// The derived order (scope first, then path) is the display order used by
/// reporting collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectPath {
    pub scope: String,
    pub path: Path,
}

impl ProjectPath {
    pub fn new(scope: impl Into<String>, path: Path) -> Self {
        Self {
            scope: scope.into(),
            path,
        }
    }
}

impl fmt::Display for ProjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.scope, self.path)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathParseError {
    #[error("empty path string")]
    Empty,
    #[error("unknown path root '{root}' (expected '$', '@name' or '?name')")]
    UnknownRoot { root: String },
    #[error("empty attribute name at position {position}")]
    EmptyAttribute { position: usize },
    #[error("unterminated '[' at position {position}")]
    UnterminatedKey { position: usize },
    #[error("unexpected character '{character}' at position {position}")]
    UnexpectedCharacter { position: usize, character: char },
}
