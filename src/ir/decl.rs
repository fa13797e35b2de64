//! Declaration records: the data the user-facing registration layer hands
//! to the builder.
//!
//! A declaration is assembled as plain values before registration; assumed
//! verifications are a first-class field, not metadata bolted onto a
//! callable after the fact.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::eval::Inputs;
use crate::path::{Path, PathParseError};
use crate::schema::TypeDescriptor;
use crate::value::Value;

/// The single underlying computation shared by all leaf nodes of one
/// calculation or verification. Receives its parameters by name, fully
/// hydrated; failures are reported per-node, never panicked.
pub type ComputeFn = dyn Fn(&Inputs) -> Result<Value, String> + Send + Sync;

/// A reference to another path, optionally in a different scope.
/// Unqualified references resolve in the declaring function's scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ref {
    pub path: Path,
    pub scope: Option<String>,
}

impl Ref {
    pub fn new(path: Path) -> Self {
        Self { path, scope: None }
    }

    /// Parses the string syntax, e.g. `Ref::parse("$.mass.dry")`.
    pub fn parse(input: &str) -> Result<Self, PathParseError> {
        Ok(Self::new(Path::parse(input)?))
    }

    pub fn in_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Some(scope) => write!(f, "{}::{}", scope, self.path),
            None => write!(f, "{}", self.path),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionKind {
    Calculation,
    Verification,
}

/// One declared calculation or verification.
pub struct FunctionDecl {
    pub name: String,
    pub scope: String,
    pub kind: FunctionKind,
    /// Scopes this function may reference besides its own.
    pub imports: BTreeSet<String>,
    /// Parameter name -> declared reference, in parameter order.
    pub params: IndexMap<String, Ref>,
    pub output: TypeDescriptor,
    pub compute: Arc<ComputeFn>,
    /// Verifications whose passing this function's results are predicated
    /// on. Not data dependencies; they feed the validity overlay only.
    pub assumes: Vec<Ref>,
    /// Marks a verification that is expected to fail; carried through to
    /// reporting collaborators, the engine does not branch on it.
    pub expected_failure: bool,
}

impl FunctionDecl {
    pub fn calculation<F>(
        scope: impl Into<String>,
        name: impl Into<String>,
        output: TypeDescriptor,
        compute: F,
    ) -> Self
    where
        F: Fn(&Inputs) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self::new(scope, name, FunctionKind::Calculation, output, compute)
    }

    pub fn verification<F>(
        scope: impl Into<String>,
        name: impl Into<String>,
        output: TypeDescriptor,
        compute: F,
    ) -> Self
    where
        F: Fn(&Inputs) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self::new(scope, name, FunctionKind::Verification, output, compute)
    }

    fn new<F>(
        scope: impl Into<String>,
        name: impl Into<String>,
        kind: FunctionKind,
        output: TypeDescriptor,
        compute: F,
    ) -> Self
    where
        F: Fn(&Inputs) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            scope: scope.into(),
            kind,
            imports: BTreeSet::new(),
            params: IndexMap::new(),
            output,
            compute: Arc::new(compute),
            assumes: Vec::new(),
            expected_failure: false,
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, reference: Ref) -> Self {
        self.params.insert(name.into(), reference);
        self
    }

    pub fn with_import(mut self, scope: impl Into<String>) -> Self {
        self.imports.insert(scope.into());
        self
    }

    pub fn assuming(mut self, verification: Ref) -> Self {
        self.assumes.push(verification);
        self
    }

    pub fn expect_failure(mut self) -> Self {
        self.expected_failure = true;
        self
    }
}

impl fmt::Debug for FunctionDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDecl")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field("kind", &self.kind)
            .field("imports", &self.imports)
            .field("params", &self.params)
            .field("output", &self.output)
            .field("assumes", &self.assumes)
            .field("expected_failure", &self.expected_failure)
            .finish_non_exhaustive()
    }
}

/// Everything the builder needs: scope root schemas plus function
/// declarations.
#[derive(Debug, Default)]
pub struct ProjectDecl {
    pub name: String,
    /// Scope name -> root schema, in declaration order. Duplicate names are
    /// kept here and rejected by the builder.
    pub scopes: Vec<(String, TypeDescriptor)>,
    pub functions: Vec<FunctionDecl>,
}

impl ProjectDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scopes: Vec::new(),
            functions: Vec::new(),
        }
    }

    pub fn with_scope(mut self, name: impl Into<String>, root: TypeDescriptor) -> Self {
        self.scopes.push((name.into(), root));
        self
    }

    pub fn with_function(mut self, function: FunctionDecl) -> Self {
        self.functions.push(function);
        self
    }
}
