//! Generic dependency graph over opaque node identifiers.

mod dependency;

pub use dependency::{DependencyGraph, GraphError};
