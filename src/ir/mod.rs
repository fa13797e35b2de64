//! Intermediate representation: declarations in, executable graph out.

mod builder;
mod decl;
mod graph_spec;
mod node_spec;

pub use builder::{build_graph_spec, DeclarationError};
pub use decl::{ComputeFn, FunctionDecl, FunctionKind, ProjectDecl, Ref};
pub use graph_spec::GraphSpec;
pub use node_spec::{FunctionIdentity, NodeKind, NodeMetadata, NodeSpec};
