//! Per-leaf node specifications.
//!
//! Building the graph flattens every declared output into one node per
//! addressable leaf. Leaves of the same function share the compute closure
//! and parameter mapping; the engine runs each closure once and fans the
//! result out across its leaves.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::ir::decl::ComputeFn;
use crate::path::{ProjectPath, RootSymbol};
use crate::schema::TypeDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// An initial-value leaf of a scope's model. Never computed.
    Model,
    Calculation,
    Verification,
}

/// Identifies the declared function a node belongs to: its scope and the
/// root symbol its leaves hang off. All leaves of one function share this.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionIdentity {
    pub scope: String,
    pub root: RootSymbol,
}

impl fmt::Display for FunctionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.scope, self.root)
    }
}

/// Side-channel facts about a node that are not data dependencies.
#[derive(Debug, Clone, Default)]
pub struct NodeMetadata {
    /// The full declared output type of the owning function. `None` for
    /// model nodes. Used to decompose the compute result into leaves.
    pub root_output_type: Option<TypeDescriptor>,
    /// Root paths of the verifications this node's validity is predicated on.
    pub assumed_verifications: Vec<ProjectPath>,
    /// The owning verification is documented as expected to fail.
    pub expected_failure: bool,
}

/// One graph node: a single addressable leaf and everything needed to
/// compute it.
pub struct NodeSpec {
    pub id: ProjectPath,
    pub kind: NodeKind,
    /// Leaf-level data dependencies, totally ordered for reproducibility.
    pub dependencies: std::collections::BTreeSet<ProjectPath>,
    /// The type of this leaf itself (not the whole function output).
    pub output_type: TypeDescriptor,
    /// Shared across all leaves of the owning function; `None` for models.
    pub compute: Option<Arc<ComputeFn>>,
    /// Parameter name -> resolved reference path, in declaration order.
    pub param_mapping: IndexMap<String, ProjectPath>,
    pub metadata: NodeMetadata,
}

impl NodeSpec {
    pub fn function_identity(&self) -> FunctionIdentity {
        FunctionIdentity {
            scope: self.id.scope.clone(),
            root: self.id.path.root.clone(),
        }
    }
}

impl fmt::Debug for NodeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeSpec")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("dependencies", &self.dependencies)
            .field("output_type", &self.output_type)
            .field("compute", &self.compute.as_ref().map(|_| "<fn>"))
            .field("param_mapping", &self.param_mapping)
            .field("metadata", &self.metadata)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::Path;
    use crate::schema::ScalarKind;

    #[test]
    fn function_identity_groups_leaves_of_one_function() {
        let make = |suffix: &str| NodeSpec {
            id: ProjectPath::new("Thermal", Path::parse(suffix).unwrap()),
            kind: NodeKind::Calculation,
            dependencies: Default::default(),
            output_type: TypeDescriptor::Scalar(ScalarKind::Float),
            compute: None,
            param_mapping: IndexMap::new(),
            metadata: NodeMetadata::default(),
        };
        let a = make("@loads[nominal]");
        let b = make("@loads[safe]");
        let other = make("@margins");
        assert_eq!(a.function_identity(), b.function_identity());
        assert_ne!(a.function_identity(), other.function_identity());
        assert_eq!(a.function_identity().to_string(), "Thermal::@loads");
    }
}
