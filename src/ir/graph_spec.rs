//! The complete, immutable program the engine executes.

use std::collections::{BTreeSet, HashMap};

use indexmap::IndexMap;

use crate::graph::DependencyGraph;
use crate::ir::node_spec::NodeSpec;
use crate::path::ProjectPath;
use crate::schema::TypeDescriptor;

/// Every node of the computation graph plus the type registry needed to
/// hydrate parameter values at run time.
///
/// Node order is declaration order; it seeds the deterministic topological
/// sort. A `GraphSpec` is never mutated after the builder returns it.
#[derive(Debug)]
pub struct GraphSpec {
    nodes: IndexMap<ProjectPath, NodeSpec>,
    scope_names: Vec<String>,
    type_registry: HashMap<ProjectPath, TypeDescriptor>,
}

impl GraphSpec {
    pub(crate) fn new(
        nodes: IndexMap<ProjectPath, NodeSpec>,
        scope_names: Vec<String>,
        type_registry: HashMap<ProjectPath, TypeDescriptor>,
    ) -> Self {
        Self {
            nodes,
            scope_names,
            type_registry,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, path: &ProjectPath) -> Option<&NodeSpec> {
        self.nodes.get(path)
    }

    pub fn contains(&self, path: &ProjectPath) -> bool {
        self.nodes.contains_key(path)
    }

    /// All nodes in declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeSpec> {
        self.nodes.values()
    }

    pub fn scope_names(&self) -> &[String] {
        &self.scope_names
    }

    /// The registered type for a path referenced as a parameter or declared
    /// as a leaf.
    pub fn get_type(&self, path: &ProjectPath) -> Option<&TypeDescriptor> {
        self.type_registry.get(path)
    }

    /// Materializes the dependency graph: every node registered in
    /// declaration order, then an edge per leaf-level dependency.
    pub fn dependency_graph(&self) -> DependencyGraph<ProjectPath> {
        let mut graph = DependencyGraph::new();
        for node in self.nodes.values() {
            graph.add_node(node.id.clone());
        }
        for node in self.nodes.values() {
            for dependency in &node.dependencies {
                graph.add_edge(dependency.clone(), node.id.clone());
            }
        }
        graph
    }

    /// Everything `path` transitively depends on, totally ordered.
    pub fn dependencies_of(&self, path: &ProjectPath) -> BTreeSet<ProjectPath> {
        self.dependency_graph().ancestors(path).into_iter().collect()
    }

    /// Everything that transitively depends on `path`, totally ordered.
    pub fn dependents_of(&self, path: &ProjectPath) -> BTreeSet<ProjectPath> {
        self.dependency_graph()
            .descendants(path)
            .into_iter()
            .collect()
    }

    /// Structural problems that make the graph unrunnable: dependencies on
    /// nodes that do not exist, and cycles. Reported in declaration order;
    /// never panics.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for node in self.nodes.values() {
            for dependency in &node.dependencies {
                if !self.nodes.contains_key(dependency) {
                    problems.push(format!(
                        "node '{}' depends on unknown node '{}'",
                        node.id, dependency
                    ));
                }
            }
        }
        let graph = self.dependency_graph();
        problems.extend(graph.validate());
        problems
    }
}
