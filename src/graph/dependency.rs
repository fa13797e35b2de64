//! An immutable-after-build directed graph of "depends on" relationships.
//!
//! Backed by a `petgraph` `DiGraph`; this facade pins down the semantics the
//! engine relies on: an edge `(a, b)` means "`b` depends on `a`", and
//! iteration orders are deterministic functions of insertion order so that
//! evaluation output is reproducible.

use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("graph contains a cycle")]
    CycleDetected,
}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph<T: Clone + Eq + Hash> {
    graph: DiGraph<T, ()>,
    indices: HashMap<T, NodeIndex>,
}

impl<T: Clone + Eq + Hash> DependencyGraph<T> {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            indices: HashMap::new(),
        }
    }

    /// Builds a graph from `(dependency, dependent)` edges. Both endpoints
    /// are registered as nodes.
    pub fn from_edges(edges: impl IntoIterator<Item = (T, T)>) -> Self {
        let mut graph = Self::new();
        for (from, to) in edges {
            graph.add_edge(from, to);
        }
        graph
    }

    /// Registers a node without edges (no-op if already present).
    pub fn add_node(&mut self, node: T) {
        self.ensure(node);
    }

    /// Adds "`to` depends on `from`". Parallel edges collapse to one.
    pub fn add_edge(&mut self, from: T, to: T) {
        let from_ix = self.ensure(from);
        let to_ix = self.ensure(to);
        self.graph.update_edge(from_ix, to_ix, ());
    }

    fn ensure(&mut self, node: T) -> NodeIndex {
        if let Some(&ix) = self.indices.get(&node) {
            return ix;
        }
        let ix = self.graph.add_node(node.clone());
        self.indices.insert(node, ix);
        ix
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains(&self, node: &T) -> bool {
        self.indices.contains_key(node)
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &T> {
        self.graph.node_indices().map(|ix| &self.graph[ix])
    }

    /// Direct dependencies of `node`.
    pub fn predecessors(&self, node: &T) -> Vec<T> {
        self.neighbors(node, Direction::Incoming)
    }

    /// Direct dependents of `node`.
    pub fn successors(&self, node: &T) -> Vec<T> {
        self.neighbors(node, Direction::Outgoing)
    }

    fn neighbors(&self, node: &T, direction: Direction) -> Vec<T> {
        match self.indices.get(node) {
            Some(&ix) => self
                .graph
                .neighbors_directed(ix, direction)
                .map(|n| self.graph[n].clone())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Nodes with no dependencies.
    pub fn roots(&self) -> Vec<T> {
        self.degree_filtered(Direction::Incoming)
    }

    /// Nodes nothing depends on.
    pub fn leaves(&self) -> Vec<T> {
        self.degree_filtered(Direction::Outgoing)
    }

    fn degree_filtered(&self, direction: Direction) -> Vec<T> {
        self.graph
            .node_indices()
            .filter(|&ix| self.graph.neighbors_directed(ix, direction).next().is_none())
            .map(|ix| self.graph[ix].clone())
            .collect()
    }

    /// All transitive dependencies of `node`. Iterative traversal; stack
    /// depth stays bounded regardless of chain length.
    pub fn ancestors(&self, node: &T) -> HashSet<T> {
        self.reachable(node, Direction::Incoming)
    }

    /// All transitive dependents of `node`.
    pub fn descendants(&self, node: &T) -> HashSet<T> {
        self.reachable(node, Direction::Outgoing)
    }

    fn reachable(&self, node: &T, direction: Direction) -> HashSet<T> {
        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut stack: Vec<NodeIndex> = match self.indices.get(node) {
            Some(&ix) => self.graph.neighbors_directed(ix, direction).collect(),
            None => return HashSet::new(),
        };
        while let Some(ix) = stack.pop() {
            if visited.insert(ix) {
                stack.extend(self.graph.neighbors_directed(ix, direction));
            }
        }
        visited.into_iter().map(|ix| self.graph[ix].clone()).collect()
    }

    /// Kahn's algorithm: dependencies always precede dependents.
    ///
    /// Ties between simultaneously-ready nodes break by node insertion
    /// order, so the result is stable across runs. A shortfall in the output
    /// length means a cycle (self-loops included) and fails loudly instead
    /// of truncating.
    pub fn topological_order(&self) -> Result<Vec<T>, GraphError> {
        let count = self.graph.node_count();
        let mut in_degree: Vec<usize> = vec![0; count];
        let mut queue: VecDeque<NodeIndex> = VecDeque::new();
        let mut order = Vec::with_capacity(count);

        // 1. Seed with zero-in-degree nodes, in insertion order.
        for ix in self.graph.node_indices() {
            let degree = self
                .graph
                .neighbors_directed(ix, Direction::Incoming)
                .count();
            in_degree[ix.index()] = degree;
            if degree == 0 {
                queue.push_back(ix);
            }
        }

        // 2. Peel ready nodes, releasing their dependents.
        while let Some(ix) = queue.pop_front() {
            order.push(ix);
            for dependent in self.graph.neighbors_directed(ix, Direction::Outgoing) {
                let slot = &mut in_degree[dependent.index()];
                *slot -= 1;
                if *slot == 0 {
                    queue.push_back(dependent);
                }
            }
        }

        if order.len() != count {
            return Err(GraphError::CycleDetected);
        }

        Ok(order.into_iter().map(|ix| self.graph[ix].clone()).collect())
    }

    pub fn has_cycle(&self) -> bool {
        self.topological_order().is_err()
    }

    /// Reports structural problems without raising. Dangling edges cannot
    /// occur here (edge endpoints are always registered); callers holding a
    /// wider node universe check membership themselves.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.has_cycle() {
            problems.push("graph contains a cycle".to_string());
        }
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> DependencyGraph<&'static str> {
        // b and c depend on a; d depends on both.
        DependencyGraph::from_edges([("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")])
    }

    #[test]
    fn predecessors_and_successors() {
        let g = diamond();
        let mut preds = g.predecessors(&"d");
        preds.sort();
        assert_eq!(preds, vec!["b", "c"]);
        let mut succs = g.successors(&"a");
        succs.sort();
        assert_eq!(succs, vec!["b", "c"]);
        assert!(g.predecessors(&"missing").is_empty());
    }

    #[test]
    fn roots_and_leaves() {
        let g = diamond();
        assert_eq!(g.roots(), vec!["a"]);
        assert_eq!(g.leaves(), vec!["d"]);
    }

    #[test]
    fn ancestors_and_descendants_are_transitive() {
        let g = diamond();
        assert_eq!(g.ancestors(&"d"), HashSet::from(["a", "b", "c"]));
        assert_eq!(g.descendants(&"a"), HashSet::from(["b", "c", "d"]));
        assert!(g.ancestors(&"a").is_empty());
    }

    #[test]
    fn deep_chain_traversal_does_not_recurse() {
        // 10k-node chain; a recursive traversal would blow the stack.
        let edges = (0..10_000u32).map(|i| (i, i + 1));
        let g = DependencyGraph::from_edges(edges);
        assert_eq!(g.ancestors(&10_000).len(), 10_000);
        assert_eq!(g.descendants(&0).len(), 10_000);
    }

    #[test]
    fn topological_order_respects_edges() {
        let g = diamond();
        let order = g.topological_order().unwrap();
        let pos = |n: &str| order.iter().position(|x| *x == n).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("a") < pos("c"));
        assert!(pos("b") < pos("d"));
        assert!(pos("c") < pos("d"));
    }

    #[test]
    fn topological_order_is_deterministic() {
        let g = diamond();
        let first = g.topological_order().unwrap();
        for _ in 0..5 {
            assert_eq!(g.topological_order().unwrap(), first);
        }
    }

    #[test]
    fn isolated_nodes_appear_in_order() {
        let mut g = DependencyGraph::from_edges([("a", "b")]);
        g.add_node("lonely");
        let order = g.topological_order().unwrap();
        assert_eq!(order.len(), 3);
        assert!(order.contains(&"lonely"));
    }

    #[test]
    fn cycle_is_detected() {
        let g = DependencyGraph::from_edges([("a", "b"), ("b", "c"), ("c", "a")]);
        assert_eq!(g.topological_order(), Err(GraphError::CycleDetected));
        assert_eq!(g.validate(), vec!["graph contains a cycle".to_string()]);
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let g = DependencyGraph::from_edges([("a", "a")]);
        assert!(g.has_cycle());
    }

    #[test]
    fn parallel_edges_collapse() {
        let g = DependencyGraph::from_edges([("a", "b"), ("a", "b")]);
        assert_eq!(g.predecessors(&"b"), vec!["a"]);
        assert!(g.topological_order().is_ok());
    }
}
