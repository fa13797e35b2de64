//! Hierarchical views over flat result maps.
//!
//! Reporting wants results grouped scope by scope, with each model,
//! calculation and verification rendered as a tree that follows the path
//! structure. Values live only at the leaves; a container node whose cells
//! are present individually carries no duplicate value of its own.

use std::collections::BTreeMap;

use indexmap::IndexMap;

use crate::path::{PathPart, PathParts, ProjectPath, RootSymbol};
use crate::value::Value;

use super::engine::VALIDATION_SCOPE;

/// One node of a per-root result tree.
#[derive(Debug, Clone, PartialEq)]
pub struct PathNode {
    pub path: ProjectPath,
    /// Present at leaves only.
    pub value: Option<Value>,
    pub children: Vec<PathNode>,
}

impl PathNode {
    /// The label to render: the last path part, or the root symbol for the
    /// tree's top node.
    pub fn label(&self) -> String {
        match self.path.path.parts.last() {
            Some(part) => part.to_string(),
            None => self.path.path.root.to_string(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// All results of one scope, grouped by root kind.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeTree {
    pub scope: String,
    pub model: Option<PathNode>,
    pub calculations: Vec<PathNode>,
    pub verifications: Vec<PathNode>,
}

/// Groups a flat result map into per-scope trees, in scope name order.
/// The structural-error sentinel scope is never included.
pub fn build_scope_trees(values: &BTreeMap<ProjectPath, Value>) -> Vec<ScopeTree> {
    // BTreeMap order is scope, then root, then parts; one pass groups it.
    let mut by_scope: IndexMap<&str, IndexMap<&RootSymbol, Vec<(&PathParts, &Value)>>> =
        IndexMap::new();
    for (path, value) in values {
        if path.scope == VALIDATION_SCOPE {
            continue;
        }
        by_scope
            .entry(path.scope.as_str())
            .or_default()
            .entry(&path.path.root)
            .or_default()
            .push((&path.path.parts, value));
    }

    let mut trees = Vec::with_capacity(by_scope.len());
    for (scope, roots) in by_scope {
        let mut tree = ScopeTree {
            scope: scope.to_string(),
            model: None,
            calculations: Vec::new(),
            verifications: Vec::new(),
        };
        for (root, entries) in roots {
            let node = build_node(scope, root, PathParts::new(), &entries);
            match root {
                RootSymbol::Model => tree.model = Some(node),
                RootSymbol::Calculation(_) => tree.calculations.push(node),
                RootSymbol::Verification(_) => tree.verifications.push(node),
            }
        }
        trees.push(tree);
    }
    trees
}

fn build_node(
    scope: &str,
    root: &RootSymbol,
    prefix: PathParts,
    entries: &[(&PathParts, &Value)],
) -> PathNode {
    let depth = prefix.len();
    let exact = entries
        .iter()
        .find(|(parts, _)| parts.len() == depth)
        .map(|(_, value)| (*value).clone());

    let mut groups: IndexMap<&PathPart, Vec<(&PathParts, &Value)>> = IndexMap::new();
    for &(parts, value) in entries {
        if parts.len() > depth {
            groups.entry(&parts[depth]).or_default().push((parts, value));
        }
    }

    let path = ProjectPath::new(
        scope,
        crate::path::Path::new(root.clone(), prefix.iter().cloned()),
    );
    if groups.is_empty() {
        return PathNode {
            path,
            value: exact,
            children: Vec::new(),
        };
    }

    let children = groups
        .into_iter()
        .map(|(part, sub)| {
            let mut child_prefix = prefix.clone();
            child_prefix.push(part.clone());
            build_node(scope, root, child_prefix, &sub)
        })
        .collect();
    PathNode {
        path,
        // Whole-container values are redundant with the per-cell children.
        value: None,
        children,
    }
}
