//! The validity overlay: results predicated on a failed assumption are
//! kept, but flagged.
//!
//! An assumption names a verification root; it holds when every stored
//! pass/fail leaf under that root is `true`. Leaves that were never stored
//! (the verification itself errored) do not count against it. Invalidity
//! taints the assuming function's own leaves and then flows along data
//! edges to everything downstream. Calculations keep their numeric values
//! when invalid; verification pass/fail leaves are forced to `false` so a
//! report can never show a green check resting on a broken premise.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::debug;

use crate::graph::DependencyGraph;
use crate::ir::{GraphSpec, NodeKind};
use crate::path::ProjectPath;
use crate::value::Value;

pub(crate) fn apply_validity(
    spec: &GraphSpec,
    graph: &DependencyGraph<ProjectPath>,
    order: &[ProjectPath],
    values: &mut BTreeMap<ProjectPath, Value>,
) -> BTreeMap<ProjectPath, bool> {
    let mut invalid: BTreeSet<ProjectPath> = BTreeSet::new();

    // 1. Seed from failed assumptions.
    let mut holds_cache: HashMap<ProjectPath, bool> = HashMap::new();
    for node in spec.nodes() {
        if node.metadata.assumed_verifications.is_empty() {
            continue;
        }
        let broken = node.metadata.assumed_verifications.iter().any(|assumed| {
            let holds = *holds_cache
                .entry(assumed.clone())
                .or_insert_with(|| assumption_holds(assumed, values));
            !holds
        });
        if broken {
            invalid.insert(node.id.clone());
        }
    }

    // 2. Propagate along data edges; topological order makes one pass
    //    sufficient.
    for path in order {
        if invalid.contains(path) {
            continue;
        }
        if graph
            .predecessors(path)
            .iter()
            .any(|dependency| invalid.contains(dependency))
        {
            invalid.insert(path.clone());
        }
    }

    // 3. Force invalid verification pass/fail leaves to false. Container
    //    entries and calculation values are left as computed.
    for path in &invalid {
        let is_verification = spec
            .get(path)
            .map(|node| node.kind == NodeKind::Verification)
            .unwrap_or(false);
        if !is_verification {
            continue;
        }
        if let Some(value @ Value::Bool(_)) = values.get_mut(path) {
            *value = Value::Bool(false);
        }
    }

    if !invalid.is_empty() {
        debug!(count = invalid.len(), "marked nodes invalid");
    }

    invalid.into_iter().map(|path| (path, false)).collect()
}

/// Every stored scalar pass/fail leaf under the verification root must be
/// `true`. Vacuously holds when nothing is stored.
fn assumption_holds(assumed: &ProjectPath, values: &BTreeMap<ProjectPath, Value>) -> bool {
    values
        .iter()
        .filter(|(path, _)| path.scope == assumed.scope && path.path.root == assumed.path.root)
        .all(|(_, value)| !matches!(value, Value::Bool(false)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::Path;

    fn pp(scope: &str, path: &str) -> ProjectPath {
        ProjectPath::new(scope, Path::parse(path).unwrap())
    }

    #[test]
    fn assumption_holds_over_scalar_leaves_only() {
        let mut values = BTreeMap::new();
        values.insert(pp("Sys", "?limits[a]"), Value::Bool(true));
        values.insert(pp("Sys", "?limits[b]"), Value::Bool(true));
        assert!(assumption_holds(&pp("Sys", "?limits"), &values));

        values.insert(pp("Sys", "?limits[b]"), Value::Bool(false));
        assert!(!assumption_holds(&pp("Sys", "?limits"), &values));
    }

    #[test]
    fn assumption_holds_vacuously_when_nothing_stored() {
        let values = BTreeMap::new();
        assert!(assumption_holds(&pp("Sys", "?never_ran"), &values));
    }

    #[test]
    fn unrelated_roots_do_not_affect_assumption() {
        let mut values = BTreeMap::new();
        values.insert(pp("Sys", "?other"), Value::Bool(false));
        values.insert(pp("Other", "?limits"), Value::Bool(false));
        assert!(assumption_holds(&pp("Sys", "?limits"), &values));
    }
}
