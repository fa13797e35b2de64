//! The evaluation engine: validate, seed, execute, then overlay validity.
//!
//! Evaluation never panics and never aborts early on a data problem: a
//! failing node is recorded and everything not downstream of it still runs.
//! Only a structurally broken graph (dangling dependency, cycle) stops
//! before any node executes.

use std::collections::{BTreeMap, HashSet};

use serde_json::json;
use thiserror::Error;
use tracing::{debug, trace};

use crate::eval::resolution::hydrate_inputs;
use crate::eval::validity::apply_validity;
use crate::ir::{GraphSpec, NodeKind};
use crate::path::{get_by_parts, leaf_suffixes, HydrationError, Path, ProjectPath};
use crate::value::Value;

/// Scope name under which structural problems are reported. No real scope
/// can collide with it; results carry it with empty values.
pub const VALIDATION_SCOPE: &str = "__validation__";

fn validation_path() -> ProjectPath {
    ProjectPath::new(VALIDATION_SCOPE, Path::model_root())
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("graph is not executable: {0}")]
    Structural(String),
    #[error("no initial value supplied for model leaf")]
    MissingInitialValue,
    #[error("dependency '{path}' has no stored value")]
    MissingDependency { path: ProjectPath },
    #[error("no type registered for '{path}'")]
    UnregisteredType { path: ProjectPath },
    #[error("computation failed: {0}")]
    Evaluation(String),
    #[error("could not hydrate parameter '{param}': {source}")]
    Hydration {
        param: String,
        source: HydrationError,
    },
    #[error("could not decompose computed result: {source}")]
    Decomposition { source: HydrationError },
}

/// Everything one evaluation run produced.
#[derive(Debug, Default)]
pub struct EvaluationResult {
    /// Leaf path -> stored value, totally ordered for stable reporting.
    pub values: BTreeMap<ProjectPath, Value>,
    /// Per-node failures in execution order.
    pub errors: Vec<(ProjectPath, EvalError)>,
    validity: BTreeMap<ProjectPath, bool>,
}

impl EvaluationResult {
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn get(&self, path: &ProjectPath) -> Option<&Value> {
        self.values.get(path)
    }

    /// Whether the value at `path` rests on assumptions that held. Paths
    /// never marked invalid (including unknown ones) are valid.
    pub fn is_valid(&self, path: &ProjectPath) -> bool {
        self.validity.get(path).copied().unwrap_or(true)
    }

    pub fn invalid_paths(&self) -> impl Iterator<Item = &ProjectPath> {
        self.validity.keys()
    }

    /// A stable JSON rendering for reports and fixtures.
    pub fn to_json(&self) -> serde_json::Value {
        let values: serde_json::Map<String, serde_json::Value> = self
            .values
            .iter()
            .map(|(path, value)| (path.to_string(), value.to_json()))
            .collect();
        let errors: Vec<serde_json::Value> = self
            .errors
            .iter()
            .map(|(path, error)| json!({ "path": path.to_string(), "error": error.to_string() }))
            .collect();
        let invalid: Vec<String> = self.validity.keys().map(ProjectPath::to_string).collect();
        json!({ "values": values, "errors": errors, "invalid": invalid })
    }

    pub(crate) fn set_validity(&mut self, validity: BTreeMap<ProjectPath, bool>) {
        self.validity = validity;
    }
}

/// Runs the graph over the supplied initial values.
///
/// 1. Structural validation; problems abort with empty values.
/// 2. Seed the state with the initial values.
/// 3. Execute nodes in deterministic topological order. Seeded nodes are
///    skipped, each function's closure runs at most once, failures are
///    recorded and execution continues.
/// 4. Overlay validity from failed assumptions.
pub fn evaluate_graph(
    spec: &GraphSpec,
    initial_values: BTreeMap<ProjectPath, Value>,
) -> EvaluationResult {
    let mut result = EvaluationResult::default();

    let problems = spec.validate();
    if !problems.is_empty() {
        result.errors = problems
            .into_iter()
            .map(|p| (validation_path(), EvalError::Structural(p)))
            .collect();
        return result;
    }

    let graph = spec.dependency_graph();
    let order = match graph.topological_order() {
        Ok(order) => order,
        Err(error) => {
            result
                .errors
                .push((validation_path(), EvalError::Structural(error.to_string())));
            return result;
        }
    };

    result.values = initial_values;
    let mut executed: HashSet<crate::ir::FunctionIdentity> = HashSet::new();

    for path in &order {
        if result.values.contains_key(path) {
            continue;
        }
        let Some(node) = spec.get(path) else {
            // Validation guarantees membership; an absent spec entry would
            // be a bug upstream, not a user data problem.
            continue;
        };
        if node.kind == NodeKind::Model {
            result
                .errors
                .push((path.clone(), EvalError::MissingInitialValue));
            continue;
        }
        let identity = node.function_identity();
        if executed.contains(&identity) {
            // The shared closure already ran (or already failed) for a
            // sibling leaf.
            continue;
        }
        executed.insert(identity);

        let Some(compute) = node.compute.as_ref() else {
            result.errors.push((
                path.clone(),
                EvalError::Evaluation("node has no compute function".to_string()),
            ));
            continue;
        };

        let inputs = match hydrate_inputs(&node.param_mapping, &result.values, spec) {
            Ok(inputs) => inputs,
            Err(error) => {
                result.errors.push((path.clone(), error));
                continue;
            }
        };

        trace!(node = %path, "executing");
        let output = match compute.as_ref()(&inputs) {
            Ok(output) => output,
            Err(message) => {
                result
                    .errors
                    .push((path.clone(), EvalError::Evaluation(message)));
                continue;
            }
        };

        // Fan the single result out across every leaf of the function.
        // Leaves are staged and committed all-or-nothing: a result that
        // does not match the declared output shape publishes nothing, so
        // downstream nodes see a missing dependency instead of a fragment.
        let root_type = node
            .metadata
            .root_output_type
            .as_ref()
            .unwrap_or(&node.output_type);
        let root_path = Path::new(path.path.root.clone(), []);
        let mut staged = Vec::new();
        let mut shape_mismatch = None;
        for suffix in leaf_suffixes(root_type) {
            match get_by_parts(&output, &suffix) {
                Ok(leaf) => staged.push((
                    ProjectPath::new(path.scope.clone(), root_path.join(&suffix)),
                    leaf.clone(),
                )),
                Err(source) => {
                    shape_mismatch = Some(source);
                    break;
                }
            }
        }
        match shape_mismatch {
            Some(source) => result
                .errors
                .push((path.clone(), EvalError::Decomposition { source })),
            None => result.values.extend(staged),
        }
    }

    let validity = apply_validity(spec, &graph, &order, &mut result.values);
    result.set_validity(validity);

    debug!(
        values = result.values.len(),
        errors = result.errors.len(),
        "evaluation finished"
    );
    result
}

/// Decomposes a whole-model value into the initial-value map the engine
/// seeds from.
pub fn model_initial_values(
    scope: &str,
    descriptor: &crate::schema::TypeDescriptor,
    value: &Value,
) -> Result<BTreeMap<ProjectPath, Value>, HydrationError> {
    let mut values = BTreeMap::new();
    for suffix in leaf_suffixes(descriptor) {
        let leaf = get_by_parts(value, &suffix)?;
        values.insert(
            ProjectPath::new(scope, Path::model_root().join(&suffix)),
            leaf.clone(),
        );
    }
    Ok(values)
}
