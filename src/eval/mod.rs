//! Graph evaluation: execution, hydration, validity, result views.

mod engine;
mod resolution;
mod tree;
mod validity;

pub use engine::{
    evaluate_graph, model_initial_values, EvalError, EvaluationResult, VALIDATION_SCOPE,
};
pub use resolution::{hydrate_inputs, Inputs};
pub use tree::{build_scope_trees, PathNode, ScopeTree};
