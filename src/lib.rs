//! Engineering calculation and verification engine.
//!
//! A project declares named scopes, each with a typed model of initial
//! values, plus calculations (derived values) and verifications (pass/fail
//! checks) over them. Declarations are lowered into a dependency graph of
//! per-leaf nodes, which the engine evaluates in deterministic topological
//! order. Results predicated on a failed "assumed" verification are kept but
//! flagged invalid, and the flag propagates to everything downstream.
//!
//! ```
//! use caliper_core::{
//!     build_graph_spec, evaluate_graph, model_initial_values, FunctionDecl, Path, ProjectDecl,
//!     ProjectPath, Ref, RecordValue, ScalarKind, TypeDescriptor, Value,
//! };
//!
//! let model = TypeDescriptor::record([("x", TypeDescriptor::Scalar(ScalarKind::Float))]);
//! let project = ProjectDecl::new("demo")
//!     .with_scope("Sys", model.clone())
//!     .with_function(
//!         FunctionDecl::calculation(
//!             "Sys",
//!             "double",
//!             TypeDescriptor::Scalar(ScalarKind::Float),
//!             |inputs| Ok(Value::Float(inputs.f64("x")? * 2.0)),
//!         )
//!         .with_param("x", Ref::parse("$.x")?),
//!     );
//!
//! let spec = build_graph_spec(&project)?;
//! let seed = model_initial_values(
//!     "Sys",
//!     &model,
//!     &Value::Record(RecordValue::new([("x", Value::Float(5.0))])),
//! )?;
//! let result = evaluate_graph(&spec, seed);
//! let doubled = ProjectPath::new("Sys", Path::parse("@double")?);
//! assert_eq!(result.get(&doubled), Some(&Value::Float(10.0)));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod eval;
pub mod external;
pub mod graph;
pub mod ir;
pub mod path;
pub mod schema;
pub mod value;

pub use eval::{
    build_scope_trees, evaluate_graph, model_initial_values, EvalError, EvaluationResult, Inputs,
    PathNode, ScopeTree, VALIDATION_SCOPE,
};
pub use external::{ChecksumOutcome, ChecksumReport, ExternalDataError, FileRef, ResolutionContext};
pub use graph::{DependencyGraph, GraphError};
pub use ir::{
    build_graph_spec, DeclarationError, FunctionDecl, FunctionIdentity, FunctionKind, GraphSpec,
    NodeKind, NodeMetadata, NodeSpec, ProjectDecl, Ref,
};
pub use path::{
    get_by_parts, hydrate, leaf_suffixes, HydrationError, KeyValue, Path, PathParseError, PathPart,
    PathParts, ProjectPath, RootSymbol,
};
pub use schema::{
    cartesian_keys, is_valid_verification_output, Domain, ScalarKind, TypeDescriptor,
};
pub use value::{RecordValue, TableValue, Value, ValueError};
