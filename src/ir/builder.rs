//! Declaration-to-graph lowering.
//!
//! All declaration-time validation lives here: every problem a set of
//! declarations can have is reported as a [`DeclarationError`] before any
//! node is evaluated. Run-time data problems (missing values, failing
//! computations) are the engine's concern, not the builder's.

use std::collections::{BTreeSet, HashMap};

use indexmap::IndexMap;
use thiserror::Error;
use tracing::debug;

use crate::ir::decl::{FunctionDecl, FunctionKind, ProjectDecl, Ref};
use crate::ir::graph_spec::GraphSpec;
use crate::ir::node_spec::{NodeKind, NodeMetadata, NodeSpec};
use crate::path::{leaf_suffixes, Path, ProjectPath, RootSymbol};
use crate::schema::{is_valid_verification_output, TypeDescriptor};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeclarationError {
    #[error("scope '{scope}' is declared more than once")]
    DuplicateScope { scope: String },
    #[error("function '{function}' references undeclared scope '{scope}'")]
    UnknownScope { function: String, scope: String },
    #[error("duplicate declaration of '{identity}'")]
    DuplicateFunction { identity: String },
    #[error("function '{function}' references scope '{scope}' without importing it")]
    ScopeNotImported { function: String, scope: String },
    #[error("parameter '{param}' of '{function}' references verification output '{path}'; verification results feed validity, not data")]
    VerificationParam {
        function: String,
        param: String,
        path: String,
    },
    #[error("parameter '{param}' of '{function}' references unknown path '{path}'")]
    UnknownPath {
        function: String,
        param: String,
        path: String,
    },
    #[error("verification '{function}' must output Bool or a table of Bool, found '{found}'")]
    InvalidVerificationOutput { function: String, found: String },
    #[error("domain '{domain}' in '{context}' has no members")]
    EmptyDomain { domain: String, context: String },
    #[error("'{function}' assumes '{reference}', which is not a bare verification root")]
    InvalidAssumption {
        function: String,
        reference: String,
    },
    #[error("'{function}' assumes undeclared verification '{path}'")]
    UnknownVerification { function: String, path: String },
}

/// Lowers declarations into the executable [`GraphSpec`].
///
/// Declaration order is preserved: model nodes come first (scope by scope),
/// then each function's leaves in output declaration order. This order seeds
/// the deterministic topological sort downstream.
pub fn build_graph_spec(project: &ProjectDecl) -> Result<GraphSpec, DeclarationError> {
    let mut nodes: IndexMap<ProjectPath, NodeSpec> = IndexMap::new();
    let mut registry: HashMap<ProjectPath, TypeDescriptor> = HashMap::new();

    // 1. Scope schemas: reject duplicate names and empty domains, emit one
    //    model node per leaf, register leaf types plus the whole-model root.
    let mut scopes: IndexMap<String, TypeDescriptor> = IndexMap::new();
    for (name, root) in &project.scopes {
        if scopes.insert(name.clone(), root.clone()).is_some() {
            return Err(DeclarationError::DuplicateScope {
                scope: name.clone(),
            });
        }
    }
    for (scope, root) in &scopes {
        check_domains(&format!("scope '{scope}'"), root)?;
        registry.insert(ProjectPath::new(scope, Path::model_root()), root.clone());
        for suffix in leaf_suffixes(root) {
            let id = ProjectPath::new(scope, Path::model_root().join(&suffix));
            let leaf_type = root
                .descend(&suffix)
                .cloned()
                .unwrap_or_else(|| root.clone());
            registry.insert(id.clone(), leaf_type.clone());
            nodes.insert(
                id.clone(),
                NodeSpec {
                    id,
                    kind: NodeKind::Model,
                    dependencies: BTreeSet::new(),
                    output_type: leaf_type,
                    compute: None,
                    param_mapping: IndexMap::new(),
                    metadata: NodeMetadata::default(),
                },
            );
        }
    }

    // 2. Index functions by identity; duplicates are fatal. Calculations and
    //    verifications are separate namespaces.
    let mut index: HashMap<(String, FunctionKind, String), &FunctionDecl> = HashMap::new();
    for function in &project.functions {
        if !scopes.contains_key(&function.scope) {
            return Err(DeclarationError::UnknownScope {
                function: identity_of(function),
                scope: function.scope.clone(),
            });
        }
        let key = (
            function.scope.clone(),
            function.kind,
            function.name.clone(),
        );
        if index.insert(key, function).is_some() {
            return Err(DeclarationError::DuplicateFunction {
                identity: identity_of(function),
            });
        }
    }

    // 3. Lower each function: validate its output shape, resolve parameter
    //    references to leaf-level dependencies, then emit one node per
    //    output leaf.
    for function in &project.functions {
        let identity = identity_of(function);
        check_domains(&format!("output of '{identity}'"), &function.output)?;
        if function.kind == FunctionKind::Verification
            && !is_valid_verification_output(&function.output)
        {
            return Err(DeclarationError::InvalidVerificationOutput {
                function: identity,
                found: function.output.to_string(),
            });
        }

        let mut dependencies: BTreeSet<ProjectPath> = BTreeSet::new();
        let mut param_mapping: IndexMap<String, ProjectPath> = IndexMap::new();
        for (param, reference) in &function.params {
            let (ppath, param_type) =
                resolve_param(&scopes, &index, function, param, reference)?;
            for suffix in leaf_suffixes(&param_type) {
                dependencies.insert(ProjectPath::new(
                    ppath.scope.clone(),
                    ppath.path.join(&suffix),
                ));
            }
            registry.insert(ppath.clone(), param_type);
            param_mapping.insert(param.clone(), ppath);
        }

        let assumed_verifications = resolve_assumptions(&index, function)?;

        let root = match function.kind {
            FunctionKind::Calculation => Path::calculation(&function.name),
            FunctionKind::Verification => Path::verification(&function.name),
        };
        let kind = match function.kind {
            FunctionKind::Calculation => NodeKind::Calculation,
            FunctionKind::Verification => NodeKind::Verification,
        };
        registry.insert(
            ProjectPath::new(&function.scope, root.clone()),
            function.output.clone(),
        );
        for suffix in leaf_suffixes(&function.output) {
            let id = ProjectPath::new(&function.scope, root.join(&suffix));
            let leaf_type = function
                .output
                .descend(&suffix)
                .cloned()
                .unwrap_or_else(|| function.output.clone());
            registry.insert(id.clone(), leaf_type.clone());
            nodes.insert(
                id.clone(),
                NodeSpec {
                    id,
                    kind,
                    dependencies: dependencies.clone(),
                    output_type: leaf_type,
                    compute: Some(function.compute.clone()),
                    param_mapping: param_mapping.clone(),
                    metadata: NodeMetadata {
                        root_output_type: Some(function.output.clone()),
                        assumed_verifications: assumed_verifications.clone(),
                        expected_failure: function.expected_failure,
                    },
                },
            );
        }
    }

    debug!(
        project = %project.name,
        scopes = scopes.len(),
        functions = project.functions.len(),
        nodes = nodes.len(),
        "built graph spec"
    );

    let scope_names = scopes.keys().cloned().collect();
    Ok(GraphSpec::new(nodes, scope_names, registry))
}

fn identity_of(function: &FunctionDecl) -> String {
    format!("{}::{}", function.scope, function.name)
}

/// Rejects any domain with no members anywhere in the descriptor tree; a
/// table over an empty domain has no addressable cells.
fn check_domains(context: &str, descriptor: &TypeDescriptor) -> Result<(), DeclarationError> {
    match descriptor {
        TypeDescriptor::Scalar(_) | TypeDescriptor::External => Ok(()),
        TypeDescriptor::Record(fields) => {
            for field in fields.values() {
                check_domains(context, field)?;
            }
            Ok(())
        }
        TypeDescriptor::Table { domains, value } => {
            for domain in domains {
                if domain.is_empty() {
                    return Err(DeclarationError::EmptyDomain {
                        domain: domain.name().to_string(),
                        context: context.to_string(),
                    });
                }
            }
            check_domains(context, value)
        }
    }
}

/// Resolves one parameter reference to its absolute path and declared type.
fn resolve_param(
    scopes: &IndexMap<String, TypeDescriptor>,
    index: &HashMap<(String, FunctionKind, String), &FunctionDecl>,
    function: &FunctionDecl,
    param: &str,
    reference: &Ref,
) -> Result<(ProjectPath, TypeDescriptor), DeclarationError> {
    let identity = identity_of(function);
    let target_scope = reference.scope.as_deref().unwrap_or(&function.scope);

    if !scopes.contains_key(target_scope) {
        return Err(DeclarationError::UnknownScope {
            function: identity,
            scope: target_scope.to_string(),
        });
    }
    if target_scope != function.scope && !function.imports.contains(target_scope) {
        return Err(DeclarationError::ScopeNotImported {
            function: identity,
            scope: target_scope.to_string(),
        });
    }

    let unknown = || DeclarationError::UnknownPath {
        function: identity_of(function),
        param: param.to_string(),
        path: format!("{}::{}", target_scope, reference.path),
    };

    let root_type = match &reference.path.root {
        RootSymbol::Model => scopes.get(target_scope).ok_or_else(unknown)?,
        RootSymbol::Calculation(name) => {
            let key = (
                target_scope.to_string(),
                FunctionKind::Calculation,
                name.clone(),
            );
            &index.get(&key).ok_or_else(unknown)?.output
        }
        RootSymbol::Verification(_) => {
            return Err(DeclarationError::VerificationParam {
                function: identity,
                param: param.to_string(),
                path: format!("{}::{}", target_scope, reference.path),
            });
        }
    };
    let param_type = root_type
        .descend(&reference.path.parts)
        .cloned()
        .ok_or_else(unknown)?;

    Ok((
        ProjectPath::new(target_scope, reference.path.clone()),
        param_type,
    ))
}

/// Resolves assumption references to bare verification root paths.
fn resolve_assumptions(
    index: &HashMap<(String, FunctionKind, String), &FunctionDecl>,
    function: &FunctionDecl,
) -> Result<Vec<ProjectPath>, DeclarationError> {
    let mut resolved = Vec::with_capacity(function.assumes.len());
    for reference in &function.assumes {
        let target_scope = reference.scope.as_deref().unwrap_or(&function.scope);
        let name = match &reference.path.root {
            RootSymbol::Verification(name) if reference.path.parts.is_empty() => name,
            _ => {
                return Err(DeclarationError::InvalidAssumption {
                    function: identity_of(function),
                    reference: reference.to_string(),
                });
            }
        };
        let key = (
            target_scope.to_string(),
            FunctionKind::Verification,
            name.clone(),
        );
        if !index.contains_key(&key) {
            return Err(DeclarationError::UnknownVerification {
                function: identity_of(function),
                path: format!("{}::?{}", target_scope, name),
            });
        }
        resolved.push(ProjectPath::new(target_scope, Path::verification(name)));
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Domain, ScalarKind};
    use crate::value::Value;
    use std::sync::Arc;

    fn float() -> TypeDescriptor {
        TypeDescriptor::Scalar(ScalarKind::Float)
    }

    fn boolean() -> TypeDescriptor {
        TypeDescriptor::Scalar(ScalarKind::Bool)
    }

    fn pp(scope: &str, path: &str) -> ProjectPath {
        ProjectPath::new(scope, Path::parse(path).unwrap())
    }

    fn basic_project() -> ProjectDecl {
        ProjectDecl::new("demo")
            .with_scope("Sys", TypeDescriptor::record([("x", float())]))
            .with_function(
                FunctionDecl::calculation("Sys", "double", float(), |inputs| {
                    Ok(Value::Float(inputs.f64("x")? * 2.0))
                })
                .with_param("x", Ref::parse("$.x").unwrap()),
            )
            .with_function(
                FunctionDecl::verification("Sys", "positive", boolean(), |inputs| {
                    Ok(Value::Bool(inputs.f64("doubled")? > 0.0))
                })
                .with_param("doubled", Ref::parse("@double").unwrap()),
            )
    }

    #[test]
    fn builds_nodes_and_dependencies() {
        let spec = build_graph_spec(&basic_project()).unwrap();
        assert_eq!(spec.len(), 3);

        let double = spec.get(&pp("Sys", "@double")).unwrap();
        assert_eq!(double.kind, NodeKind::Calculation);
        assert_eq!(
            double.dependencies.iter().cloned().collect::<Vec<_>>(),
            vec![pp("Sys", "$.x")]
        );

        let positive = spec.get(&pp("Sys", "?positive")).unwrap();
        assert_eq!(positive.kind, NodeKind::Verification);
        assert!(positive.dependencies.contains(&pp("Sys", "@double")));
    }

    #[test]
    fn registry_covers_parameter_references() {
        let spec = build_graph_spec(&basic_project()).unwrap();
        assert_eq!(spec.get_type(&pp("Sys", "$.x")), Some(&float()));
        assert_eq!(spec.get_type(&pp("Sys", "@double")), Some(&float()));
        assert_eq!(
            spec.get_type(&pp("Sys", "$")),
            Some(&TypeDescriptor::record([("x", float())]))
        );
    }

    #[test]
    fn table_output_fans_out_into_leaves() {
        let mode = Arc::new(Domain::new("Mode", ["nominal", "safe"]));
        let project = ProjectDecl::new("demo")
            .with_scope("Sys", TypeDescriptor::record([("x", float())]))
            .with_function(
                FunctionDecl::calculation(
                    "Sys",
                    "loads",
                    TypeDescriptor::table([mode], float()),
                    |_| Err("unused".into()),
                )
                .with_param("x", Ref::parse("$.x").unwrap()),
            );
        let spec = build_graph_spec(&project).unwrap();
        // $.x + @loads container + two cells
        assert_eq!(spec.len(), 4);
        assert!(spec.contains(&pp("Sys", "@loads")));
        assert!(spec.contains(&pp("Sys", "@loads[nominal]")));
        assert!(spec.contains(&pp("Sys", "@loads[safe]")));
        // All leaves of one function share dependencies and compute.
        let container = spec.get(&pp("Sys", "@loads")).unwrap();
        let cell = spec.get(&pp("Sys", "@loads[safe]")).unwrap();
        assert_eq!(container.dependencies, cell.dependencies);
        assert_eq!(container.function_identity(), cell.function_identity());
    }

    #[test]
    fn cross_scope_reference_requires_import() {
        let project = ProjectDecl::new("demo")
            .with_scope("A", TypeDescriptor::record([("x", float())]))
            .with_scope("B", TypeDescriptor::record([("y", float())]))
            .with_function(
                FunctionDecl::calculation("B", "uses_a", float(), |_| Err("unused".into()))
                    .with_param("x", Ref::parse("$.x").unwrap().in_scope("A")),
            );
        assert!(matches!(
            build_graph_spec(&project),
            Err(DeclarationError::ScopeNotImported { .. })
        ));

        let imported = ProjectDecl::new("demo")
            .with_scope("A", TypeDescriptor::record([("x", float())]))
            .with_scope("B", TypeDescriptor::record([("y", float())]))
            .with_function(
                FunctionDecl::calculation("B", "uses_a", float(), |_| Err("unused".into()))
                    .with_import("A")
                    .with_param("x", Ref::parse("$.x").unwrap().in_scope("A")),
            );
        let spec = build_graph_spec(&imported).unwrap();
        let node = spec.get(&pp("B", "@uses_a")).unwrap();
        assert!(node.dependencies.contains(&pp("A", "$.x")));
    }

    #[test]
    fn rejects_unknown_scope_and_path() {
        let project = ProjectDecl::new("demo").with_function(FunctionDecl::calculation(
            "Ghost",
            "c",
            float(),
            |_| Err("unused".into()),
        ));
        assert!(matches!(
            build_graph_spec(&project),
            Err(DeclarationError::UnknownScope { .. })
        ));

        let bad_path = ProjectDecl::new("demo")
            .with_scope("Sys", TypeDescriptor::record([("x", float())]))
            .with_function(
                FunctionDecl::calculation("Sys", "c", float(), |_| Err("unused".into()))
                    .with_param("y", Ref::parse("$.y").unwrap()),
            );
        assert!(matches!(
            build_graph_spec(&bad_path),
            Err(DeclarationError::UnknownPath { .. })
        ));
    }

    #[test]
    fn rejects_verification_parameter_reference() {
        let project = ProjectDecl::new("demo")
            .with_scope("Sys", TypeDescriptor::record([("x", float())]))
            .with_function(FunctionDecl::verification("Sys", "ok", boolean(), |_| {
                Ok(Value::Bool(true))
            }))
            .with_function(
                FunctionDecl::calculation("Sys", "c", float(), |_| Err("unused".into()))
                    .with_param("flag", Ref::parse("?ok").unwrap()),
            );
        assert!(matches!(
            build_graph_spec(&project),
            Err(DeclarationError::VerificationParam { .. })
        ));
    }

    #[test]
    fn rejects_bad_verification_output() {
        let project = ProjectDecl::new("demo")
            .with_scope("Sys", TypeDescriptor::record([("x", float())]))
            .with_function(FunctionDecl::verification("Sys", "bad", float(), |_| {
                Err("unused".into())
            }));
        assert!(matches!(
            build_graph_spec(&project),
            Err(DeclarationError::InvalidVerificationOutput { .. })
        ));
    }

    #[test]
    fn rejects_empty_domain() {
        let empty = Arc::new(Domain::new("Empty", Vec::<String>::new()));
        let project = ProjectDecl::new("demo").with_scope(
            "Sys",
            TypeDescriptor::record([("t", TypeDescriptor::table([empty], float()))]),
        );
        assert!(matches!(
            build_graph_spec(&project),
            Err(DeclarationError::EmptyDomain { .. })
        ));
    }

    #[test]
    fn rejects_duplicate_scope() {
        let project = ProjectDecl::new("demo")
            .with_scope("Sys", TypeDescriptor::record([("x", float())]))
            .with_scope("Sys", TypeDescriptor::record([("y", float())]));
        assert!(matches!(
            build_graph_spec(&project),
            Err(DeclarationError::DuplicateScope { scope }) if scope == "Sys"
        ));
    }

    #[test]
    fn rejects_duplicate_function() {
        let project = ProjectDecl::new("demo")
            .with_scope("Sys", TypeDescriptor::record([("x", float())]))
            .with_function(FunctionDecl::calculation("Sys", "c", float(), |_| {
                Err("unused".into())
            }))
            .with_function(FunctionDecl::calculation("Sys", "c", float(), |_| {
                Err("unused".into())
            }));
        assert!(matches!(
            build_graph_spec(&project),
            Err(DeclarationError::DuplicateFunction { .. })
        ));
    }

    #[test]
    fn resolves_assumptions_to_verification_roots() {
        let project = ProjectDecl::new("demo")
            .with_scope("Sys", TypeDescriptor::record([("x", float())]))
            .with_function(FunctionDecl::verification("Sys", "ok", boolean(), |_| {
                Ok(Value::Bool(true))
            }))
            .with_function(
                FunctionDecl::calculation("Sys", "c", float(), |_| Err("unused".into()))
                    .assuming(Ref::parse("?ok").unwrap()),
            );
        let spec = build_graph_spec(&project).unwrap();
        let node = spec.get(&pp("Sys", "@c")).unwrap();
        assert_eq!(
            node.metadata.assumed_verifications,
            vec![pp("Sys", "?ok")]
        );
        // Assumptions are not data dependencies.
        assert!(node.dependencies.is_empty());
    }

    #[test]
    fn rejects_malformed_or_unknown_assumptions() {
        let not_bare = ProjectDecl::new("demo")
            .with_scope("Sys", TypeDescriptor::record([("x", float())]))
            .with_function(
                FunctionDecl::calculation("Sys", "c", float(), |_| Err("unused".into()))
                    .assuming(Ref::parse("$.x").unwrap()),
            );
        assert!(matches!(
            build_graph_spec(&not_bare),
            Err(DeclarationError::InvalidAssumption { .. })
        ));

        let unknown = ProjectDecl::new("demo")
            .with_scope("Sys", TypeDescriptor::record([("x", float())]))
            .with_function(
                FunctionDecl::calculation("Sys", "c", float(), |_| Err("unused".into()))
                    .assuming(Ref::parse("?ghost").unwrap()),
            );
        assert!(matches!(
            build_graph_spec(&unknown),
            Err(DeclarationError::UnknownVerification { .. })
        ));
    }
}
