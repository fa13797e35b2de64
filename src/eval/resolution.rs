//! Parameter hydration: assembling the argument values a compute closure
//! sees from the leaf values stored in the evaluation state.

use std::collections::{BTreeMap, HashMap};

use indexmap::IndexMap;

use crate::eval::engine::EvalError;
use crate::ir::GraphSpec;
use crate::path::{hydrate, PathParts, ProjectPath};
use crate::external::FileRef;
use crate::value::{RecordValue, TableValue, Value};

/// The named, fully hydrated arguments of one compute invocation.
///
/// Typed accessors return `Err(String)` on absence or shape mismatch so a
/// closure body can stay a chain of `?`s.
#[derive(Debug, Clone, Default)]
pub struct Inputs {
    values: IndexMap<String, Value>,
}

impl Inputs {
    pub(crate) fn new(values: IndexMap<String, Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, name: &str) -> Result<&Value, String> {
        self.values
            .get(name)
            .ok_or_else(|| format!("no parameter named '{name}'"))
    }

    pub fn bool(&self, name: &str) -> Result<bool, String> {
        let value = self.get(name)?;
        value
            .as_bool()
            .ok_or_else(|| mismatch(name, "bool", value))
    }

    pub fn i64(&self, name: &str) -> Result<i64, String> {
        let value = self.get(name)?;
        value.as_i64().ok_or_else(|| mismatch(name, "int", value))
    }

    pub fn f64(&self, name: &str) -> Result<f64, String> {
        let value = self.get(name)?;
        value
            .as_f64()
            .ok_or_else(|| mismatch(name, "float", value))
    }

    pub fn str(&self, name: &str) -> Result<&str, String> {
        let value = self.get(name)?;
        value.as_str().ok_or_else(|| mismatch(name, "str", value))
    }

    pub fn record(&self, name: &str) -> Result<&RecordValue, String> {
        let value = self.get(name)?;
        value
            .as_record()
            .ok_or_else(|| mismatch(name, "record", value))
    }

    pub fn table(&self, name: &str) -> Result<&TableValue, String> {
        let value = self.get(name)?;
        value
            .as_table()
            .ok_or_else(|| mismatch(name, "table", value))
    }

    pub fn external(&self, name: &str) -> Result<&FileRef, String> {
        let value = self.get(name)?;
        value
            .as_external()
            .ok_or_else(|| mismatch(name, "external", value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn mismatch(name: &str, expected: &str, value: &Value) -> String {
    format!(
        "parameter '{name}' expected {expected}, found {}",
        value.type_name()
    )
}

/// Hydrates every parameter of a node from stored leaf values.
///
/// For each reference, the registered type is decomposed into leaf suffixes,
/// the corresponding stored values are gathered, and the full value is
/// recomposed in the declared shape. A missing stored leaf is reported
/// against its exact path.
pub fn hydrate_inputs(
    param_mapping: &IndexMap<String, ProjectPath>,
    values: &BTreeMap<ProjectPath, Value>,
    spec: &GraphSpec,
) -> Result<Inputs, EvalError> {
    let mut hydrated: IndexMap<String, Value> = IndexMap::with_capacity(param_mapping.len());
    for (param, reference) in param_mapping {
        let descriptor = spec
            .get_type(reference)
            .ok_or_else(|| EvalError::UnregisteredType {
                path: reference.clone(),
            })?;
        let mut leaves: HashMap<PathParts, Value> = HashMap::new();
        for suffix in crate::path::leaf_suffixes(descriptor) {
            let leaf_path = ProjectPath::new(
                reference.scope.clone(),
                reference.path.join(&suffix),
            );
            match values.get(&leaf_path) {
                Some(value) => {
                    leaves.insert(suffix, value.clone());
                }
                None => {
                    return Err(EvalError::MissingDependency { path: leaf_path });
                }
            }
        }
        let value = hydrate(descriptor, &leaves).map_err(|source| EvalError::Hydration {
            param: param.clone(),
            source,
        })?;
        hydrated.insert(param.clone(), value);
    }
    Ok(Inputs::new(hydrated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{build_graph_spec, FunctionDecl, ProjectDecl, Ref};
    use crate::path::Path;
    use crate::schema::{ScalarKind, TypeDescriptor};

    #[test]
    fn typed_accessors_report_mismatches() {
        let inputs = Inputs::new(
            [
                ("x".to_string(), Value::Float(1.5)),
                ("n".to_string(), Value::Int(3)),
                ("ok".to_string(), Value::Bool(true)),
            ]
            .into_iter()
            .collect(),
        );
        assert_eq!(inputs.f64("x").unwrap(), 1.5);
        assert_eq!(inputs.f64("n").unwrap(), 3.0);
        assert!(inputs.bool("ok").unwrap());
        assert!(inputs.bool("x").unwrap_err().contains("expected bool"));
        assert!(inputs.f64("missing").unwrap_err().contains("missing"));
    }

    #[test]
    fn hydrates_record_parameter_from_leaves() {
        let root = TypeDescriptor::record([
            ("x", TypeDescriptor::Scalar(ScalarKind::Float)),
            ("y", TypeDescriptor::Scalar(ScalarKind::Float)),
        ]);
        let project = ProjectDecl::new("demo")
            .with_scope("Sys", root)
            .with_function(
                FunctionDecl::calculation(
                    "Sys",
                    "sum",
                    TypeDescriptor::Scalar(ScalarKind::Float),
                    |_| Err("unused".into()),
                )
                .with_param("model", Ref::parse("$").unwrap()),
            );
        let spec = build_graph_spec(&project).unwrap();

        let mut values = BTreeMap::new();
        values.insert(
            ProjectPath::new("Sys", Path::parse("$.x").unwrap()),
            Value::Float(1.0),
        );
        values.insert(
            ProjectPath::new("Sys", Path::parse("$.y").unwrap()),
            Value::Float(2.0),
        );

        let node = spec
            .get(&ProjectPath::new("Sys", Path::parse("@sum").unwrap()))
            .unwrap();
        let inputs = hydrate_inputs(&node.param_mapping, &values, &spec).unwrap();
        let model = inputs.record("model").unwrap();
        assert_eq!(model.get("x"), Some(&Value::Float(1.0)));
        assert_eq!(model.get("y"), Some(&Value::Float(2.0)));
    }

    #[test]
    fn missing_leaf_is_reported_with_its_path() {
        let root = TypeDescriptor::record([("x", TypeDescriptor::Scalar(ScalarKind::Float))]);
        let project = ProjectDecl::new("demo")
            .with_scope("Sys", root)
            .with_function(
                FunctionDecl::calculation(
                    "Sys",
                    "c",
                    TypeDescriptor::Scalar(ScalarKind::Float),
                    |_| Err("unused".into()),
                )
                .with_param("x", Ref::parse("$.x").unwrap()),
            );
        let spec = build_graph_spec(&project).unwrap();
        let node = spec
            .get(&ProjectPath::new("Sys", Path::parse("@c").unwrap()))
            .unwrap();
        let err = hydrate_inputs(&node.param_mapping, &BTreeMap::new(), &spec).unwrap_err();
        match err {
            EvalError::MissingDependency { path } => {
                assert_eq!(path.to_string(), "Sys::$.x");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
