//! Leaf decomposition of a schema tree into path-part suffixes.

use crate::path::{PathPart, PathParts};
use crate::schema::{cartesian_keys, TypeDescriptor};

/// Every addressable leaf suffix of `descriptor`, in a fixed order: scalars
/// and externals yield the empty suffix, records recurse per field in
/// declaration order, tables yield the whole-container suffix first (some
/// producers store the container as one value) and then every cartesian
/// product key, recursing into the cell type.
///
/// Pure function of the descriptor; the result is finite and stable.
pub fn leaf_suffixes(descriptor: &TypeDescriptor) -> Vec<PathParts> {
    let mut out = Vec::new();
    let mut prefix = PathParts::new();
    collect(descriptor, &mut prefix, &mut out);
    out
}

fn collect(descriptor: &TypeDescriptor, prefix: &mut PathParts, out: &mut Vec<PathParts>) {
    match descriptor {
        TypeDescriptor::Scalar(_) | TypeDescriptor::External => out.push(prefix.clone()),
        TypeDescriptor::Record(fields) => {
            for (name, field_descriptor) in fields {
                prefix.push(PathPart::Attribute(name.clone()));
                collect(field_descriptor, prefix, out);
                prefix.pop();
            }
        }
        TypeDescriptor::Table { domains, value } => {
            // The container itself is addressable as one unit.
            out.push(prefix.clone());
            for key in cartesian_keys(domains) {
                prefix.push(PathPart::Item(key));
                collect(value, prefix, out);
                prefix.pop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::KeyValue;
    use crate::schema::{Domain, ScalarKind};
    use std::sync::Arc;

    fn mode() -> Arc<Domain> {
        Arc::new(Domain::new("Mode", ["nominal", "safe"]))
    }

    fn phase() -> Arc<Domain> {
        Arc::new(Domain::new("Phase", ["launch", "cruise", "landing"]))
    }

    #[test]
    fn scalar_yields_single_empty_suffix() {
        let suffixes = leaf_suffixes(&TypeDescriptor::Scalar(ScalarKind::Float));
        assert_eq!(suffixes, vec![PathParts::new()]);
    }

    #[test]
    fn external_is_not_decomposed() {
        let suffixes = leaf_suffixes(&TypeDescriptor::External);
        assert_eq!(suffixes, vec![PathParts::new()]);
    }

    #[test]
    fn record_recurses_in_declaration_order() {
        let td = TypeDescriptor::record([
            ("dry", TypeDescriptor::Scalar(ScalarKind::Float)),
            (
                "margins",
                TypeDescriptor::record([("low", TypeDescriptor::Scalar(ScalarKind::Float))]),
            ),
        ]);
        let suffixes = leaf_suffixes(&td);
        assert_eq!(suffixes.len(), 2);
        assert_eq!(suffixes[0].as_slice(), &[PathPart::attribute("dry")]);
        assert_eq!(
            suffixes[1].as_slice(),
            &[PathPart::attribute("margins"), PathPart::attribute("low")]
        );
    }

    #[test]
    fn table_yields_container_plus_cartesian_product() {
        // 1 whole-container suffix + |Phase| x |Mode| cells
        let td = TypeDescriptor::table(
            [phase(), mode()],
            TypeDescriptor::Scalar(ScalarKind::Float),
        );
        let suffixes = leaf_suffixes(&td);
        assert_eq!(suffixes.len(), 1 + 3 * 2);
        assert!(suffixes[0].is_empty());
        assert_eq!(
            suffixes[1].as_slice(),
            &[PathPart::Item(KeyValue::from_tokens(["launch", "nominal"]))]
        );
    }

    #[test]
    fn table_of_records_recurses_into_cells() {
        let td = TypeDescriptor::table(
            [mode()],
            TypeDescriptor::record([
                ("watts", TypeDescriptor::Scalar(ScalarKind::Float)),
                ("ok", TypeDescriptor::Scalar(ScalarKind::Bool)),
            ]),
        );
        let suffixes = leaf_suffixes(&td);
        // container + 2 keys x 2 fields
        assert_eq!(suffixes.len(), 1 + 2 * 2);
        assert_eq!(
            suffixes[1].as_slice(),
            &[
                PathPart::Item(KeyValue::Single("nominal".into())),
                PathPart::attribute("watts"),
            ]
        );
    }
}
