//! Instance kind against declared schema types.
use crate::document::Node;
use crate::schema::{SchemaObject, SchemaType};
use crate::validate::checker::Checker;

/// The declared type that governs an instance of `kind`: `kind` itself
/// when compatible, otherwise the conflicting declared type. `None` when the
/// schema declares no type.
pub fn matching_schema_type(schema: &SchemaObject, kind: SchemaType) -> Option<SchemaType> {
    use SchemaType::*;
    if let Some(declared) = schema.schema_type {
        return Some(match (kind, declared) {
            (_, Any) => kind,
            (Integer, Number) => kind,
            (StringNumber, Integer | Number | String) => kind,
            _ => declared,
        });
    }
    if let Some(variants) = &schema.type_variants {
        let compatible = variants.contains(&kind)
            || variants.contains(&Any)
            || (kind == Integer && variants.contains(&Number))
            || (kind == StringNumber && [Integer, Number, String].iter().any(|t| variants.contains(t)));
        if compatible {
            return Some(kind);
        }
        // integer-ness of a fractional number is left to the numeric check
        if kind == Number && variants.contains(&Integer) {
            return Some(Integer);
        }
        return variants.first().copied();
    }
    if !schema.properties.is_empty() && kind == Object {
        return Some(kind);
    }
    None
}

/// Whether an instance of `kind` may be checked against `schema` at all.
pub fn accepts(schema: &SchemaObject, kind: SchemaType) -> bool {
    match matching_schema_type(schema, kind) {
        Some(matching) => matching == kind || fractional_against_integer(kind, matching),
        None if schema.enum_values.is_some() => kind.is_primitive(),
        None => true,
    }
}

/// Declared types of every schema, in order.
pub fn expected_types<'a>(schemas: impl IntoIterator<Item = &'a std::sync::Arc<SchemaObject>>) -> Vec<SchemaType> {
    let mut list = Vec::new();
    for schema in schemas {
        if let Some(t) = schema.schema_type {
            list.push(t);
        } else if let Some(variants) = &schema.type_variants {
            list.extend(variants.iter().copied());
        }
    }
    list
}

/// The numeric check reports "integer expected" for these, so the type
/// check stays quiet.
fn fractional_against_integer(kind: SchemaType, matching: SchemaType) -> bool {
    kind == SchemaType::Number && matching == SchemaType::Integer
}

pub(crate) fn check_type(node: &Node, schema: &std::sync::Arc<SchemaObject>, kind: SchemaType, checker: &mut Checker<'_>) {
    let Some(other) = matching_schema_type(schema, kind) else {
        return;
    };
    if other != kind && other != kind.alternate() && !fractional_against_integer(kind, other) {
        checker.type_error(node.anchor(), Some(kind), &expected_types([schema]));
    }
}
