//! `enum` and `const`.
use crate::document::Node;
use crate::schema::SchemaObject;
use crate::validate::checker::{Checker, ENUM_MISMATCH};
use crate::validate::diagnostic::{FixableIssueKind, Priority, ValidationError};

pub(crate) fn check_enum(node: &Node, schema: &SchemaObject, checker: &mut Checker<'_>) {
    let Some(values) = &schema.enum_values else {
        return;
    };
    let ignore_case = schema.force_case_insensitive || checker.options().case_insensitive_enum_check;
    if values.iter().any(|literal| literal.matches(node, ignore_case)) {
        return;
    }
    let listed: Vec<String> = values.iter().map(ToString::to_string).collect();
    checker.error(
        node.anchor(),
        ValidationError::fixable(
            format!("{ENUM_MISMATCH}{}", listed.join(", ")),
            FixableIssueKind::NonEnumValue,
            None,
            Priority::Medium,
        ),
    );
}
