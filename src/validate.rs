//! Instance validation.
//!
//! A [`Checker`] collects findings for one instance value. Which checks run
//! depends on the value's kind and on what the schema declares; composed
//! schemas are first resolved into their variants, then the best matching
//! alternative decides which findings are reported. [`rank`] trims
//! overlapping findings down to the most severe ones.
pub mod checker;
mod array;
mod conditional;
pub mod diagnostic;
mod literal;
mod numeric;
mod object;
pub mod rank;
mod string;
pub mod types;

use crate::document::Node;
use crate::schema::{Schema, SchemaObject, SchemaType};

pub use checker::{Checker, check_by_match_result};
pub use diagnostic::{Diagnostic, FixableIssueKind, IssueData, MissingProperties, MissingProperty, Priority, ValidationError};
pub use rank::rank;

/// The checks an instance value can go through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Validation {
    Enum,
    Type,
    Numeric,
    String,
    Array,
    Object,
    Not,
    IfThenElse,
}

impl Validation {
    /// Checks for a value of `kind` against `schema`, in order.
    pub(crate) fn for_schema(schema: &SchemaObject, kind: SchemaType) -> Vec<Validation> {
        let mut list = vec![Validation::Enum, Validation::Type];
        match kind {
            SchemaType::StringNumber => list.extend([Validation::Numeric, Validation::String]),
            SchemaType::Number | SchemaType::Integer => list.push(Validation::Numeric),
            SchemaType::String => list.push(Validation::String),
            SchemaType::Array => list.push(Validation::Array),
            SchemaType::Object => list.push(Validation::Object),
            SchemaType::Boolean | SchemaType::Null | SchemaType::Any => {}
        }
        if schema.not.is_some() {
            list.push(Validation::Not);
        }
        if schema.if_then_else.is_some() {
            list.push(Validation::IfThenElse);
        }
        list
    }

    pub(crate) fn apply(self, node: &Node, schema: &Schema, kind: SchemaType, checker: &mut Checker<'_>) {
        match self {
            Validation::Enum => literal::check_enum(node, schema, checker),
            Validation::Type => types::check_type(node, schema, kind, checker),
            Validation::Numeric => numeric::check_number(node, schema, kind, checker),
            Validation::String => string::check_string(node, schema, checker),
            Validation::Array => array::check_array(node, schema, checker),
            Validation::Object => object::check_object(node, schema, checker),
            Validation::Not => conditional::check_not(node, schema, checker),
            Validation::IfThenElse => conditional::check_if_then_else(node, schema, checker),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_value;
    use crate::schema::FileId;
    use serde_json::json;

    #[test]
    fn checks_follow_the_value_kind() {
        let schema = read_value(FileId::new("mem://v"), json!({"not": {}, "if": {}, "then": {}}));
        assert_eq!(
            Validation::for_schema(&schema, SchemaType::Integer),
            vec![Validation::Enum, Validation::Type, Validation::Numeric, Validation::Not, Validation::IfThenElse]
        );
        let plain = read_value(FileId::new("mem://p"), json!({}));
        assert_eq!(Validation::for_schema(&plain, SchemaType::Null), vec![Validation::Enum, Validation::Type]);
    }
}
