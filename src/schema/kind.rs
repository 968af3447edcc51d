//! Primitive schema kinds and their subtype algebra.
use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::document::{Node, NodeKind};

/// A schema `type` value, plus the internal `string_number` kind used for
/// values that may be written either way.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaType {
    String,
    Number,
    Integer,
    Object,
    Array,
    Boolean,
    Null,
    Any,
    StringNumber,
}

pub type TypeSet = BTreeSet<SchemaType>;

impl SchemaType {
    pub const ALL: [SchemaType; 9] = [
        SchemaType::String,
        SchemaType::Number,
        SchemaType::Integer,
        SchemaType::Object,
        SchemaType::Array,
        SchemaType::Boolean,
        SchemaType::Null,
        SchemaType::Any,
        SchemaType::StringNumber,
    ];

    /// Parse a `type` keyword value.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            SchemaType::String => "string",
            SchemaType::Number => "number",
            SchemaType::Integer => "integer",
            SchemaType::Object => "object",
            SchemaType::Array => "array",
            SchemaType::Boolean => "boolean",
            SchemaType::Null => "null",
            SchemaType::Any => "any",
            SchemaType::StringNumber => "string_number",
        }
    }

    /// User-facing name; `any` reads as `*`.
    pub fn description(self) -> &'static str {
        match self {
            SchemaType::Any => "*",
            other => other.name(),
        }
    }

    /// Kinds an enum may constrain.
    pub fn is_primitive(self) -> bool {
        matches!(
            self,
            SchemaType::Integer | SchemaType::Number | SchemaType::Boolean | SchemaType::String | SchemaType::Null
        )
    }

    /// Most specific kind compatible with both sides, or `None` when they
    /// cannot describe the same value.
    pub fn subtype_of_both(self, other: SchemaType) -> Option<SchemaType> {
        use SchemaType::*;
        if other == Any {
            return Some(self);
        }
        match (self, other) {
            (Any, other) => Some(other),
            (String, String | StringNumber) => Some(String),
            (Number, Integer) => Some(Integer),
            (Number, Number | StringNumber) => Some(Number),
            (Integer, Number | StringNumber | Integer) => Some(Integer),
            (StringNumber, Integer | Number | String | StringNumber) => Some(other),
            (Object, Object) | (Array, Array) | (Boolean, Boolean) | (Null, Null) => Some(self),
            _ => None,
        }
    }

    /// Detect the kind of an instance value. A number is `integer` when it
    /// was written as an integral literal.
    pub fn of_node(node: &Node) -> SchemaType {
        match node.kind() {
            NodeKind::Object(_) => SchemaType::Object,
            NodeKind::Array(_) => SchemaType::Array,
            NodeKind::String(_) => SchemaType::String,
            NodeKind::Bool(_) => SchemaType::Boolean,
            NodeKind::Null => SchemaType::Null,
            NodeKind::Number(n) if n.is_i64() || n.is_u64() => SchemaType::Integer,
            NodeKind::Number(_) => SchemaType::Number,
        }
    }

    /// Alternate kind an instance may also be treated as.
    pub fn alternate(self) -> SchemaType {
        match self {
            SchemaType::Integer => SchemaType::Number,
            other => other,
        }
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Describe a set of kinds: `*` when `any` is present, otherwise the sorted
/// descriptions joined with ` | `. Short form keeps the first three.
pub fn types_description<'a>(short: bool, types: impl IntoIterator<Item = &'a SchemaType>) -> Option<String> {
    let types: TypeSet = types.into_iter().copied().collect();
    match types.len() {
        0 => return None,
        1 => return types.first().map(|t| t.description().to_string()),
        _ => {}
    }
    if types.contains(&SchemaType::Any) {
        return Some(SchemaType::Any.description().to_string());
    }
    let mut names: Vec<&str> = types.iter().map(|t| t.description()).collect();
    names.sort_unstable();
    names.dedup();
    let truncated = short && names.len() > 3;
    if short {
        names.truncate(3);
    }
    let mut joined = names.join(" | ");
    if truncated {
        joined.push_str("| ...");
    }
    Some(joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Dialect, Document};
    use serde_json::json;

    #[test]
    fn narrowing_rules() {
        use SchemaType::*;
        assert_eq!(Integer.subtype_of_both(Number), Some(Integer));
        assert_eq!(Number.subtype_of_both(Integer), Some(Integer));
        assert_eq!(String.subtype_of_both(StringNumber), Some(String));
        assert_eq!(StringNumber.subtype_of_both(Number), Some(Number));
        assert_eq!(String.subtype_of_both(Object), None);
        assert_eq!(Boolean.subtype_of_both(Null), None);
        for t in SchemaType::ALL {
            assert_eq!(Any.subtype_of_both(t), Some(t));
            assert_eq!(t.subtype_of_both(Any), Some(t));
        }
    }

    #[test]
    fn detects_instance_kinds() {
        let doc = Document::from_value(json!([1, 1.5, -3, "s", true, null, {}, []]), Dialect::Json).unwrap();
        let kinds: Vec<SchemaType> = doc.root().elements().iter().map(SchemaType::of_node).collect();
        use SchemaType::*;
        assert_eq!(kinds, vec![Integer, Number, Integer, String, Boolean, Null, Object, Array]);
    }

    #[test]
    fn describes_type_sets() {
        use SchemaType::*;
        assert_eq!(types_description(false, &[] as &[SchemaType]), None);
        assert_eq!(types_description(false, &[Integer]).as_deref(), Some("integer"));
        assert_eq!(types_description(false, &[String, Any]).as_deref(), Some("*"));
        assert_eq!(types_description(false, &[String, Boolean]).as_deref(), Some("boolean | string"));
        assert_eq!(
            types_description(true, &[String, Boolean, Null, Object]).as_deref(),
            Some("boolean | null | object| ...")
        );
    }
}
