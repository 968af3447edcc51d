//! Literal values captured from `enum` and `const`.
use std::fmt;

use indexmap::IndexMap;
use ordered_float::OrderedFloat;

use crate::document::{Node, NodeKind};

/// One enum literal. Composite literals keep their structure so they can be
/// compared element-wise against instance containers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EnumValue {
    /// Unquoted string content.
    String(String),
    Integer(i64),
    Number(OrderedFloat<f64>),
    Bool(bool),
    Null,
    Array(Vec<EnumValue>),
    Object(IndexMap<String, EnumValue>),
}

impl EnumValue {
    /// Capture a literal from a schema document node.
    pub fn from_node(node: &Node) -> Self {
        match node.kind() {
            NodeKind::String(s) => EnumValue::String(s.clone()),
            NodeKind::Number(n) => match n.as_i64() {
                Some(i) => EnumValue::Integer(i),
                None => EnumValue::Number(OrderedFloat(n.as_f64().unwrap_or(f64::NAN))),
            },
            NodeKind::Bool(b) => EnumValue::Bool(*b),
            NodeKind::Null => EnumValue::Null,
            NodeKind::Array(items) => EnumValue::Array(items.iter().map(EnumValue::from_node).collect()),
            NodeKind::Object(props) => EnumValue::Object(
                props
                    .iter()
                    .filter_map(|p| p.single_value().map(|v| (p.name().to_string(), EnumValue::from_node(v))))
                    .collect(),
            ),
        }
    }

    /// Whether `node` equals this literal. String contents compare with
    /// `ignore_case` applied; composite literals must match in size.
    pub fn matches(&self, node: &Node, ignore_case: bool) -> bool {
        match (self, node.kind()) {
            (EnumValue::String(expected), NodeKind::String(actual)) => {
                if ignore_case {
                    expected.to_lowercase() == actual.to_lowercase()
                } else {
                    expected == actual
                }
            }
            (EnumValue::Integer(expected), NodeKind::Number(actual)) => match actual.as_i64() {
                Some(actual) => *expected == actual,
                None => actual.as_f64() == Some(*expected as f64),
            },
            (EnumValue::Number(expected), NodeKind::Number(actual)) => actual.as_f64() == Some(expected.0),
            (EnumValue::Bool(expected), NodeKind::Bool(actual)) => expected == actual,
            (EnumValue::Null, NodeKind::Null) => true,
            (EnumValue::Array(expected), NodeKind::Array(actual)) => {
                expected.len() == actual.len()
                    && expected.iter().zip(actual).all(|(e, a)| e.matches(a, ignore_case))
            }
            (EnumValue::Object(expected), NodeKind::Object(actual)) => {
                expected.len() == actual.len()
                    && actual.iter().all(|prop| match expected.get(prop.name()) {
                        Some(e) => prop.values().iter().all(|v| e.matches(v, ignore_case)),
                        None => false,
                    })
            }
            _ => false,
        }
    }

    /// Literal text used when suggesting a default, unquoted for strings.
    pub fn plain_text(&self) -> String {
        match self {
            EnumValue::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for EnumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnumValue::String(s) => write!(f, "\"{s}\""),
            EnumValue::Integer(i) => write!(f, "{i}"),
            EnumValue::Number(n) => write!(f, "{}", n.0),
            EnumValue::Bool(b) => write!(f, "{b}"),
            EnumValue::Null => f.write_str("null"),
            EnumValue::Array(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            EnumValue::Object(map) => {
                let parts: Vec<String> = map.iter().map(|(k, v)| format!("\"{k}\": {v}")).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}
