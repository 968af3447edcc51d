//! Instance document adapter.
//!
//! The engine never looks at source text. It walks [`Node`] trees produced
//! from a parsed `serde_json::Value`, with the dialect-specific bookkeeping
//! (CirJSON object and array ids) stripped off by [`cirjson`].
pub mod cirjson;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::DocumentError;
use crate::pointer::{self, PointerPosition, Step};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Supported document syntaxes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Json,
    #[default]
    CirJson,
}

/// Which part of an instance a diagnostic is attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorPart {
    /// The value itself.
    Value,
    /// The whole `"name": value` member.
    Property,
    /// Only the member name.
    Name,
}

/// Stable identity of a node inside one document.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Anchor {
    pub pointer: String,
    pub part: AnchorPart,
}

impl Anchor {
    pub fn value(pointer: impl Into<String>) -> Self {
        Self { pointer: pointer.into(), part: AnchorPart::Value }
    }

    /// Anchors overlap when one location lies within the other. A member,
    /// its name and its value share one pointer; a container covers every
    /// descendant and the root covers the whole document.
    pub fn overlaps(&self, other: &Anchor) -> bool {
        contains_pointer(&self.pointer, &other.pointer) || contains_pointer(&other.pointer, &self.pointer)
    }
}

/// Whether `inner` equals `outer` or lies below it, segment-wise.
fn contains_pointer(outer: &str, inner: &str) -> bool {
    if outer == "/" || outer == inner {
        return true;
    }
    inner.strip_prefix(outer).is_some_and(|rest| rest.starts_with('/'))
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    anchor: Anchor,
    id: Option<String>,
    kind: NodeKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Object(Vec<Property>),
    Array(Vec<Node>),
    String(String),
    Number(Number),
    Bool(bool),
    Null,
}

/// One object member. JSON members carry exactly one value; the list form
/// mirrors syntaxes where a key may repeat.
#[derive(Clone, Debug, PartialEq)]
pub struct Property {
    name: String,
    pointer: String,
    values: Vec<Node>,
}

/// A parsed instance (or schema) document.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    dialect: Dialect,
    root: Node,
}

// ————————————————————————————————————————————————————————————————————————————
// DOCUMENT
// ————————————————————————————————————————————————————————————————————————————

impl Document {
    pub fn parse(text: &str, dialect: Dialect) -> Result<Self, DocumentError> {
        let value = serde_json::from_str::<Value>(text).map_err(DocumentError::Syntax)?;
        Self::from_value(value, dialect)
    }

    /// Plain JSON needs no id bookkeeping, so this cannot fail.
    pub fn from_json(value: Value) -> Self {
        Self { dialect: Dialect::Json, root: Node::from_json(value, "/") }
    }

    pub fn from_value(value: Value, dialect: Dialect) -> Result<Self, DocumentError> {
        let root = match dialect {
            Dialect::Json => Node::from_json(value, "/"),
            Dialect::CirJson => cirjson::node_from_value(value, "/")?,
        };
        Ok(Self { dialect, root })
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Walk `position` from the root; `None` when a step does not exist.
    pub fn node_at(&self, position: &PointerPosition) -> Option<&Node> {
        let mut current = &self.root;
        for step in position.steps() {
            current = match (step, &current.kind) {
                (Step::Name(name), NodeKind::Object(_)) => current.find_property(name)?.single_value()?,
                (Step::Index(idx), NodeKind::Array(items)) => items.get(*idx)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// NODES
// ————————————————————————————————————————————————————————————————————————————

impl Node {
    pub(crate) fn new(anchor: Anchor, id: Option<String>, kind: NodeKind) -> Self {
        Self { anchor, id, kind }
    }

    /// Plain JSON: every value maps one to one.
    pub fn from_json(value: Value, pointer: &str) -> Self {
        let kind = match value {
            Value::Null => NodeKind::Null,
            Value::Bool(b) => NodeKind::Bool(b),
            Value::Number(n) => NodeKind::Number(n),
            Value::String(s) => NodeKind::String(s),
            Value::Array(items) => NodeKind::Array(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(idx, item)| Node::from_json(item, &pointer::child_pointer(&idx.to_string(), pointer)))
                    .collect(),
            ),
            Value::Object(map) => NodeKind::Object(
                map.into_iter()
                    .map(|(name, item)| {
                        let child = pointer::child_pointer(&pointer::escape(&name), pointer);
                        let value = Node::from_json(item, &child);
                        Property::new(name, child, vec![value])
                    })
                    .collect(),
            ),
        };
        Self { anchor: Anchor::value(pointer), id: None, kind }
    }

    pub fn anchor(&self) -> &Anchor {
        &self.anchor
    }

    pub fn pointer(&self) -> &str {
        &self.anchor.pointer
    }

    /// CirJSON id of this object or array, if the dialect carries one.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is_object(&self) -> bool {
        matches!(self.kind, NodeKind::Object(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, NodeKind::Array(_))
    }

    pub fn is_string_literal(&self) -> bool {
        matches!(self.kind, NodeKind::String(_))
    }

    pub fn is_number_literal(&self) -> bool {
        matches!(self.kind, NodeKind::Number(_))
    }

    pub fn is_boolean_literal(&self) -> bool {
        matches!(self.kind, NodeKind::Bool(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self.kind, NodeKind::Null)
    }

    pub fn properties(&self) -> &[Property] {
        match &self.kind {
            NodeKind::Object(props) => props,
            _ => &[],
        }
    }

    pub fn elements(&self) -> &[Node] {
        match &self.kind {
            NodeKind::Array(items) => items,
            _ => &[],
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.kind {
            NodeKind::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&Number> {
        match &self.kind {
            NodeKind::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn find_property(&self, name: &str) -> Option<&Property> {
        self.properties().iter().find(|p| p.name == name)
    }

    /// Comparison-ready text: strings stay quoted, numbers keep their
    /// literal form, containers render as compact JSON.
    pub fn validation_text(&self) -> String {
        match &self.kind {
            NodeKind::String(s) => Value::String(s.clone()).to_string(),
            NodeKind::Number(n) => n.to_string(),
            NodeKind::Bool(b) => b.to_string(),
            NodeKind::Null => "null".to_string(),
            NodeKind::Object(_) | NodeKind::Array(_) => self.to_value().to_string(),
        }
    }

    /// Rebuild a plain JSON value (dialect ids are not restored).
    pub fn to_value(&self) -> Value {
        match &self.kind {
            NodeKind::Null => Value::Null,
            NodeKind::Bool(b) => Value::Bool(*b),
            NodeKind::Number(n) => Value::Number(n.clone()),
            NodeKind::String(s) => Value::String(s.clone()),
            NodeKind::Array(items) => Value::Array(items.iter().map(Node::to_value).collect()),
            NodeKind::Object(props) => Value::Object(
                props
                    .iter()
                    .filter_map(|p| p.single_value().map(|v| (p.name.clone(), v.to_value())))
                    .collect(),
            ),
        }
    }
}

impl Property {
    pub(crate) fn new(name: String, pointer: String, values: Vec<Node>) -> Self {
        Self { name, pointer, values }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[Node] {
        &self.values
    }

    /// The value when there is exactly one.
    pub fn single_value(&self) -> Option<&Node> {
        match self.values.as_slice() {
            [value] => Some(value),
            _ => None,
        }
    }

    /// Anchor covering the whole member.
    pub fn anchor(&self) -> Anchor {
        Anchor { pointer: self.pointer.clone(), part: AnchorPart::Property }
    }

    /// The member name as a string node, for `propertyNames` checks.
    pub fn name_node(&self) -> Node {
        Node {
            anchor: Anchor { pointer: self.pointer.clone(), part: AnchorPart::Name },
            id: None,
            kind: NodeKind::String(self.name.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_nodes_carry_pointers() {
        let doc = Document::from_value(json!({"a": [1, {"b/c": true}]}), Dialect::Json).unwrap();
        let root = doc.root();
        assert!(root.is_object());
        let a = root.find_property("a").unwrap().single_value().unwrap();
        assert_eq!(a.pointer(), "/a");
        let inner = &a.elements()[1];
        assert_eq!(inner.pointer(), "/a/1");
        let flag = inner.properties()[0].single_value().unwrap();
        assert_eq!(flag.pointer(), "/a/1/b~1c");
        assert_eq!(flag.as_bool(), Some(true));
    }

    #[test]
    fn validation_text_keeps_quotes_and_literals() {
        let doc = Document::from_value(json!(["x", 1, 1.5, null, false]), Dialect::Json).unwrap();
        let texts: Vec<String> = doc.root().elements().iter().map(Node::validation_text).collect();
        assert_eq!(texts, vec!["\"x\"", "1", "1.5", "null", "false"]);
    }

    #[test]
    fn node_at_follows_names_and_indexes() {
        let doc = Document::from_value(json!({"a": [{"b": 3}]}), Dialect::Json).unwrap();
        let node = doc.node_at(&PointerPosition::parse("/a/0/b")).unwrap();
        assert_eq!(node.as_number().and_then(Number::as_i64), Some(3));
        assert!(doc.node_at(&PointerPosition::parse("/a/1")).is_none());
        assert!(doc.node_at(&PointerPosition::parse("/a/b")).is_none());
    }

    #[test]
    fn member_and_name_anchors_overlap_value() {
        let doc = Document::from_value(json!({"a": 1}), Dialect::Json).unwrap();
        let prop = &doc.root().properties()[0];
        let value = prop.single_value().unwrap();
        assert!(prop.anchor().overlaps(value.anchor()));
        assert!(prop.name_node().anchor().overlaps(value.anchor()));
        assert!(doc.root().anchor().overlaps(value.anchor()));
    }

    #[test]
    fn containers_overlap_their_descendants_only() {
        assert!(Anchor::value("/a").overlaps(&Anchor::value("/a/0/b")));
        assert!(Anchor::value("/a/0/b").overlaps(&Anchor::value("/a")));
        assert!(Anchor::value("/").overlaps(&Anchor::value("/x")));
        assert!(!Anchor::value("/a").overlaps(&Anchor::value("/ab")));
        assert!(!Anchor::value("/a/0").overlaps(&Anchor::value("/a/1")));
    }
}
