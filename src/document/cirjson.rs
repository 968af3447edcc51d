//! CirJSON structure: every object opens with an `"__cirJsonId__"` string
//! member and every array opens with a string id element. Ids are unique
//! within one document.
use std::collections::HashSet;

use serde_json::Value;

use crate::document::{Anchor, Node, NodeKind, Property};
use crate::error::DocumentError;
use crate::pointer;

pub const ID_KEY: &str = "__cirJsonId__";

/// Convert a parsed CirJSON value into nodes, stripping and recording ids.
pub fn node_from_value(value: Value, pointer: &str) -> Result<Node, DocumentError> {
    let mut seen = HashSet::new();
    convert(value, pointer, &mut seen)
}

fn convert(value: Value, pointer: &str, seen: &mut HashSet<String>) -> Result<Node, DocumentError> {
    let anchor = Anchor::value(pointer);
    match value {
        Value::Null => Ok(Node::new(anchor, None, NodeKind::Null)),
        Value::Bool(b) => Ok(Node::new(anchor, None, NodeKind::Bool(b))),
        Value::Number(n) => Ok(Node::new(anchor, None, NodeKind::Number(n))),
        Value::String(s) => Ok(Node::new(anchor, None, NodeKind::String(s))),
        Value::Array(items) => {
            let mut items = items.into_iter();
            let id = match items.next() {
                Some(Value::String(id)) => id,
                _ => return Err(DocumentError::MissingArrayId { pointer: pointer.to_string() }),
            };
            register(id.clone(), pointer, seen)?;
            let mut elements = Vec::new();
            for (idx, item) in items.enumerate() {
                let child = pointer::child_pointer(&idx.to_string(), pointer);
                elements.push(convert(item, &child, seen)?);
            }
            Ok(Node::new(anchor, Some(id), NodeKind::Array(elements)))
        }
        Value::Object(map) => {
            let mut members = map.into_iter();
            let id = match members.next() {
                Some((key, Value::String(id))) if key == ID_KEY => id,
                _ => return Err(DocumentError::MissingObjectId { pointer: pointer.to_string() }),
            };
            register(id.clone(), pointer, seen)?;
            let mut props = Vec::new();
            for (name, item) in members {
                let child = pointer::child_pointer(&pointer::escape(&name), pointer);
                let value = convert(item, &child, seen)?;
                props.push(Property::new(name, child, vec![value]));
            }
            Ok(Node::new(anchor, Some(id), NodeKind::Object(props)))
        }
    }
}

fn register(id: String, pointer: &str, seen: &mut HashSet<String>) -> Result<(), DocumentError> {
    if seen.insert(id.clone()) {
        return Ok(());
    }
    Err(DocumentError::DuplicateId { id, pointer: pointer.to_string() })
}
