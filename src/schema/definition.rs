//! Walking `#/...` pointers inside one schema graph.
use crate::pointer;
use crate::schema::Schema;

const DEFINITIONS: &str = "definitions";
const DEFINITIONS_V9: &str = "$defs";
const PROPERTIES: &str = "properties";
const ITEMS: &str = "items";
const ADDITIONAL_ITEMS: &str = "additionalItems";

/// Resolve a document-local pointer such as `#/definitions/a/items/0`
/// against `schema`. `None` when any segment does not resolve.
pub fn find_relative_definition(schema: &Schema, reference: &str) -> Option<Schema> {
    if pointer::is_self_reference(Some(reference)) {
        return Some(schema.clone());
    }
    let rest = reference.strip_prefix("#/")?;
    let parts = pointer::split(rest);
    let mut current = schema.clone();
    let mut i = 0;
    while i < parts.len() {
        let part = parts[i];
        let last = i + 1 == parts.len();
        current = match part {
            DEFINITIONS | DEFINITIONS_V9 | PROPERTIES => {
                if last {
                    return None;
                }
                i += 1;
                let name = pointer::unescape(parts[i]);
                let next = if part == PROPERTIES {
                    current.properties.get(&name)
                } else {
                    current.definitions.as_ref()?.get(&name)
                };
                next?.clone()
            }
            ITEMS if last => current.items_schema.clone()?,
            ITEMS => {
                i += 1;
                let idx = parts[i].parse::<usize>().ok()?;
                current.items_schema_list.as_ref()?.get(idx)?.clone()
            }
            ADDITIONAL_ITEMS if last => current.additional_items_schema.clone()?,
            _ => current.definitions.as_ref()?.get(&pointer::unescape(part))?.clone(),
        };
        i += 1;
    }
    Some(current)
}
