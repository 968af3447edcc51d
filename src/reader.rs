//! Schema reader: document nodes in, frozen schema graph out.
//!
//! Reading is breadth-first. Every schema node gets a [`Draft`] in an arena;
//! nested schemas are linked to their parent by arena index. Children are
//! always created after their parent, so freezing the arena back to front
//! attaches finished children before any parent needs them.
use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Number, Value};

use crate::document::{Dialect, Document, Node, NodeKind};
use crate::error::SchemaError;
use crate::pointer;
use crate::schema::{
    EnumValue, FileId, PatternProperties, Schema, SchemaObject, SchemaType, StringPattern, TypeSet,
};

// ————————————————————————————————————————————————————————————————————————————
// ENTRY POINTS
// ————————————————————————————————————————————————————————————————————————————

/// Read a schema graph from an already-adapted document root.
pub fn read(file: FileId, root: &Node) -> Schema {
    SchemaReader::new(file).run(root)
}

/// Read a plain JSON value.
pub fn read_value(file: FileId, value: Value) -> Schema {
    read(file, &Node::from_json(value, "/"))
}

/// Parse and read schema text in the given dialect.
pub fn read_text(file: FileId, text: &str, dialect: Dialect) -> Result<Schema, SchemaError> {
    let document = Document::parse(text, dialect)
        .map_err(|source| SchemaError::Malformed { file: file.to_string(), source })?;
    Ok(read(file, document.root()))
}

// ————————————————————————————————————————————————————————————————————————————
// ARENA
// ————————————————————————————————————————————————————————————————————————————

/// Where a child schema hangs off its parent.
#[derive(Clone, Debug)]
enum Slot {
    Property(String),
    PatternProperty(String),
    Definition(String),
    SchemaDependency(String),
    AdditionalProperties,
    PropertyNames,
    Items,
    ItemsTuple,
    AdditionalItems,
    Contains,
    AllOf,
    AnyOf,
    OneOf,
    Not,
    If,
    Then,
    Else,
}

struct Draft {
    object: SchemaObject,
    links: Vec<(Slot, usize)>,
    has_pattern_properties: bool,
}

struct SchemaReader<'a> {
    file: FileId,
    drafts: Vec<Draft>,
    queue: VecDeque<(usize, &'a Node)>,
    ids: IndexMap<String, String>,
}

impl<'a> SchemaReader<'a> {
    fn new(file: FileId) -> Self {
        Self { file, drafts: Vec::new(), queue: VecDeque::new(), ids: IndexMap::new() }
    }

    fn run(mut self, root: &'a Node) -> Schema {
        let root_idx = self.create("/".to_string());
        self.queue.push_back((root_idx, root));

        while let Some((idx, node)) = self.queue.pop_front() {
            match node.kind() {
                NodeKind::Object(props) => {
                    for prop in props {
                        let Some(value) = prop.single_value() else {
                            continue;
                        };
                        self.read_keyword(idx, prop.name(), value);
                    }
                }
                NodeKind::Array(items) => {
                    for (i, item) in items.iter().enumerate() {
                        self.read_single_definition(idx, &i.to_string(), item);
                    }
                }
                _ => {}
            }
        }

        self.freeze(root_idx)
    }

    fn create(&mut self, pointer: String) -> usize {
        self.drafts.push(Draft {
            object: SchemaObject::new(self.file.clone(), pointer),
            links: Vec::new(),
            has_pattern_properties: false,
        });
        self.drafts.len() - 1
    }

    fn pointer_of(&self, idx: usize) -> &str {
        self.drafts[idx].object.pointer()
    }

    /// New child draft at `parent_pointer/segment`, linked and queued.
    fn enqueue(&mut self, parent: usize, slot: Slot, pointer: String, node: &'a Node) -> usize {
        let child = self.create(pointer);
        self.drafts[parent].links.push((slot, child));
        self.queue.push_back((child, node));
        child
    }

    fn enqueue_keyword(&mut self, parent: usize, slot: Slot, keyword: &str, node: &'a Node) {
        if node.is_object() {
            let pointer = pointer::child_pointer(keyword, self.pointer_of(parent));
            self.enqueue(parent, slot, pointer, node);
        }
    }

    fn read_single_definition(&mut self, parent: usize, name: &str, node: &'a Node) {
        let pointer = pointer::child_pointer(&pointer::escape(name), self.pointer_of(parent));
        self.drafts[parent].object.definitions.get_or_insert_with(IndexMap::new);
        self.enqueue(parent, Slot::Definition(name.to_string()), pointer, node);
    }

    /// Members of a name-to-schema object (`properties`, `definitions`,
    /// `patternProperties`). Boolean members become empty schemas.
    fn read_inner_object(&mut self, parent: usize, keyword: &str, node: &'a Node, slot: fn(String) -> Slot) {
        let base = pointer::child_pointer(keyword, self.pointer_of(parent));
        for prop in node.properties() {
            let Some(value) = prop.single_value() else {
                continue;
            };
            let pointer = pointer::child_pointer(&pointer::escape(prop.name()), &base);
            if value.is_boolean_literal() {
                let child = self.create(pointer);
                self.drafts[parent].links.push((slot(prop.name().to_string()), child));
            } else if value.is_object() {
                self.enqueue(parent, slot(prop.name().to_string()), pointer, value);
            }
        }
    }

    fn read_container(&mut self, parent: usize, keyword: &str, node: &'a Node, slot: Slot) {
        let base = pointer::child_pointer(keyword, self.pointer_of(parent));
        for (i, item) in node.elements().iter().enumerate() {
            if item.is_object() {
                self.enqueue(parent, slot.clone(), pointer::child_pointer(&i.to_string(), &base), item);
            }
        }
    }

    // ————————————————————————————————————————————————————————————————————————
    // KEYWORDS
    // ————————————————————————————————————————————————————————————————————————

    fn read_keyword(&mut self, idx: usize, name: &str, value: &'a Node) {
        match name {
            "$anchor" | "id" => self.set_string(idx, value, |o, s| o.id = Some(s)),
            "$id" => {
                if let Some(id) = value.as_str() {
                    let pointer = self.pointer_of(idx).to_string();
                    self.ids.insert(id.to_string(), pointer);
                }
                self.set_string(idx, value, |o, s| o.id = Some(s));
            }
            "$schema" => self.set_string(idx, value, |o, s| o.schema_uri = Some(s)),
            "title" => self.set_string(idx, value, |o, s| o.title = Some(s)),
            "description" => self.set_string(idx, value, |o, s| o.description = Some(s)),
            "deprecationMessage" => self.set_string(idx, value, |o, s| o.deprecation_message = Some(s)),
            "x-intellij-html-description" => self.set_string(idx, value, |o, s| o.html_description = Some(s)),
            "x-intellij-language-injection" => self.read_injection(idx, value),
            "x-intellij-enum-metadata" => self.read_enum_metadata(idx, value),
            "x-intellij-case-insensitive" => {
                if let Some(flag) = value.as_bool() {
                    self.object(idx).force_case_insensitive = flag;
                }
            }
            "$ref" => self.set_string(idx, value, |o, s| o.reference = Some(s)),
            "$recursiveRef" => self.set_string(idx, value, |o, s| {
                o.reference = Some(s);
                o.ref_is_recursive = true;
            }),
            "$recursiveAnchor" => {
                if let Some(flag) = value.as_bool() {
                    self.object(idx).is_recursive_anchor = flag;
                }
            }
            "default" => self.object(idx).default = Some(value.to_value()),
            "example" => self.object(idx).example = Some(value.to_value()),
            "format" => self.set_string(idx, value, |o, s| o.format = Some(s)),
            "definitions" | "$defs" => {
                if value.is_object() {
                    self.object(idx).definitions.get_or_insert_with(IndexMap::new);
                    self.read_inner_object(idx, "definitions", value, Slot::Definition);
                }
            }
            "properties" => {
                if value.is_object() {
                    self.read_inner_object(idx, "properties", value, Slot::Property);
                }
            }
            "patternProperties" => {
                if value.is_object() {
                    self.drafts[idx].has_pattern_properties = true;
                    self.read_inner_object(idx, "patternProperties", value, Slot::PatternProperty);
                }
            }
            "multipleOf" => self.set_number(idx, value, |o, n| o.multiple_of = Some(n)),
            "maximum" => self.set_number(idx, value, |o, n| o.maximum = Some(n)),
            "minimum" => self.set_number(idx, value, |o, n| o.minimum = Some(n)),
            "exclusiveMaximum" => match value.kind() {
                NodeKind::Bool(flag) => self.object(idx).is_exclusive_maximum = *flag,
                NodeKind::Number(n) => self.object(idx).exclusive_maximum_number = Some(n.clone()),
                _ => {}
            },
            "exclusiveMinimum" => match value.kind() {
                NodeKind::Bool(flag) => self.object(idx).is_exclusive_minimum = *flag,
                NodeKind::Number(n) => self.object(idx).exclusive_minimum_number = Some(n.clone()),
                _ => {}
            },
            "maxLength" => self.set_count(idx, value, |o, n| o.max_length = Some(n)),
            "minLength" => self.set_count(idx, value, |o, n| o.min_length = Some(n)),
            "pattern" => self.set_string(idx, value, |o, s| o.pattern = Some(StringPattern::new(&s))),
            "additionalItems" => match value.kind() {
                NodeKind::Bool(flag) => self.object(idx).additional_items_allowed = Some(*flag),
                NodeKind::Object(_) => self.enqueue_keyword(idx, Slot::AdditionalItems, "additionalItems", value),
                _ => {}
            },
            "items" => match value.kind() {
                NodeKind::Object(_) => self.enqueue_keyword(idx, Slot::Items, "items", value),
                NodeKind::Array(_) => {
                    self.object(idx).items_schema_list = Some(Vec::new());
                    self.read_container(idx, "items", value, Slot::ItemsTuple);
                }
                _ => {}
            },
            "contains" => self.enqueue_keyword(idx, Slot::Contains, "contains", value),
            "maxItems" => self.set_count(idx, value, |o, n| o.max_items = Some(n)),
            "minItems" => self.set_count(idx, value, |o, n| o.min_items = Some(n)),
            "uniqueItems" => {
                if let Some(flag) = value.as_bool() {
                    self.object(idx).unique_items = Some(flag);
                }
            }
            "maxProperties" => self.set_count(idx, value, |o, n| o.max_properties = Some(n)),
            "minProperties" => self.set_count(idx, value, |o, n| o.min_properties = Some(n)),
            "required" => {
                if value.is_array() {
                    let names: BTreeSet<String> = non_blank_strings(value).collect();
                    self.object(idx).required = Some(names);
                }
            }
            "additionalProperties" => match value.kind() {
                NodeKind::Bool(flag) => self.object(idx).set_additional_properties_allowed(*flag),
                NodeKind::Object(_) => {
                    self.enqueue_keyword(idx, Slot::AdditionalProperties, "additionalProperties", value)
                }
                _ => {}
            },
            "propertyNames" => self.enqueue_keyword(idx, Slot::PropertyNames, "propertyNames", value),
            "dependencies" => self.read_dependencies(idx, value),
            "enum" => {
                if value.is_array() {
                    let values = value.elements().iter().map(EnumValue::from_node).collect();
                    self.object(idx).enum_values = Some(values);
                }
            }
            "const" => self.object(idx).enum_values = Some(vec![EnumValue::from_node(value)]),
            "type" => self.read_type(idx, value),
            "allOf" => self.read_list(idx, "allOf", value, Slot::AllOf),
            "anyOf" => self.read_list(idx, "anyOf", value, Slot::AnyOf),
            "oneOf" => self.read_list(idx, "oneOf", value, Slot::OneOf),
            "not" => self.enqueue_keyword(idx, Slot::Not, "not", value),
            "if" => self.enqueue_keyword(idx, Slot::If, "if", value),
            "then" => self.enqueue_keyword(idx, Slot::Then, "then", value),
            "else" => self.enqueue_keyword(idx, Slot::Else, "else", value),
            "instanceof" | "typeof" => self.object(idx).should_validate_against_js_type = true,
            _ => self.read_single_definition(idx, name, value),
        }
    }

    fn object(&mut self, idx: usize) -> &mut SchemaObject {
        &mut self.drafts[idx].object
    }

    fn set_string(&mut self, idx: usize, value: &Node, apply: impl FnOnce(&mut SchemaObject, String)) {
        if let Some(s) = value.as_str() {
            apply(self.object(idx), s.to_string());
        }
    }

    fn set_number(&mut self, idx: usize, value: &Node, apply: impl FnOnce(&mut SchemaObject, Number)) {
        if let Some(n) = value.as_number() {
            apply(self.object(idx), n.clone());
        }
    }

    fn set_count(&mut self, idx: usize, value: &Node, apply: impl FnOnce(&mut SchemaObject, u64)) {
        let Some(n) = value.as_number() else {
            return;
        };
        let count = match n.as_u64() {
            Some(count) => count,
            None => match n.as_f64() {
                Some(f) if f >= 0.0 => f as u64,
                _ => 0,
            },
        };
        apply(self.object(idx), count);
    }

    fn read_list(&mut self, idx: usize, keyword: &str, value: &'a Node, slot: Slot) {
        if !value.is_array() {
            return;
        }
        let object = self.object(idx);
        match slot {
            Slot::AllOf => object.all_of = Some(Vec::new()),
            Slot::AnyOf => object.any_of = Some(Vec::new()),
            _ => object.one_of = Some(Vec::new()),
        }
        self.read_container(idx, keyword, value, slot);
    }

    fn read_type(&mut self, idx: usize, value: &Node) {
        match value.kind() {
            NodeKind::String(name) => {
                if let Some(t) = SchemaType::parse(name) {
                    self.object(idx).schema_type = Some(t);
                }
            }
            NodeKind::Array(_) => {
                let variants: TypeSet = non_blank_strings(value).filter_map(|s| SchemaType::parse(&s)).collect();
                if !variants.is_empty() {
                    self.object(idx).type_variants = Some(variants);
                }
            }
            _ => {}
        }
    }

    fn read_dependencies(&mut self, idx: usize, value: &'a Node) {
        if !value.is_object() {
            return;
        }
        let mut property_dependencies = IndexMap::new();
        for prop in value.properties() {
            let Some(dep) = prop.single_value() else {
                continue;
            };
            match dep.kind() {
                NodeKind::Array(_) => {
                    let names: Vec<String> = non_blank_strings(dep).collect();
                    if !names.is_empty() {
                        property_dependencies.insert(prop.name().to_string(), names);
                    }
                }
                NodeKind::Object(_) => {
                    let base = pointer::child_pointer("dependencies", self.pointer_of(idx));
                    let pointer = pointer::child_pointer(&pointer::escape(prop.name()), &base);
                    self.enqueue(idx, Slot::SchemaDependency(prop.name().to_string()), pointer, dep);
                }
                _ => {}
            }
        }
        let object = self.object(idx);
        object.property_dependencies = Some(property_dependencies);
        object.schema_dependencies = Some(IndexMap::new());
    }

    fn read_injection(&mut self, idx: usize, value: &Node) {
        match value.kind() {
            NodeKind::String(lang) => self.object(idx).language_injection = Some(lang.clone()),
            NodeKind::Object(props) => {
                let object = self.object(idx);
                for prop in props {
                    let Some(text) = prop.single_value().and_then(Node::as_str) else {
                        continue;
                    };
                    match prop.name() {
                        "language" => object.language_injection = Some(text.to_string()),
                        "prefix" => object.language_injection_prefix = Some(text.to_string()),
                        "suffix" => object.language_injection_suffix = Some(text.to_string()),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    fn read_enum_metadata(&mut self, idx: usize, value: &Node) {
        if !value.is_object() {
            return;
        }
        let mut metadata = IndexMap::new();
        for prop in value.properties() {
            let Some(entry) = prop.single_value() else {
                continue;
            };
            match entry.kind() {
                NodeKind::String(desc) => {
                    metadata.insert(prop.name().to_string(), IndexMap::from([("description".to_string(), desc.clone())]));
                }
                NodeKind::Object(fields) => {
                    let fields = fields
                        .iter()
                        .filter_map(|f| f.single_value()?.as_str().map(|s| (f.name().to_string(), s.to_string())))
                        .collect();
                    metadata.insert(prop.name().to_string(), fields);
                }
                _ => {}
            }
        }
        self.object(idx).enum_metadata = Some(metadata);
    }

    // ————————————————————————————————————————————————————————————————————————
    // FREEZE
    // ————————————————————————————————————————————————————————————————————————

    fn freeze(self, root_idx: usize) -> Schema {
        let file = self.file;
        let ids = Arc::new(self.ids);
        let mut frozen: Vec<Option<Schema>> = vec![None; self.drafts.len()];
        for (idx, draft) in self.drafts.into_iter().enumerate().rev() {
            let Draft { mut object, links, has_pattern_properties } = draft;
            let mut patterns = IndexMap::new();
            for (slot, child_idx) in links {
                let Some(child) = frozen[child_idx].clone() else {
                    continue;
                };
                attach(&mut object, &mut patterns, slot, child);
            }
            if has_pattern_properties {
                object.pattern_properties = Some(PatternProperties::new(patterns));
            }
            object.complete_initialization(ids.clone());
            frozen[idx] = Some(Arc::new(object));
        }
        frozen.swap_remove(root_idx).unwrap_or_else(|| Arc::new(SchemaObject::new(file, "/")))
    }
}

fn attach(object: &mut SchemaObject, patterns: &mut IndexMap<String, Schema>, slot: Slot, child: Schema) {
    match slot {
        Slot::Property(name) => {
            object.properties.insert(name, child);
        }
        Slot::PatternProperty(source) => {
            patterns.insert(source, child);
        }
        Slot::Definition(name) => {
            object.definitions.get_or_insert_with(IndexMap::new).insert(name, child);
        }
        Slot::SchemaDependency(name) => {
            object.schema_dependencies.get_or_insert_with(IndexMap::new).insert(name, child);
        }
        Slot::AdditionalProperties => object.additional_properties_schema = Some(child),
        Slot::PropertyNames => object.property_names_schema = Some(child),
        Slot::Items => object.items_schema = Some(child),
        Slot::ItemsTuple => object.items_schema_list.get_or_insert_with(Vec::new).push(child),
        Slot::AdditionalItems => object.additional_items_schema = Some(child),
        Slot::Contains => object.contains_schema = Some(child),
        Slot::AllOf => object.all_of.get_or_insert_with(Vec::new).push(child),
        Slot::AnyOf => object.any_of.get_or_insert_with(Vec::new).push(child),
        Slot::OneOf => object.one_of.get_or_insert_with(Vec::new).push(child),
        Slot::Not => object.not = Some(child),
        Slot::If => object.if_schema = Some(child),
        Slot::Then => object.then_schema = Some(child),
        Slot::Else => object.else_schema = Some(child),
    }
}

fn non_blank_strings(node: &Node) -> impl Iterator<Item = String> + '_ {
    node.elements()
        .iter()
        .filter_map(Node::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn file() -> FileId {
        FileId::new("mem://reader")
    }

    #[test]
    fn reads_keywords_into_fields() {
        let schema = read_value(
            file(),
            json!({
                "$id": "#root",
                "title": "T",
                "type": "object",
                "required": ["a", " ", "b"],
                "minimum": 1.5,
                "maximum": 10,
                "multipleOf": 2,
                "exclusiveMinimum": true,
                "maxLength": 4,
                "additionalProperties": false,
                "enum": ["x", 1, null],
                "default": {"a": 1},
                "x-intellij-case-insensitive": true,
                "$recursiveAnchor": true
            }),
        );
        assert_eq!(schema.pointer(), "/");
        assert_eq!(schema.id.as_deref(), Some("#root"));
        assert_eq!(schema.title.as_deref(), Some("T"));
        assert_eq!(schema.schema_type, Some(SchemaType::Object));
        assert_eq!(schema.required, Some(BTreeSet::from(["a".to_string(), "b".to_string()])));
        assert_eq!(schema.minimum.as_ref().and_then(Number::as_f64), Some(1.5));
        assert_eq!(schema.maximum.as_ref().and_then(Number::as_i64), Some(10));
        assert_eq!(schema.multiple_of.as_ref().and_then(Number::as_i64), Some(2));
        assert!(schema.is_exclusive_minimum);
        assert_eq!(schema.max_length, Some(4));
        assert!(schema.has_own_extra_property_prohibition());
        assert_eq!(schema.enum_values.as_ref().map(Vec::len), Some(3));
        assert_eq!(schema.default, Some(json!({"a": 1})));
        assert!(schema.force_case_insensitive);
        assert!(schema.is_recursive_anchor);
        assert_eq!(schema.resolve_id("#root"), Some("/"));
    }

    #[test]
    fn nested_schemas_get_pointers() {
        let schema = read_value(
            file(),
            json!({
                "properties": {"a/b": {"type": "string"}, "flag": true, "skip": 3},
                "items": [{"type": "integer"}, 4, {"type": "null"}],
                "allOf": [{"type": "object"}, {"required": ["x"]}],
                "dependencies": {"a": ["b"], "c": {"required": ["d"]}},
                "patternProperties": {"^x-": {"type": "boolean"}},
                "if": {"required": ["k"]},
                "then": {"required": ["v"]}
            }),
        );
        assert_eq!(schema.properties["a/b"].pointer(), "/properties/a~1b");
        assert_eq!(schema.properties["flag"].pointer(), "/properties/flag");
        assert!(!schema.properties.contains_key("skip"));

        let tuple = schema.items_schema_list.as_ref().unwrap();
        let pointers: Vec<&str> = tuple.iter().map(|s| s.pointer()).collect();
        assert_eq!(pointers, vec!["/items/0", "/items/2"]);

        let all_of = schema.all_of.as_ref().unwrap();
        assert_eq!(all_of[1].pointer(), "/allOf/1");
        assert_eq!(schema.property_dependencies.as_ref().unwrap()["a"], vec!["b".to_string()]);
        assert_eq!(schema.schema_dependencies.as_ref().unwrap()["c"].pointer(), "/dependencies/c");
        assert_eq!(schema.matching_pattern_property("x-y").unwrap().pointer(), "/patternProperties/^x-");

        let triples = schema.if_then_else.as_ref().unwrap();
        assert_eq!(triples[0].condition.pointer(), "/if");
        assert_eq!(triples[0].then_branch.as_ref().unwrap().pointer(), "/then");
    }

    #[test]
    fn unknown_keywords_become_definitions() {
        let schema = read_value(
            file(),
            json!({"$defs": {"d": {"type": "null"}}, "components": {"thing": {"type": "string"}}}),
        );
        let defs = schema.definitions.as_ref().unwrap();
        assert_eq!(defs["d"].pointer(), "/definitions/d");
        let components = &defs["components"];
        assert_eq!(components.pointer(), "/components");
        let thing = &components.definitions.as_ref().unwrap()["thing"];
        assert_eq!(thing.pointer(), "/components/thing");
        assert_eq!(thing.schema_type, Some(SchemaType::String));
    }

    #[test]
    fn type_arrays_become_variants() {
        let schema = read_value(file(), json!({"type": ["string", "null", "bogus", ""]}));
        assert_eq!(schema.schema_type, None);
        assert_eq!(schema.type_variants, Some(TypeSet::from([SchemaType::String, SchemaType::Null])));
    }

    #[test]
    fn cirjson_text_is_read_without_ids() {
        let text = r#"{"__cirJsonId__": "1", "type": "array", "items": {"__cirJsonId__": "2", "type": "string"}}"#;
        let schema = read_text(file(), text, Dialect::CirJson).unwrap();
        assert_eq!(schema.schema_type, Some(SchemaType::Array));
        assert_eq!(schema.items_schema.as_ref().unwrap().schema_type, Some(SchemaType::String));

        let err = read_text(file(), "{", Dialect::Json).unwrap_err();
        assert!(matches!(err, SchemaError::Malformed { .. }));
    }
}
