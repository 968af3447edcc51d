//! In-memory schema object model.
//!
//! A [`SchemaObject`] is identified by `(file, pointer)` and compared by that
//! key only. Objects are built mutably by the reader or by [`merge`] and are
//! frozen behind an [`Arc`] once published; all sharing happens through
//! [`Schema`] handles.
pub mod definition;
pub mod enum_value;
pub mod kind;
pub mod merge;
pub mod pattern;
pub mod version;

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Number, Value};

pub use enum_value::EnumValue;
pub use kind::{SchemaType, TypeSet};
pub use merge::merge;
pub use pattern::{PatternProperties, StringPattern};
pub use version::SchemaVersion;

/// Shared handle to a frozen schema node.
pub type Schema = Arc<SchemaObject>;

// ————————————————————————————————————————————————————————————————————————————
// IDENTITY
// ————————————————————————————————————————————————————————————————————————————

/// Identity of a schema source: a URL or a path, as the service knows it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(Arc<str>);

impl FileId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `(file, pointer)`: the only thing schema equality looks at.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaKey {
    pub file: FileId,
    pub pointer: String,
}

impl fmt::Display for SchemaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.file, self.pointer)
    }
}

/// One `if` with its optional branches.
#[derive(Clone, Debug)]
pub struct IfThenElse {
    pub condition: Schema,
    pub then_branch: Option<Schema>,
    pub else_branch: Option<Schema>,
}

// ————————————————————————————————————————————————————————————————————————————
// SCHEMA OBJECT
// ————————————————————————————————————————————————————————————————————————————

#[derive(Clone, Debug)]
pub struct SchemaObject {
    key: SchemaKey,

    pub id: Option<String>,
    pub schema_uri: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub html_description: Option<String>,
    pub deprecation_message: Option<String>,
    pub language_injection: Option<String>,
    pub language_injection_prefix: Option<String>,
    pub language_injection_suffix: Option<String>,
    pub default: Option<Value>,
    pub example: Option<Value>,
    pub format: Option<String>,

    pub schema_type: Option<SchemaType>,
    pub type_variants: Option<TypeSet>,

    pub reference: Option<String>,
    pub ref_is_recursive: bool,
    pub is_recursive_anchor: bool,

    pub properties: IndexMap<String, Schema>,
    pub pattern_properties: Option<PatternProperties>,
    pub additional_properties_allowed: Option<bool>,
    /// `file#pointer` of every schema that contributed `additionalProperties: false`.
    pub additional_properties_not_allowed_for: BTreeSet<String>,
    pub additional_properties_schema: Option<Schema>,
    pub property_names_schema: Option<Schema>,
    pub required: Option<BTreeSet<String>>,
    pub min_properties: Option<u64>,
    pub max_properties: Option<u64>,
    pub property_dependencies: Option<IndexMap<String, Vec<String>>>,
    pub schema_dependencies: Option<IndexMap<String, Schema>>,

    pub items_schema: Option<Schema>,
    pub items_schema_list: Option<Vec<Schema>>,
    pub additional_items_allowed: Option<bool>,
    pub additional_items_schema: Option<Schema>,
    pub contains_schema: Option<Schema>,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub unique_items: Option<bool>,

    pub multiple_of: Option<Number>,
    pub maximum: Option<Number>,
    pub is_exclusive_maximum: bool,
    pub exclusive_maximum_number: Option<Number>,
    pub minimum: Option<Number>,
    pub is_exclusive_minimum: bool,
    pub exclusive_minimum_number: Option<Number>,

    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub pattern: Option<StringPattern>,

    pub enum_values: Option<Vec<EnumValue>>,
    pub enum_metadata: Option<IndexMap<String, IndexMap<String, String>>>,

    pub all_of: Option<Vec<Schema>>,
    pub any_of: Option<Vec<Schema>>,
    pub one_of: Option<Vec<Schema>>,
    pub not: Option<Schema>,
    pub if_schema: Option<Schema>,
    pub then_schema: Option<Schema>,
    pub else_schema: Option<Schema>,
    pub if_then_else: Option<Vec<IfThenElse>>,

    pub definitions: Option<IndexMap<String, Schema>>,
    /// `$id` value to the pointer of the object declaring it, per document.
    pub ids: Option<Arc<IndexMap<String, String>>>,

    pub should_validate_against_js_type: bool,
    pub force_case_insensitive: bool,
    pub(crate) is_valid_by_exclusion: bool,
}

impl PartialEq for SchemaObject {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for SchemaObject {}

impl Hash for SchemaObject {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl SchemaObject {
    pub fn new(file: FileId, pointer: impl Into<String>) -> Self {
        Self {
            key: SchemaKey { file, pointer: pointer.into() },
            id: None,
            schema_uri: None,
            title: None,
            description: None,
            html_description: None,
            deprecation_message: None,
            language_injection: None,
            language_injection_prefix: None,
            language_injection_suffix: None,
            default: None,
            example: None,
            format: None,
            schema_type: None,
            type_variants: None,
            reference: None,
            ref_is_recursive: false,
            is_recursive_anchor: false,
            properties: IndexMap::new(),
            pattern_properties: None,
            additional_properties_allowed: None,
            additional_properties_not_allowed_for: BTreeSet::new(),
            additional_properties_schema: None,
            property_names_schema: None,
            required: None,
            min_properties: None,
            max_properties: None,
            property_dependencies: None,
            schema_dependencies: None,
            items_schema: None,
            items_schema_list: None,
            additional_items_allowed: None,
            additional_items_schema: None,
            contains_schema: None,
            min_items: None,
            max_items: None,
            unique_items: None,
            multiple_of: None,
            maximum: None,
            is_exclusive_maximum: false,
            exclusive_maximum_number: None,
            minimum: None,
            is_exclusive_minimum: false,
            exclusive_minimum_number: None,
            min_length: None,
            max_length: None,
            pattern: None,
            enum_values: None,
            enum_metadata: None,
            all_of: None,
            any_of: None,
            one_of: None,
            not: None,
            if_schema: None,
            then_schema: None,
            else_schema: None,
            if_then_else: None,
            definitions: None,
            ids: None,
            should_validate_against_js_type: false,
            force_case_insensitive: false,
            is_valid_by_exclusion: true,
        }
    }

    /// Sentinel returned while a remote schema is still being fetched.
    pub fn null_object() -> Schema {
        Arc::new(SchemaObject::new(FileId::new(NULL_FILE), "$_NULL_$"))
    }

    pub fn is_null_object(&self) -> bool {
        self.key.file.as_str() == NULL_FILE
    }

    pub fn key(&self) -> &SchemaKey {
        &self.key
    }

    pub fn file(&self) -> &FileId {
        &self.key.file
    }

    pub fn pointer(&self) -> &str {
        &self.key.pointer
    }

    /// False once a merge produced an empty type intersection.
    pub fn is_valid_by_exclusion(&self) -> bool {
        self.is_valid_by_exclusion
    }

    /// Materialize the `if`/`then`/`else` triple and attach the document ids.
    pub fn complete_initialization(&mut self, ids: Arc<IndexMap<String, String>>) {
        if let Some(condition) = &self.if_schema {
            self.if_then_else = Some(vec![IfThenElse {
                condition: condition.clone(),
                then_branch: self.then_schema.clone(),
                else_branch: self.else_schema.clone(),
            }]);
        }
        self.ids = Some(ids);
    }

    pub fn resolve_id(&self, id: &str) -> Option<&str> {
        self.ids.as_ref()?.get(id).map(String::as_str)
    }

    pub fn has_ref(&self) -> bool {
        self.reference.as_deref().is_some_and(|r| !r.trim().is_empty())
    }

    pub fn additional_properties_allowed(&self) -> bool {
        self.additional_properties_allowed.unwrap_or(true)
    }

    /// Record `additionalProperties: <allowed>`; a prohibition is attributed
    /// to this node.
    pub fn set_additional_properties_allowed(&mut self, allowed: bool) {
        self.additional_properties_allowed = Some(allowed);
        if !allowed {
            let slot = self.own_slot();
            self.additional_properties_not_allowed_for.insert(slot);
        }
    }

    pub fn additional_items_allowed(&self) -> bool {
        self.additional_items_allowed.unwrap_or(true)
    }

    /// `additionalProperties: false` was declared on this very node rather
    /// than merged in from elsewhere.
    pub fn has_own_extra_property_prohibition(&self) -> bool {
        !self.additional_properties_allowed() && self.additional_properties_not_allowed_for.contains(&self.own_slot())
    }

    pub(crate) fn own_slot(&self) -> String {
        format!("{}{}", self.key.file, self.key.pointer)
    }

    pub fn property(&self, name: &str) -> Option<&Schema> {
        self.properties.get(name)
    }

    pub fn matching_pattern_property(&self, name: &str) -> Option<&Schema> {
        self.pattern_properties.as_ref()?.schema_for(name)
    }

    pub fn is_unique_items(&self) -> bool {
        self.unique_items == Some(true)
    }

    // ---- constraint groups ----

    pub fn has_object_checks(&self) -> bool {
        !self.properties.is_empty()
            || self.property_names_schema.is_some()
            || self.property_dependencies.is_some()
            || self.pattern_properties.is_some()
            || self.required.is_some()
            || self.min_properties.is_some()
            || self.max_properties.is_some()
    }

    pub fn has_numeric_checks(&self) -> bool {
        self.multiple_of.is_some()
            || self.exclusive_maximum_number.is_some()
            || self.exclusive_minimum_number.is_some()
            || self.maximum.is_some()
            || self.minimum.is_some()
    }

    pub fn has_string_checks(&self) -> bool {
        self.pattern.is_some() || self.format.is_some()
    }

    pub fn has_array_checks(&self) -> bool {
        self.is_unique_items()
            || self.contains_schema.is_some()
            || self.items_schema.is_some()
            || self.items_schema_list.is_some()
            || self.min_items.is_some()
            || self.max_items.is_some()
    }

    // ---- descriptions ----

    /// Declared type, a single variant, or a guess from the constraints used.
    pub fn guess_type(&self) -> Option<SchemaType> {
        if let Some(t) = self.schema_type {
            return Some(t);
        }
        if let Some(variants) = &self.type_variants {
            match variants.len() {
                1 => return variants.first().copied(),
                n if n >= 2 => return None,
                _ => {}
            }
        }
        let groups = [
            (self.has_object_checks(), SchemaType::Object),
            (self.has_numeric_checks(), SchemaType::Number),
            (self.has_string_checks(), SchemaType::String),
            (self.has_array_checks(), SchemaType::Array),
        ];
        let mut present = groups.iter().filter(|(has, _)| *has);
        match (present.next(), present.next()) {
            (Some((_, t)), None) => Some(*t),
            _ => None,
        }
    }

    pub fn type_description(&self, short: bool) -> Option<String> {
        if let Some(t) = self.schema_type {
            return Some(t.description().to_string());
        }
        if let Some(desc) = self.type_variants.as_ref().and_then(|v| kind::types_description(short, v)) {
            return Some(desc);
        }
        if let Some(values) = &self.enum_values {
            if short {
                return Some("enum".to_string());
            }
            let parts: Vec<String> = values.iter().map(ToString::to_string).collect();
            return Some(parts.join(" | "));
        }
        self.guess_type().map(|t| t.description().to_string())
    }
}

const NULL_FILE: &str = "null:///";
