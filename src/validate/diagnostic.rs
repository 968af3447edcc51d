//! Validation findings and their structured payloads.
use serde::Serialize;

use crate::document::Anchor;
use crate::schema::SchemaType;

/// Severity used to rank overlapping findings, most severe first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    NotSchema,
    TypeMismatch,
    Medium,
    MissingProps,
    Low,
}

/// What a quick-fix collaborator could do about a finding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FixableIssueKind {
    MissingProperty,
    MissingOptionalProperty,
    MissingOneOfProperty,
    MissingAnyOfProperty,
    ProhibitedProperty,
    NonEnumValue,
    ProhibitedType,
    TypeMismatch,
    #[default]
    None,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum IssueData {
    ProhibitedProperty { name: String },
    TypeMismatch { expected: Vec<SchemaType> },
    MissingProperties(MissingProperties),
    MissingOneOf { options: Vec<MissingProperties> },
}

/// One property an object lacks, with what is known about its value.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MissingProperty {
    pub name: String,
    pub property_type: Option<SchemaType>,
    /// Suggested value text.
    pub default_value: Option<String>,
    pub enum_items_count: usize,
}

impl MissingProperty {
    fn display_name(&self) -> String {
        match (&self.default_value, self.enum_items_count) {
            (Some(value), 1) => format!("'{}' = {value}", self.name),
            _ => format!("'{}'", self.name),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MissingProperties {
    pub properties: Vec<MissingProperty>,
}

impl MissingProperties {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|p| p.name.as_str())
    }

    /// `property 'a'` or `properties 'a', 'b'`. Names with a known single
    /// value sort first. `trim` keeps the first three.
    pub fn message(&self, trim: bool) -> String {
        if let [single] = self.properties.as_slice() {
            return format!("property {}", single.display_name());
        }
        let mut names: Vec<String> = self.properties.iter().map(MissingProperty::display_name).collect();
        names.sort_by(|a, b| b.contains('=').cmp(&a.contains('=')).then_with(|| a.cmp(b)));
        let trimmed = trim && names.len() > 3;
        if trimmed {
            names.truncate(3);
        }
        let mut joined = names.join(", ");
        if trimmed {
            joined.push_str(", ...");
        }
        format!("properties {joined}")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ValidationError {
    pub message: String,
    pub kind: FixableIssueKind,
    pub data: Option<IssueData>,
    pub priority: Priority,
}

impl ValidationError {
    pub fn new(message: impl Into<String>, priority: Priority) -> Self {
        Self { message: message.into(), kind: FixableIssueKind::None, data: None, priority }
    }

    pub fn fixable(message: impl Into<String>, kind: FixableIssueKind, data: Option<IssueData>, priority: Priority) -> Self {
        Self { message: message.into(), kind, data, priority }
    }
}

/// A ranked finding attached to an instance node.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Diagnostic {
    pub anchor: Anchor,
    #[serde(flatten)]
    pub error: ValidationError,
}

impl Diagnostic {
    pub fn message(&self) -> &str {
        &self.error.message
    }

    pub fn priority(&self) -> Priority {
        self.error.priority
    }
}
