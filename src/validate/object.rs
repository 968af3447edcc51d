//! Object instances: members, required names, counts and dependencies.
use std::collections::HashSet;

use indexmap::IndexSet;

use crate::document::Node;
use crate::schema::{Schema, SchemaObject};
use crate::validate::checker::Checker;
use crate::validate::diagnostic::{FixableIssueKind, IssueData, MissingProperties, MissingProperty, Priority, ValidationError};
use crate::variants::StepOutcome;
use crate::variants::step::property_step;

pub(crate) fn check_object(node: &Node, schema: &Schema, checker: &mut Checker<'_>) {
    if !node.is_object() {
        return;
    }
    let mut present: HashSet<&str> = HashSet::new();

    for property in node.properties() {
        let name = property.name();
        if let Some(names_schema) = &schema.property_names_schema {
            let result = checker.resolve(names_schema);
            checker.check_with_result(&property.name_node(), &result);
        }

        match property_step(name, schema, false) {
            StepOutcome::No if !present.contains(name) => checker.error(
                &property.anchor(),
                ValidationError::fixable(
                    format!("Property '{name}' is not allowed"),
                    FixableIssueKind::ProhibitedProperty,
                    Some(IssueData::ProhibitedProperty { name: name.to_string() }),
                    Priority::Low,
                ),
            ),
            StepOutcome::Unsure(child) => {
                for value in property.values() {
                    checker.check_with_variants(&child, value);
                }
            }
            _ => {}
        }
        present.insert(name);
    }

    report_missing_optional(node, schema, &present, checker);

    if !checker.options().force_strict {
        return;
    }

    if let Some(required) = &schema.required {
        let missing: IndexSet<&str> =
            required.iter().map(String::as_str).filter(|name| !present.contains(name)).collect();
        if !missing.is_empty() {
            let data = missing_properties(schema, &missing, checker);
            checker.error(
                node.anchor(),
                ValidationError::fixable(
                    format!("Missing required {}", data.message(false)),
                    FixableIssueKind::MissingProperty,
                    Some(IssueData::MissingProperties(data)),
                    Priority::MissingProps,
                ),
            );
        }
    }

    let count = node.properties().len() as u64;
    if let Some(min) = schema.min_properties.filter(|min| count < *min) {
        checker.report(node.anchor(), format!("Number of properties is less than {min}"), Priority::Low);
    }
    if let Some(max) = schema.max_properties.filter(|max| count > *max) {
        checker.report(node.anchor(), format!("Number of properties is greater than {max}"), Priority::Low);
    }

    for (trigger, dependencies) in schema.property_dependencies.iter().flatten() {
        if !present.contains(trigger.as_str()) {
            continue;
        }
        let missing: IndexSet<&str> =
            dependencies.iter().map(String::as_str).filter(|name| !present.contains(name)).collect();
        if missing.is_empty() {
            continue;
        }
        let data = missing_properties(schema, &missing, checker);
        checker.error(
            node.anchor(),
            ValidationError::fixable(
                format!("Dependency is violated: {} must be specified, since '{trigger}' is specified", data.message(false)),
                FixableIssueKind::MissingProperty,
                Some(IssueData::MissingProperties(data)),
                Priority::MissingProps,
            ),
        );
    }

    for (trigger, dependency) in schema.schema_dependencies.iter().flatten() {
        if present.contains(trigger.as_str()) {
            checker.check_with_variants(dependency, node);
        }
    }
}

/// Completion support: declared properties the object does not have yet.
fn report_missing_optional(node: &Node, schema: &SchemaObject, present: &HashSet<&str>, checker: &mut Checker<'_>) {
    if !checker.options().report_missing_optional_properties {
        return;
    }
    let missing: IndexSet<&str> =
        schema.properties.keys().map(String::as_str).filter(|name| !present.contains(name)).collect();
    if missing.is_empty() {
        return;
    }
    let data = missing_properties(schema, &missing, checker);
    checker.error(
        node.anchor(),
        ValidationError::fixable(
            format!("Missing optional {}", data.message(false)),
            FixableIssueKind::MissingOptionalProperty,
            Some(IssueData::MissingProperties(data)),
            Priority::MissingProps,
        ),
    );
}

/// Describe each missing name with its expected type and a suggested value
/// taken from `default`, the parent's `example`, or a lone enum literal.
fn missing_properties(schema: &SchemaObject, names: &IndexSet<&str>, checker: &Checker<'_>) -> MissingProperties {
    let mut properties = Vec::with_capacity(names.len());
    for &name in names {
        let property_schema = declared_schema(schema, name);
        let mut default_value = property_schema
            .and_then(|s| s.default.as_ref())
            .or_else(|| schema.example.as_ref().and_then(|example| example.get(name)))
            .map(ToString::to_string);
        let mut enum_items_count = 0;
        let mut property_type = None;

        if let Some(property_schema) = property_schema {
            let mut resolved = None;
            match enum_default(property_schema, &mut enum_items_count) {
                Some(value) => default_value = Some(value),
                None => {
                    let result = checker.resolve(property_schema);
                    if let [only] = result.schemas.as_slice() {
                        if let Some(value) = enum_default(only, &mut enum_items_count) {
                            default_value = Some(value);
                        }
                    }
                    resolved = Some(result);
                }
            }

            property_type = property_schema.schema_type.or_else(|| {
                let result = resolved.unwrap_or_else(|| checker.resolve(property_schema));
                match result.schemas.as_slice() {
                    [only] => only.schema_type,
                    _ => None,
                }
            });
        }

        properties.push(MissingProperty { name: name.to_string(), property_type, default_value, enum_items_count });
    }
    MissingProperties { properties }
}

fn declared_schema<'s>(schema: &'s SchemaObject, name: &str) -> Option<&'s Schema> {
    schema
        .property(name)
        .or_else(|| schema.matching_pattern_property(name))
        .or(schema.additional_properties_schema.as_ref())
}

fn enum_default(schema: &SchemaObject, count: &mut usize) -> Option<String> {
    let values = schema.enum_values.as_ref()?;
    *count = values.len();
    values.first().map(|v| v.plain_text())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ComplianceOptions;
    use crate::document::Document;
    use crate::reader::read_value;
    use crate::resolve::{EngineContext, InMemorySchemaService};
    use crate::schema::{FileId, SchemaType};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn run(schema: serde_json::Value, instance: serde_json::Value, options: ComplianceOptions) -> Vec<(String, ValidationError)> {
        let ctx = EngineContext::new(InMemorySchemaService::new());
        let root = read_value(FileId::new("mem://object"), schema);
        ctx.adopt_root(&root);
        let doc = Document::from_json(instance);
        let mut checker = Checker::new(&ctx, options);
        checker.check_by_schema(doc.root(), &root);
        checker.into_errors().into_iter().map(|(a, e)| (a.pointer, e)).collect()
    }

    fn strict() -> ComplianceOptions {
        ComplianceOptions::default().with_force_strict()
    }

    #[test]
    fn required_names_are_aggregated() {
        let errors = run(json!({"required": ["a", "b"]}), json!({}), strict());
        assert_eq!(errors.len(), 1);
        let (pointer, error) = &errors[0];
        assert_eq!(pointer, "/");
        assert_eq!(error.message, "Missing required properties 'a', 'b'");
        let Some(IssueData::MissingProperties(data)) = &error.data else {
            panic!("expected missing properties, got {:?}", error.data);
        };
        assert_eq!(data.names().collect::<Vec<_>>(), vec!["a", "b"]);

        assert!(run(json!({"required": ["a", "b"]}), json!({}), ComplianceOptions::default()).is_empty());
    }

    #[test]
    fn closed_objects_reject_unknown_members() {
        let errors = run(
            json!({"properties": {"a": {"type": "integer"}}, "additionalProperties": false}),
            json!({"a": "x", "b": 1}),
            ComplianceOptions::default(),
        );
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].0, "/a");
        assert_eq!(errors[0].1.priority, Priority::TypeMismatch);
        assert_eq!(errors[1].0, "/b");
        assert_eq!(errors[1].1.message, "Property 'b' is not allowed");
        assert_eq!(errors[1].1.data, Some(IssueData::ProhibitedProperty { name: "b".into() }));
    }

    #[test]
    fn counts_and_dependencies() {
        let schema = json!({
            "minProperties": 2,
            "dependencies": {"card": ["billing"], "extra": {"required": ["note"]}}
        });
        let errors = run(schema.clone(), json!({"card": 1}), strict());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].1.message, "Number of properties is less than 2");

        let errors = run(schema.clone(), json!({"card": 1, "x": 2}), strict());
        assert_eq!(errors[0].1.message, "Dependency is violated: property 'billing' must be specified, since 'card' is specified");

        let errors = run(schema, json!({"extra": 1, "x": 2}), strict());
        assert_eq!(errors[0].1.message, "Missing required property 'note'");
    }

    #[test]
    fn property_names_are_checked_on_the_name() {
        let errors = run(
            json!({"propertyNames": {"pattern": "^[a-z]+$"}}),
            json!({"ok": 1, "Bad": 2}),
            ComplianceOptions::default(),
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, "/Bad");
        assert_eq!(errors[0].1.message, "String violates the pattern: '^[a-z]+$'");
    }

    #[test]
    fn missing_optional_properties_carry_defaults() {
        let options = ComplianceOptions { report_missing_optional_properties: true, ..ComplianceOptions::default() };
        let errors = run(
            json!({"properties": {"mode": {"enum": ["fast"]}, "level": {"type": "integer", "default": 3}}}),
            json!({}),
            options,
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].1.kind, FixableIssueKind::MissingOptionalProperty);
        assert_eq!(errors[0].1.message, "Missing optional properties 'mode' = fast, 'level'");
        let Some(IssueData::MissingProperties(data)) = &errors[0].1.data else {
            panic!("expected missing properties");
        };
        assert_eq!(data.properties[1].property_type, Some(SchemaType::Integer));
        assert_eq!(data.properties[1].default_value.as_deref(), Some("3"));
    }
}
