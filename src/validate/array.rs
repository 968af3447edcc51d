//! Array instances: items, tuples, `contains`, uniqueness and sizes.
use indexmap::IndexMap;

use crate::document::Node;
use crate::schema::Schema;
use crate::validate::checker::{Checker, check_by_match_result};
use crate::validate::diagnostic::Priority;

pub(crate) fn check_array(node: &Node, schema: &Schema, checker: &mut Checker<'_>) {
    if !node.is_array() {
        return;
    }
    let elements = node.elements();

    if schema.is_unique_items() {
        let mut by_text: IndexMap<String, Vec<&Node>> = IndexMap::new();
        for element in elements {
            by_text.entry(element.validation_text()).or_default().push(element);
        }
        for duplicates in by_text.values().filter(|group| group.len() > 1) {
            for item in duplicates {
                checker.report(item.anchor(), "Item is not unique", Priority::TypeMismatch);
            }
        }
    }

    if let Some(contains) = &schema.contains_schema {
        let result = checker.resolve(contains);
        let matched = elements.iter().any(|item| {
            check_by_match_result(checker.ctx(), item, &result, checker.options()).is_some_and(|c| c.is_valid())
        });
        if !matched {
            checker.report(node.anchor(), "No match for 'contains' rule", Priority::Medium);
        }
    }

    if let Some(items) = &schema.items_schema {
        for item in elements {
            checker.check_with_variants(items, item);
        }
    } else if let Some(tuple) = &schema.items_schema_list {
        for (idx, item) in elements.iter().enumerate() {
            if let Some(item_schema) = tuple.get(idx) {
                checker.check_with_variants(item_schema, item);
            } else if !schema.additional_items_allowed() {
                checker.report(node.anchor(), "No additional items allowed", Priority::Low);
            } else if let Some(extra) = &schema.additional_items_schema {
                checker.check_with_variants(extra, item);
            }
        }
    }

    let len = elements.len() as u64;
    // `minLength`/`maxLength` also bound arrays
    let lower = [schema.min_items, schema.min_length];
    let upper = [schema.max_items, schema.max_length];
    for min in lower.into_iter().flatten().filter(|min| len < *min) {
        checker.report(node.anchor(), format!("Array is shorter than {min}"), Priority::Low);
    }
    for max in upper.into_iter().flatten().filter(|max| len > *max) {
        checker.report(node.anchor(), format!("Array is longer than {max}"), Priority::Low);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ComplianceOptions;
    use crate::document::Document;
    use crate::reader::read_value;
    use crate::resolve::{EngineContext, InMemorySchemaService};
    use crate::schema::FileId;
    use serde_json::json;

    fn run(schema: serde_json::Value, instance: serde_json::Value) -> Vec<(String, String)> {
        let ctx = EngineContext::new(InMemorySchemaService::new());
        let root = read_value(FileId::new("mem://array"), schema);
        ctx.adopt_root(&root);
        let doc = Document::from_json(instance);
        let mut checker = Checker::new(&ctx, ComplianceOptions::default());
        checker.check_by_schema(doc.root(), &root);
        checker.into_errors().into_iter().map(|(a, e)| (a.pointer, e.message)).collect()
    }

    #[test]
    fn items_apply_to_every_element() {
        let errors = run(json!({"items": {"type": "string"}}), json!(["a", 1, "b", null]));
        let pointers: Vec<&str> = errors.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(pointers, vec!["/1", "/3"]);
    }

    #[test]
    fn tuples_and_extra_items() {
        let closed = json!({"items": [{"type": "integer"}, {"type": "string"}], "additionalItems": false});
        assert!(run(closed.clone(), json!([1, "x"])).is_empty());
        assert_eq!(run(closed, json!([1, "x", true])), vec![("/".to_string(), "No additional items allowed".to_string())]);

        let typed = json!({"items": [{"type": "integer"}], "additionalItems": {"type": "boolean"}});
        assert_eq!(run(typed, json!([1, true, 3])).len(), 1);
    }

    #[test]
    fn uniqueness_and_contains() {
        let errors = run(json!({"uniqueItems": true}), json!([1, 2, 1, {"a": 1}, {"a": 1}]));
        let pointers: Vec<&str> = errors.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(pointers, vec!["/0", "/2", "/3", "/4"]);

        assert!(run(json!({"contains": {"type": "string"}}), json!([1, "a"])).is_empty());
        assert_eq!(
            run(json!({"contains": {"type": "string"}}), json!([1, 2])),
            vec![("/".to_string(), "No match for 'contains' rule".to_string())]
        );
    }

    #[test]
    fn size_bounds() {
        assert_eq!(
            run(json!({"minItems": 2}), json!([1])),
            vec![("/".to_string(), "Array is shorter than 2".to_string())]
        );
        assert_eq!(
            run(json!({"maxItems": 1}), json!([1, 2])),
            vec![("/".to_string(), "Array is longer than 1".to_string())]
        );
    }
}
