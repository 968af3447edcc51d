//! `not` and `if`/`then`/`else`.
use crate::document::Node;
use crate::schema::SchemaObject;
use crate::validate::checker::{Checker, check_by_match_result};
use crate::validate::diagnostic::Priority;

pub(crate) fn check_not(node: &Node, schema: &SchemaObject, checker: &mut Checker<'_>) {
    let Some(negated) = &schema.not else {
        return;
    };
    // a `not` pointing back at its own schema cannot be checked meaningfully
    let points_back = negated.has_ref()
        && checker.ctx().resolve_ref_schema(negated).is_some_and(|target| target.key() == schema.key());
    let result = checker.resolve(negated);
    if points_back || result.contains(schema) {
        return;
    }
    let strict = checker.options().with_force_strict();
    if check_by_match_result(checker.ctx(), node, &result, strict).is_some_and(|c| c.is_valid()) {
        checker.report(node.anchor(), "Validates against 'not' schema", Priority::NotSchema);
    }
}

pub(crate) fn check_if_then_else(node: &Node, schema: &SchemaObject, checker: &mut Checker<'_>) {
    for branch in schema.if_then_else.iter().flatten() {
        let result = checker.resolve(&branch.condition);
        if result.is_empty() {
            continue;
        }
        let strict = checker.options().with_force_strict();
        let Some(condition) = check_by_match_result(checker.ctx(), node, &result, strict) else {
            continue;
        };
        let taken = if condition.is_valid() { &branch.then_branch } else { &branch.else_branch };
        if let Some(taken) = taken {
            checker.check_with_variants(taken, node);
        }
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

    fn messages(schema: serde_json::Value, instance: serde_json::Value) -> Vec<(String, String)> {
        let ctx = EngineContext::new(InMemorySchemaService::new());
        let root = read_value(FileId::new("mem://conditional"), schema);
        ctx.adopt_root(&root);
        let doc = Document::from_json(instance);
        let mut checker = Checker::new(&ctx, ComplianceOptions::default());
        checker.check_by_schema(doc.root(), &root);
        checker.into_errors().into_iter().map(|(a, e)| (a.pointer, e.message)).collect()
    }

    #[test]
    fn not_rejects_matching_values() {
        let schema = json!({"not": {"type": "string"}});
        assert!(messages(schema.clone(), json!(1)).is_empty());
        assert_eq!(messages(schema, json!("x")), vec![("/".into(), "Validates against 'not' schema".into())]);
    }

    #[test]
    fn not_required_uses_strict_mode() {
        let schema = json!({"not": {"required": ["secret"]}});
        assert!(messages(schema.clone(), json!({"open": 1})).is_empty());
        assert_eq!(messages(schema, json!({"secret": 1})).len(), 1);
    }

    #[test]
    fn self_referencing_not_is_skipped() {
        let schema = json!({"not": {"$ref": "#"}});
        assert!(messages(schema, json!(1)).is_empty());
    }

    #[test]
    fn if_routes_into_then_or_else() {
        let schema = json!({
            "if": {"properties": {"kind": {"enum": ["num"]}}, "required": ["kind"]},
            "then": {"properties": {"value": {"type": "number"}}},
            "else": {"properties": {"value": {"type": "string"}}}
        });
        assert!(messages(schema.clone(), json!({"kind": "num", "value": 1})).is_empty());
        assert!(messages(schema.clone(), json!({"kind": "text", "value": "a"})).is_empty());
        let errors = messages(schema, json!({"kind": "num", "value": "a"}));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, "/value");
    }
}
