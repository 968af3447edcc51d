//! Composition operations: `$ref` chains, `allOf`, `anyOf`, `oneOf`.
//!
//! An operation tree is built top-down (`map`), then folded bottom-up
//! (`reduce`) into a flat any-of group plus a list of one-of groups.
use std::sync::Arc;

use crate::resolve::EngineContext;
use crate::schema::{Schema, SchemaKey, SchemaObject, merge};

/// Why a branch did not resolve normally.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ResolveState {
    #[default]
    Normal,
    /// More than one of `allOf`/`anyOf`/`oneOf` on one schema.
    Conflict,
    /// A `$ref` in the chain did not resolve.
    BrokenDefinition,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OperationKind {
    ProcessDefinitions,
    AllOf,
    AnyOf,
    OneOf,
}

pub(crate) struct Operation {
    kind: OperationKind,
    source: Schema,
    pub(crate) any_of: Vec<Schema>,
    pub(crate) one_of: Vec<Vec<Schema>>,
    children: Vec<Operation>,
    pub(crate) state: ResolveState,
}

impl Operation {
    fn new(kind: OperationKind, source: Schema) -> Self {
        Self { kind, source, any_of: Vec::new(), one_of: Vec::new(), children: Vec::new(), state: ResolveState::Normal }
    }

    /// Fully expand the composition of `schema`.
    pub(crate) fn expand(ctx: &EngineContext, schema: &Schema) -> Self {
        let mut operation = Operation::new(OperationKind::ProcessDefinitions, schema.clone());
        let mut path = Vec::new();
        operation.do_map(ctx, &mut path);
        operation.do_reduce();
        operation
    }

    /// `path` holds the definitions followed on the way down; revisiting one
    /// of them ends that chain.
    fn do_map(&mut self, ctx: &EngineContext, path: &mut Vec<SchemaKey>) {
        let depth = path.len();
        if self.state == ResolveState::Normal {
            self.map(ctx, path);
        }
        for child in &mut self.children {
            child.do_map(ctx, path);
        }
        path.truncate(depth);
    }

    fn do_reduce(&mut self) {
        if self.state != ResolveState::Normal {
            self.children.clear();
            self.any_of.clear();
            self.one_of.clear();
            return;
        }
        for child in &mut self.children {
            child.do_reduce();
        }
        self.reduce();
        self.children.clear();
    }

    fn map(&mut self, ctx: &EngineContext, path: &mut Vec<SchemaKey>) {
        match self.kind {
            OperationKind::ProcessDefinitions => self.map_definitions(ctx, path),
            OperationKind::AllOf => self.map_members(self.source.all_of.clone()),
            OperationKind::AnyOf => self.map_members(self.source.any_of.clone()),
            OperationKind::OneOf => self.map_members(self.source.one_of.clone()),
        }
    }

    fn map_members(&mut self, members: Option<Vec<Schema>>) {
        self.children = members
            .unwrap_or_default()
            .into_iter()
            .map(|member| Operation::new(OperationKind::ProcessDefinitions, member))
            .collect();
    }

    /// Follow the `$ref` chain, merging each target into the running schema.
    /// Each hop resolves against the schema that declared the reference.
    fn map_definitions(&mut self, ctx: &EngineContext, path: &mut Vec<SchemaKey>) {
        let mut current = self.source.clone();
        let mut referrer = self.source.clone();
        while referrer.has_ref() {
            if ctx.cancellation().is_cancelled() {
                self.state = ResolveState::BrokenDefinition;
                return;
            }
            let Some(definition) = ctx.resolve_ref_schema(&referrer) else {
                tracing::debug!(
                    reference = referrer.reference.as_deref().unwrap_or_default(),
                    schema = %referrer.key(),
                    "broken definition"
                );
                self.state = ResolveState::BrokenDefinition;
                return;
            };
            if path.contains(definition.key()) {
                tracing::trace!(schema = %definition.key(), "reference cycle");
                break;
            }
            path.push(definition.key().clone());
            current = Arc::new(merge(&current, &definition, &current));
            referrer = definition;
        }

        match expand_operation(&current) {
            Some(operation) => self.children.push(operation),
            None => self.any_of.push(current),
        }
    }

    fn reduce(&mut self) {
        match self.kind {
            OperationKind::ProcessDefinitions => self.reduce_definitions(),
            OperationKind::AllOf => self.reduce_all_of(),
            OperationKind::AnyOf => self.reduce_any_of(),
            OperationKind::OneOf => self.reduce_one_of(),
        }
    }

    fn reduce_definitions(&mut self) {
        let Some(child) = self.children.first_mut() else {
            return;
        };
        if child.state != ResolveState::Normal {
            self.state = child.state;
            return;
        }
        self.any_of.append(&mut child.any_of);
        self.one_of.append(&mut child.one_of);
    }

    fn reduce_all_of(&mut self) {
        self.any_of.push(self.source.clone());
        for op in self.children.iter().filter(|op| op.state == ResolveState::Normal) {
            let merged_any = and_groups(&op.any_of, &self.any_of);
            let mut merged_exclusive = Vec::new();
            for objects in &self.one_of {
                merged_exclusive.push(and_groups(&op.any_of, objects));
            }
            for objects in &op.one_of {
                merged_exclusive.push(and_groups(objects, &self.any_of));
            }
            for group in &op.one_of {
                for other in &self.one_of {
                    merged_exclusive.push(and_groups(group, other));
                }
            }
            self.any_of = merged_any;
            self.one_of = merged_exclusive;
        }
    }

    fn reduce_any_of(&mut self) {
        for op in self.children.iter().filter(|op| op.state == ResolveState::Normal) {
            self.any_of.extend(and_group(&self.source, &op.any_of));
            for group in &op.one_of {
                self.one_of.push(and_group(&self.source, group));
            }
        }
    }

    /// Every alternative lands in one exclusive group.
    fn reduce_one_of(&mut self) {
        let mut group = Vec::new();
        for op in self.children.iter().filter(|op| op.state == ResolveState::Normal) {
            group.extend(and_group(&self.source, &op.any_of));
            let flattened: Vec<Schema> = op.one_of.iter().flatten().cloned().collect();
            group.extend(and_group(&self.source, &flattened));
        }
        self.one_of.push(group);
    }
}

/// The operation a composed schema needs, if any. Mixed operators degrade
/// to the most permissive one, marked as a conflict.
fn expand_operation(schema: &Schema) -> Option<Operation> {
    let (any, one, all) = (schema.any_of.is_some(), schema.one_of.is_some(), schema.all_of.is_some());
    let (kind, conflict) = match (any, one, all) {
        (true, true, _) | (true, _, true) => (OperationKind::AnyOf, true),
        (false, true, true) => (OperationKind::OneOf, true),
        (true, false, false) => (OperationKind::AnyOf, false),
        (false, true, false) => (OperationKind::OneOf, false),
        (false, false, true) => (OperationKind::AllOf, false),
        (false, false, false) => return None,
    };
    let mut operation = Operation::new(kind, schema.clone());
    if conflict {
        tracing::debug!(schema = %schema.key(), "conflicting composition operators");
        operation.state = ResolveState::Conflict;
    }
    Some(operation)
}

fn and_groups(first: &[Schema], second: &[Schema]) -> Vec<Schema> {
    first.iter().flat_map(|s| and_group(s, second)).collect()
}

/// Intersect `object` with every member of `group`, dropping empty
/// intersections. The results are already expanded, so their own
/// composition lists are cleared.
fn and_group(object: &SchemaObject, group: &[Schema]) -> Vec<Schema> {
    group
        .iter()
        .filter_map(|member| {
            let mut merged = merge(object, member, member);
            if !merged.is_valid_by_exclusion() {
                return None;
            }
            merged.all_of = None;
            merged.any_of = None;
            merged.one_of = None;
            Some(Arc::new(merged))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_value;
    use crate::resolve::InMemorySchemaService;
    use crate::schema::{FileId, SchemaType};
    use serde_json::json;

    fn expand(value: serde_json::Value) -> Operation {
        let ctx = EngineContext::new(InMemorySchemaService::new());
        let root = read_value(FileId::new("mem://op"), value);
        ctx.adopt_root(&root);
        Operation::expand(&ctx, &root)
    }

    #[test]
    fn any_of_merges_enclosing_constraints() {
        let op = expand(json!({"required": ["a"], "anyOf": [{"type": "object"}, {"type": "array"}]}));
        assert_eq!(op.any_of.len(), 2);
        assert!(op.one_of.is_empty());
        assert!(op.any_of.iter().all(|s| s.required.as_ref().is_some_and(|r| r.contains("a"))));
        assert!(op.any_of.iter().all(|s| s.any_of.is_none()));
        assert_eq!(op.any_of[0].pointer(), "/anyOf/0");
    }

    #[test]
    fn one_of_forms_a_single_group() {
        let op = expand(json!({"oneOf": [{"type": "string"}, {"type": "number"}, {"type": "null"}]}));
        assert!(op.any_of.is_empty());
        assert_eq!(op.one_of.len(), 1);
        assert_eq!(op.one_of[0].len(), 3);
    }

    #[test]
    fn all_of_intersects_and_drops_conflicts() {
        let op = expand(json!({
            "allOf": [
                {"anyOf": [{"type": "integer"}, {"type": "string"}]},
                {"type": "number"}
            ]
        }));
        assert_eq!(op.any_of.len(), 1);
        assert_eq!(op.any_of[0].schema_type, Some(SchemaType::Integer));
    }

    #[test]
    fn ref_chain_merges_definitions() {
        let op = expand(json!({
            "definitions": {"a": {"$ref": "#/definitions/b", "required": ["x"]}, "b": {"type": "object"}},
            "$ref": "#/definitions/a"
        }));
        assert_eq!(op.any_of.len(), 1);
        let merged = &op.any_of[0];
        assert_eq!(merged.pointer(), "/");
        assert_eq!(merged.schema_type, Some(SchemaType::Object));
        assert!(merged.required.as_ref().unwrap().contains("x"));
        assert!(!merged.has_ref());
    }

    #[test]
    fn broken_ref_prunes_branch() {
        let op = expand(json!({"anyOf": [{"$ref": "#/definitions/none"}, {"type": "string"}]}));
        assert_eq!(op.any_of.len(), 1);
        assert_eq!(op.any_of[0].schema_type, Some(SchemaType::String));

        let top = expand(json!({"$ref": "#/definitions/none"}));
        assert_eq!(top.state, ResolveState::BrokenDefinition);
    }

    #[test]
    fn mixed_operators_degrade_to_conflict() {
        // Mixed operators are not resolved strictly: the branch is dropped,
        // which leaves the position unconstrained.
        let op = expand(json!({"anyOf": [{"type": "string"}], "oneOf": [{"type": "null"}]}));
        assert_eq!(op.state, ResolveState::Conflict);
        assert!(op.any_of.is_empty() && op.one_of.is_empty());
    }
}
