//! Query entry points.
//!
//! Everything here takes an [`EngineContext`] explicitly; the context owns
//! the caches, so two contexts never observe each other's schemas.
use std::collections::{BTreeSet, HashSet};

use indexmap::IndexMap;

use crate::config::ComplianceOptions;
use crate::document::{Anchor, Document, Node, NodeKind};
use crate::error::SchemaError;
use crate::pointer::{PointerPosition, Step};
use crate::resolve::EngineContext;
use crate::schema::{Schema, SchemaObject, SchemaType};
use crate::validate::{Checker, Diagnostic, ValidationError, check_by_match_result, rank, types};
use crate::variants::{self, MatchResult};

// ————————————————————————————————————————————————————————————————————————————
// RESOLUTION
// ————————————————————————————————————————————————————————————————————————————

/// Every schema applying at `position`, unconditional ones first.
pub fn resolve(ctx: &EngineContext, root: &Schema, position: &PointerPosition) -> Vec<Schema> {
    detailed_resolve(ctx, root, position).flatten()
}

pub fn detailed_resolve(ctx: &EngineContext, root: &Schema, position: &PointerPosition) -> MatchResult {
    ctx.adopt_root(root);
    variants::detailed_resolve(ctx, root, position)
}

/// The first variant at `position` that the value found there satisfies.
///
/// Below the root, the variant's parent schema must also accept the parent
/// value, so an alternative is only picked when its whole branch fits.
pub fn select_schema(
    ctx: &EngineContext,
    root: &Schema,
    position: &PointerPosition,
    document: &Document,
) -> Option<Schema> {
    ctx.adopt_root(root);
    let tree = variants::build_tree(ctx, root, position, true);
    let schemas = MatchResult::create(&tree).flatten();
    let first = schemas.first().cloned();
    if schemas.len() <= 1 {
        return first;
    }
    let Some(value) = document.node_at(position) else {
        return first;
    };
    let parent_value = match position.steps().split_last() {
        None => None,
        Some((_, parent_steps)) => Some(document.node_at(&PointerPosition::from_steps(parent_steps.to_vec()))?),
    };

    for id in tree.leaves() {
        let leaf = tree.node(id);
        let Some(schema) = &leaf.schema else {
            continue;
        };
        let parent = leaf.parent.map(|p| tree.node(p));
        if parent_value.is_some() && parent.is_some_and(|p| p.is_nothing()) {
            continue;
        }
        if !is_correct(ctx, value, schema) {
            continue;
        }
        match (parent_value, parent.and_then(|p| p.schema.as_ref().filter(|_| !p.is_any()))) {
            (Some(parent_value), Some(parent_schema)) if !is_correct(ctx, parent_value, parent_schema) => continue,
            _ => return Some(schema.clone()),
        }
    }
    None
}

fn is_correct(ctx: &EngineContext, value: &Node, schema: &Schema) -> bool {
    if !types::accepts(schema, SchemaType::of_node(value)) {
        return false;
    }
    adheres_to(ctx, value, schema)
}

fn adheres_to(ctx: &EngineContext, value: &Node, schema: &Schema) -> bool {
    let mut checker = Checker::new(ctx, ComplianceOptions::RELAX_ENUM_CHECK);
    checker.check_by_schema(value, schema);
    checker.is_valid()
}

// ————————————————————————————————————————————————————————————————————————————
// VALIDATION
// ————————————————————————————————————————————————————————————————————————————

/// Validate a whole instance document against `schema`.
///
/// The root is checked first, then every property value in document order
/// against the schemas resolved at its position. A location reported by an
/// earlier pass keeps its first finding; the collected findings are then
/// ranked.
pub fn validate(
    ctx: &EngineContext,
    document: &Document,
    schema: &Schema,
    options: ComplianceOptions,
) -> Result<Vec<Diagnostic>, SchemaError> {
    ctx.adopt_root(schema);
    ctx.cancellation().check()?;

    let mut errors = IndexMap::new();
    let mut root = Checker::new(ctx, options);
    root.check_with_variants(schema, document.root());
    collect(&mut errors, root.into_errors());

    let mut values = Vec::new();
    property_values(document.root(), &PointerPosition::new(), &mut values);
    for (position, node) in values {
        ctx.cancellation().check()?;
        let result = variants::detailed_resolve(ctx, schema, &position);
        if result.is_empty() {
            continue;
        }
        if let Some(checker) = check_by_match_result(ctx, node, &result, options) {
            collect(&mut errors, checker.into_errors());
        }
    }
    ctx.cancellation().check()?;

    let diagnostics = rank(errors);
    tracing::debug!(count = diagnostics.len(), "validated document");
    Ok(diagnostics)
}

fn collect(into: &mut IndexMap<Anchor, ValidationError>, errors: IndexMap<Anchor, ValidationError>) {
    for (anchor, error) in errors {
        into.entry(anchor).or_insert(error);
    }
}

/// Pre-order walk yielding every property value with its position.
fn property_values<'d>(node: &'d Node, position: &PointerPosition, out: &mut Vec<(PointerPosition, &'d Node)>) {
    match node.kind() {
        NodeKind::Object(properties) => {
            for property in properties {
                let mut child = position.clone();
                child.push(Step::Name(property.name().to_string()));
                for value in property.values() {
                    out.push((child.clone(), value));
                    property_values(value, &child, out);
                }
            }
        }
        NodeKind::Array(items) => {
            for (idx, item) in items.iter().enumerate() {
                let mut child = position.clone();
                child.push(Step::Index(idx));
                property_values(item, &child, out);
            }
        }
        _ => {}
    }
}

// ————————————————————————————————————————————————————————————————————————————
// FORBIDDEN PROPERTIES
// ————————————————————————————————————————————————————————————————————————————

/// Names that must not be added to `parent_object`, given the names it
/// already has.
///
/// A name qualifies when it is the only missing entry of a `not: {required}`
/// list, or the only missing entry of an `if: {required}` list whose `then`
/// the object already satisfies. Both `allOf` members and the `if` branch the
/// object currently takes are searched.
pub fn find_properties_that_must_not_be_present(
    ctx: &EngineContext,
    schema: &Schema,
    parent_object: &Node,
    existing: &HashSet<String>,
) -> BTreeSet<String> {
    ctx.adopt_root(schema);
    let mut found = BTreeSet::new();
    effective_schemas(ctx, schema, parent_object, &mut |effective| {
        if let Some(name) = effective.not.as_ref().and_then(|not| single_missing(not, existing)) {
            found.insert(name);
        }
    });

    for branch in schema.if_then_else.iter().flatten() {
        let Some(then) = &branch.then_branch else {
            continue;
        };
        let mut names = BTreeSet::new();
        effective_schemas(ctx, &branch.condition, parent_object, &mut |effective| {
            if let Some(name) = single_missing(effective, existing) {
                names.insert(name);
            }
        });
        if !names.is_empty() && adheres_to(ctx, parent_object, then) {
            found.extend(names);
        }
    }
    found
}

fn single_missing(schema: &SchemaObject, existing: &HashSet<String>) -> Option<String> {
    let mut missing = schema.required.iter().flatten().filter(|name| !existing.contains(*name));
    match (missing.next(), missing.next()) {
        (Some(name), None) => Some(name.clone()),
        _ => None,
    }
}

/// Visit `schema`, its `allOf` members and the `if` branches `parent`
/// currently takes, recursively.
fn effective_schemas(ctx: &EngineContext, schema: &Schema, parent: &Node, visit: &mut dyn FnMut(&SchemaObject)) {
    visit(schema);
    for member in schema.all_of.iter().flatten() {
        effective_schemas(ctx, member, parent, visit);
    }
    for branch in schema.if_then_else.iter().flatten() {
        let taken =
            if adheres_to(ctx, parent, &branch.condition) { &branch.then_branch } else { &branch.else_branch };
        if let Some(taken) = taken {
            effective_schemas(ctx, taken, parent, visit);
        }
    }
}
