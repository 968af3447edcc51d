//! One step from a schema into the schema of a child instance value.
use crate::pointer::{PointerPosition, Step};
use crate::schema::{Schema, SchemaObject, SchemaType};

/// What a parent schema says about one child.
#[derive(Clone, Debug)]
pub enum StepOutcome {
    /// The child is forbidden.
    No,
    /// The child is allowed and unconstrained.
    Yes,
    /// The child is governed by this schema.
    Unsure(Schema),
}

impl StepOutcome {
    pub fn schema(&self) -> Option<&Schema> {
        match self {
            StepOutcome::Unsure(schema) => Some(schema),
            _ => None,
        }
    }
}

/// Apply the first step of `position` to `parent`. With `all_branches`
/// property lookups also search the `then` and `else` branches.
pub fn do_single_step(position: &PointerPosition, parent: &SchemaObject, all_branches: bool) -> StepOutcome {
    match position.steps().first() {
        Some(Step::Name(name)) => property_step(name, parent, all_branches),
        Some(Step::Index(idx)) => element_step(*idx, parent),
        None => StepOutcome::Unsure(std::sync::Arc::new(parent.clone())),
    }
}

pub(crate) fn property_step(name: &str, parent: &SchemaObject, all_branches: bool) -> StepOutcome {
    if let Some(child) = parent.property(name) {
        return StepOutcome::Unsure(child.clone());
    }
    if let Some(child) = parent.matching_pattern_property(name) {
        return StepOutcome::Unsure(child.clone());
    }
    if let Some(child) = &parent.additional_properties_schema {
        return StepOutcome::Unsure(child.clone());
    }
    if all_branches {
        // the condition itself never contributes, only its branches
        for branch in parent.if_then_else.iter().flatten() {
            let found = [&branch.then_branch, &branch.else_branch]
                .into_iter()
                .flatten()
                .find_map(|b| b.property(name));
            if let Some(child) = found {
                return StepOutcome::Unsure(child.clone());
            }
        }
    }
    if !parent.additional_properties_allowed() {
        return StepOutcome::No;
    }
    StepOutcome::Yes
}

pub(crate) fn element_step(idx: usize, parent: &SchemaObject) -> StepOutcome {
    if let Some(items) = &parent.items_schema {
        return StepOutcome::Unsure(items.clone());
    }
    if let Some(item) = parent.items_schema_list.as_ref().and_then(|list| list.get(idx)) {
        return StepOutcome::Unsure(item.clone());
    }
    let key = idx.to_string();
    if let Some(child) = parent.property(&key) {
        return StepOutcome::Unsure(child.clone());
    }
    if let Some(child) = parent.matching_pattern_property(&key) {
        return StepOutcome::Unsure(child.clone());
    }
    if let Some(extra) = &parent.additional_items_schema {
        return StepOutcome::Unsure(extra.clone());
    }
    if !parent.additional_items_allowed() {
        return StepOutcome::No;
    }
    StepOutcome::Yes
}

/// Whether `schema` can be a container of the kind the next step needs.
pub(crate) fn container_type_matches(object_step: bool, schema: &SchemaObject) -> bool {
    let required = if object_step { SchemaType::Object } else { SchemaType::Array };
    if let Some(t) = schema.schema_type {
        return t == required;
    }
    if let Some(variants) = &schema.type_variants {
        return variants.contains(&required);
    }
    true
}
