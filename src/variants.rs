//! Which schemas apply at a position inside an instance document.
//!
//! [`build_tree`] walks the position one step at a time. Every schema met
//! on the way is expanded through its composition operators, so a node's
//! children are the alternatives that may govern the next step. Leaves are
//! collected into a [`MatchResult`].
pub mod match_result;
pub(crate) mod operation;
pub mod step;
pub mod tree;

use std::collections::VecDeque;

use crate::pointer::PointerPosition;
use crate::resolve::EngineContext;
use crate::schema::Schema;

pub use match_result::MatchResult;
pub use operation::ResolveState;
pub use step::{StepOutcome, do_single_step};
pub use tree::{Mark, NodeId, TreeNode, VariantsTree};

use operation::Operation;
use step::container_type_matches;

/// Build the variants tree of `schema` along `position`.
///
/// With `skip_last_expand` the schema reached by the final step is kept as
/// is instead of being unfolded into its variants.
pub fn build_tree(
    ctx: &EngineContext,
    schema: &Schema,
    position: &PointerPosition,
    skip_last_expand: bool,
) -> VariantsTree {
    let mut tree = VariantsTree::new(schema.clone());
    expand_child_schema(ctx, &mut tree, VariantsTree::ROOT, schema.clone());

    // the root's children are variants of the root itself
    let first: Vec<NodeId> = tree.node(VariantsTree::ROOT).children.clone();
    for &id in &first {
        tree.node_mut(id).position = position.clone();
    }

    let mut queue: VecDeque<NodeId> = first.into();
    while let Some(id) = queue.pop_front() {
        if ctx.cancellation().is_cancelled() {
            tracing::debug!("variant expansion cancelled");
            break;
        }
        let node = tree.node(id);
        if node.is_any() || node.is_nothing() || node.position.is_empty() {
            continue;
        }
        let Some(schema) = node.schema.clone() else {
            continue;
        };
        let step = node.position.clone();

        if !container_type_matches(step.is_object(0), &schema) {
            tree.nothing_child(id);
            continue;
        }

        match do_single_step(&step, &schema, true) {
            StepOutcome::No => tree.nothing_child(id),
            StepOutcome::Yes => tree.any_child(id),
            StepOutcome::Unsure(child) => {
                if step.len() > 1 || !skip_last_expand {
                    expand_child_schema(ctx, &mut tree, id, child);
                } else {
                    tree.schema_child(id, child);
                }
            }
        }
        queue.extend(tree.node(id).children.iter().copied());
    }
    tree
}

/// Resolve into a flat [`MatchResult`].
pub fn detailed_resolve(ctx: &EngineContext, schema: &Schema, position: &PointerPosition) -> MatchResult {
    MatchResult::create(&build_tree(ctx, schema, position, false))
}

fn expand_child_schema(ctx: &EngineContext, tree: &mut VariantsTree, node: NodeId, schema: Schema) {
    if is_interesting(&schema) {
        let operation = Operation::expand(ctx, &schema);
        tree.children_from_operation(node, operation);
    } else {
        tree.schema_child(node, schema);
    }
}

fn is_interesting(schema: &Schema) -> bool {
    schema.any_of.is_some()
        || schema.one_of.is_some()
        || schema.all_of.is_some()
        || schema.reference.is_some()
        || schema.if_then_else.is_some()
}
