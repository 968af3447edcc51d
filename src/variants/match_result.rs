use std::collections::BTreeMap;

use crate::schema::{Schema, SchemaObject};
use crate::variants::tree::VariantsTree;

/// Schemas applying at one instance position: unconditional ones plus
/// groups of mutually exclusive alternatives.
#[derive(Clone, Debug, Default)]
pub struct MatchResult {
    pub schemas: Vec<Schema>,
    pub excluding_schemas: Vec<Vec<Schema>>,
}

impl MatchResult {
    pub fn create(tree: &VariantsTree) -> Self {
        let mut schemas = Vec::new();
        let mut groups: BTreeMap<usize, Vec<Schema>> = BTreeMap::new();
        for id in tree.leaves() {
            let node = tree.node(id);
            if node.is_any() {
                continue;
            }
            let Some(schema) = &node.schema else {
                continue;
            };
            match node.excluding_group {
                Some(group) => groups.entry(group).or_default().push(schema.clone()),
                None => schemas.push(schema.clone()),
            }
        }
        Self { schemas, excluding_schemas: groups.into_values().collect() }
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty() && self.excluding_schemas.iter().all(Vec::is_empty)
    }

    /// Unconditional schemas first, then every alternative.
    pub fn flatten(&self) -> Vec<Schema> {
        self.schemas.iter().chain(self.excluding_schemas.iter().flatten()).cloned().collect()
    }

    /// Whether `schema` itself, or a variant with its key, is among the results.
    pub fn contains(&self, schema: &SchemaObject) -> bool {
        self.schemas
            .iter()
            .chain(self.excluding_schemas.iter().flatten())
            .any(|s| std::ptr::eq(s.as_ref(), schema) || s.key() == schema.key())
    }
}
