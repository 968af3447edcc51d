use std::collections::HashMap;

use indexmap::IndexMap;

use crate::document::Anchor;
use crate::validate::diagnostic::{Diagnostic, Priority, ValidationError};

/// Group findings whose anchors overlap, transitively, and keep per group
/// only those with the most severe priority. A finding on a container
/// competes with every finding below it; findings on unrelated anchors never
/// suppress each other. Survivors keep their original order.
pub fn rank(errors: IndexMap<Anchor, ValidationError>) -> Vec<Diagnostic> {
    let diagnostics: Vec<Diagnostic> = errors.into_iter().map(|(anchor, error)| Diagnostic { anchor, error }).collect();

    // group label per finding; joined groups take the older label
    let mut groups: Vec<usize> = (0..diagnostics.len()).collect();
    for (i, diagnostic) in diagnostics.iter().enumerate() {
        for j in 0..i {
            if groups[i] == groups[j] || !diagnostics[j].anchor.overlaps(&diagnostic.anchor) {
                continue;
            }
            let (keep, from) = (groups[i].min(groups[j]), groups[i].max(groups[j]));
            for label in groups.iter_mut().filter(|label| **label == from) {
                *label = keep;
            }
        }
    }

    let mut best: HashMap<usize, Priority> = HashMap::new();
    for (diagnostic, group) in diagnostics.iter().zip(&groups) {
        let priority = diagnostic.priority();
        best.entry(*group).and_modify(|p| *p = (*p).min(priority)).or_insert(priority);
    }
    diagnostics
        .into_iter()
        .zip(groups)
        .filter(|(diagnostic, group)| best.get(group) == Some(&diagnostic.priority()))
        .map(|(diagnostic, _)| diagnostic)
        .collect()
}
