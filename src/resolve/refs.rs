//! `$ref` and `$recursiveRef` resolution.
use std::collections::HashSet;

use crate::error::SchemaError;
use crate::pointer;
use crate::resolve::cache::RefOutcome;
use crate::resolve::context::EngineContext;
use crate::schema::definition::find_relative_definition;
use crate::schema::{FileId, Schema, SchemaObject};

/// A reference split into an external schema id and a `#/...` pointer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SchemaUrlSplitter<'a> {
    schema_id: Option<&'a str>,
    relative_path: &'a str,
}

impl<'a> SchemaUrlSplitter<'a> {
    pub fn new(reference: &'a str) -> Self {
        if pointer::is_self_reference(Some(reference)) {
            return Self { schema_id: None, relative_path: "" };
        }
        if reference.starts_with("#/") {
            return Self { schema_id: None, relative_path: reference };
        }
        match reference.find("#/") {
            Some(idx) => Self { schema_id: Some(&reference[..idx]), relative_path: &reference[idx..] },
            None => Self {
                schema_id: Some(reference.strip_suffix('#').unwrap_or(reference)),
                relative_path: "",
            },
        }
    }

    pub fn schema_id(&self) -> Option<&'a str> {
        self.schema_id
    }

    pub fn relative_path(&self) -> &'a str {
        self.relative_path
    }

    pub fn is_absolute(&self) -> bool {
        self.schema_id.is_some()
    }
}

enum Resolution {
    Found(Schema),
    Missing,
    /// Not available right now; retried on the next request.
    Pending,
}

impl EngineContext {
    /// Follow `schema`'s `$ref` one hop.
    ///
    /// `None` means the reference is broken. A target whose file is still
    /// being fetched comes back as [`SchemaObject::null_object`].
    pub fn resolve_ref_schema(&self, schema: &Schema) -> Option<Schema> {
        let reference = schema.reference.as_deref().filter(|r| !r.trim().is_empty())?;
        if self.cancellation().is_cancelled() {
            return None;
        }
        let counter = self.modification_count();
        let key = (schema.key().clone(), reference.to_string());
        if let Some(outcome) = self.shared().refs.get(counter, &key) {
            return match outcome {
                RefOutcome::Found(found) => Some(found),
                RefOutcome::Missing => None,
            };
        }

        let outcome = match self.fetch_from_ref_definition(reference, schema, schema.ref_is_recursive) {
            Resolution::Found(found) => {
                if found.file() != schema.file() {
                    self.shared().back_refs.insert(found.key().clone(), schema.key().clone());
                }
                RefOutcome::Found(found)
            }
            Resolution::Missing => RefOutcome::Missing,
            Resolution::Pending => return Some(SchemaObject::null_object()),
        };
        if !self.cancellation().is_cancelled() {
            self.shared().refs.insert(counter, key, outcome.clone());
        }
        match outcome {
            RefOutcome::Found(found) => Some(found),
            RefOutcome::Missing => None,
        }
    }

    fn fetch_from_ref_definition(&self, reference: &str, schema: &Schema, recursive: bool) -> Resolution {
        let Some(file) = self.service().resolve_schema_file(schema) else {
            return Resolution::Missing;
        };
        let splitter = SchemaUrlSplitter::new(reference);

        if let Some(schema_id) = splitter.schema_id() {
            let Some(ref_file) = self.service().find_schema_file_by_reference(schema_id, &file) else {
                tracing::debug!(reference = schema_id, file = %file, "schema file not found by reference");
                return Resolution::Missing;
            };
            return match self.root_for(&ref_file) {
                Ok(root) => self.find_relative(&root, splitter),
                Err(resolution) => resolution,
            };
        }

        let mut root = match self.root_for(&file) {
            Ok(root) => root,
            Err(resolution) => return resolution,
        };
        if recursive {
            let mut seen = HashSet::from([root.file().clone()]);
            while root.is_recursive_anchor {
                let Some(referrer) = self.back_reference(root.key()) else {
                    break;
                };
                if !seen.insert(referrer.file.clone()) {
                    break;
                }
                match self.schema_for_file(&referrer.file) {
                    Ok(outer) => root = outer,
                    Err(_) => break,
                }
            }
        }
        self.find_relative(&root, splitter)
    }

    fn root_for(&self, file: &FileId) -> Result<Schema, Resolution> {
        match self.schema_for_file(file) {
            Ok(root) => Ok(root),
            Err(SchemaError::Pending { .. }) => Err(Resolution::Pending),
            Err(SchemaError::Cancelled) => Err(Resolution::Pending),
            Err(err) => {
                tracing::debug!(file = %file, error = %err, "schema object not found");
                Err(Resolution::Missing)
            }
        }
    }

    fn find_relative(&self, schema: &Schema, splitter: SchemaUrlSplitter<'_>) -> Resolution {
        let path = splitter.relative_path();
        if path.trim().is_empty() {
            let id = splitter.schema_id();
            if pointer::is_self_reference(id) {
                return Resolution::Found(schema.clone());
            }
            if let Some(id) = id.filter(|id| id.starts_with('#')) {
                let Some(resolved) = schema.resolve_id(id) else {
                    return Resolution::Missing;
                };
                let target = format!("#{resolved}");
                if target == id {
                    return Resolution::Missing;
                }
                return self.find_relative(schema, SchemaUrlSplitter::new(&target));
            }
            return Resolution::Found(schema.clone());
        }
        match find_relative_definition(schema, path) {
            Some(definition) => Resolution::Found(definition),
            None => {
                tracing::debug!(reference = path, file = %schema.file(), "definition not found by reference");
                Resolution::Missing
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::service::InMemorySchemaService;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn splits_references() {
        let local = SchemaUrlSplitter::new("#/definitions/a");
        assert_eq!((local.schema_id(), local.relative_path()), (None, "#/definitions/a"));
        let external = SchemaUrlSplitter::new("other.json#/definitions/a");
        assert_eq!((external.schema_id(), external.relative_path()), (Some("other.json"), "#/definitions/a"));
        let whole = SchemaUrlSplitter::new("other.json#");
        assert_eq!((whole.schema_id(), whole.relative_path()), (Some("other.json"), ""));
        let anchor = SchemaUrlSplitter::new("#item");
        assert!(anchor.is_absolute());
        assert_eq!(SchemaUrlSplitter::new("#").schema_id(), None);
    }

    fn context() -> (EngineContext, Arc<InMemorySchemaService>) {
        let service = Arc::new(InMemorySchemaService::new());
        service.insert(
            FileId::new("mem://s/root.json"),
            json!({
                "definitions": {
                    "local": {"type": "string"},
                    "item": {"$id": "#item", "type": "integer"},
                    "outer": {"$ref": "leaf.json#/definitions/leaf"},
                    "broken": {"$ref": "#/definitions/missing"}
                }
            }),
        );
        service.insert(
            FileId::new("mem://s/leaf.json"),
            json!({"definitions": {"leaf": {"type": "boolean"}}}),
        );
        (EngineContext::with_service(service.clone()), service)
    }

    fn definition(ctx: &EngineContext, name: &str) -> Schema {
        let root = ctx.schema_for_file(&FileId::new("mem://s/root.json")).unwrap();
        root.definitions.as_ref().unwrap()[name].clone()
    }

    #[test]
    fn resolves_local_external_and_id_references() {
        let (ctx, _) = context();
        let root = ctx.schema_for_file(&FileId::new("mem://s/root.json")).unwrap();

        let mut local = SchemaObject::new(root.file().clone(), "/probe");
        local.reference = Some("#/definitions/local".into());
        let found = ctx.resolve_ref_schema(&Arc::new(local)).unwrap();
        assert_eq!(found.pointer(), "/definitions/local");

        let mut by_id = SchemaObject::new(root.file().clone(), "/probe2");
        by_id.reference = Some("#item".into());
        let found = ctx.resolve_ref_schema(&Arc::new(by_id)).unwrap();
        assert_eq!(found.pointer(), "/definitions/item");

        let outer = definition(&ctx, "outer");
        let leaf = ctx.resolve_ref_schema(&outer).unwrap();
        assert_eq!(leaf.file().as_str(), "mem://s/leaf.json");
        assert_eq!(ctx.back_reference(leaf.key()).as_ref(), Some(outer.key()));

        assert!(ctx.resolve_ref_schema(&definition(&ctx, "broken")).is_none());
    }

    #[test]
    fn pending_files_yield_null_object_and_are_not_cached() {
        let (ctx, service) = context();
        let leaf = FileId::new("mem://s/leaf.json");
        service.mark_pending(leaf.clone());
        let outer = definition(&ctx, "outer");
        assert!(ctx.resolve_ref_schema(&outer).unwrap().is_null_object());

        service.insert(leaf, json!({"definitions": {"leaf": {"type": "null"}}}));
        let resolved = ctx.resolve_ref_schema(&outer).unwrap();
        assert!(!resolved.is_null_object());
    }

    #[test]
    fn missing_results_are_remembered_until_bumped() {
        let (ctx, service) = context();
        let outer = definition(&ctx, "outer");
        service.remove(&FileId::new("mem://s/leaf.json"));
        assert!(ctx.resolve_ref_schema(&outer).is_none());

        service.insert(FileId::new("mem://s/leaf.json"), json!({"definitions": {"leaf": {}}}));
        assert!(ctx.resolve_ref_schema(&outer).is_none());
        ctx.bump_modifications();
        assert!(ctx.resolve_ref_schema(&outer).is_some());
    }

    #[test]
    fn recursive_reference_walks_back_to_outer_root() {
        let service = Arc::new(InMemorySchemaService::new());
        service.insert(
            FileId::new("mem://r/outer.json"),
            json!({"$recursiveAnchor": true, "properties": {"child": {"$ref": "inner.json"}}, "title": "outer"}),
        );
        service.insert(
            FileId::new("mem://r/inner.json"),
            json!({"$recursiveAnchor": true, "properties": {"again": {"$recursiveRef": "#"}}, "title": "inner"}),
        );
        let ctx = EngineContext::with_service(service);
        let outer = ctx.schema_for_file(&FileId::new("mem://r/outer.json")).unwrap();
        let inner = ctx.resolve_ref_schema(&outer.properties["child"]).unwrap();
        assert_eq!(inner.title.as_deref(), Some("inner"));

        let again = inner.properties["again"].clone();
        assert!(again.ref_is_recursive);
        let target = ctx.resolve_ref_schema(&again).unwrap();
        assert_eq!(target.title.as_deref(), Some("outer"));
    }
}
