use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::error::SchemaError;
use crate::reader;
use crate::resolve::cache::{FileCache, RefCache};
use crate::resolve::cancel::CancellationToken;
use crate::resolve::service::{Fetch, SchemaService};
use crate::schema::{FileId, Schema, SchemaKey};

/// State one logical project shares across callers: the schema service,
/// caches, the modification counter and adopted roots.
pub(crate) struct Shared {
    service: Arc<dyn SchemaService>,
    modifications: AtomicU64,
    pub(crate) files: FileCache,
    pub(crate) refs: RefCache,
    /// Target schema to the schema whose `$ref` pulled it in from another file.
    pub(crate) back_refs: DashMap<SchemaKey, SchemaKey>,
    /// Roots handed in by callers for files the service does not know.
    adopted: DashMap<FileId, Schema>,
}

/// A caller's view of a project: the shared state plus the caller's own
/// cancellation token. Passed explicitly to every entry point. Clones and
/// [`EngineContext::scoped`] views share every cache; dropping the last one
/// drops them.
#[derive(Clone)]
pub struct EngineContext {
    shared: Arc<Shared>,
    cancel: CancellationToken,
}

impl EngineContext {
    pub fn new(service: impl SchemaService + 'static) -> Self {
        Self::with_service(Arc::new(service))
    }

    pub fn with_service(service: Arc<dyn SchemaService>) -> Self {
        let shared = Shared {
            service,
            modifications: AtomicU64::new(0),
            files: FileCache::default(),
            refs: RefCache::default(),
            back_refs: DashMap::new(),
            adopted: DashMap::new(),
        };
        Self { shared: Arc::new(shared), cancel: CancellationToken::new() }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Another view on the same caches, cancelled only through `token`.
    /// Cancelling one view never affects the others, and a cancelled caller
    /// retries through a fresh view.
    pub fn scoped(&self, token: CancellationToken) -> Self {
        Self { shared: Arc::clone(&self.shared), cancel: token }
    }

    pub(crate) fn shared(&self) -> &Shared {
        &self.shared
    }

    pub fn service(&self) -> &dyn SchemaService {
        self.shared.service.as_ref()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn modification_count(&self) -> u64 {
        self.shared.modifications.load(Ordering::Acquire)
    }

    /// Call on every schema source change. All ref results computed under
    /// the previous count become stale at once.
    pub fn bump_modifications(&self) {
        self.shared.modifications.fetch_add(1, Ordering::AcqRel);
    }

    /// Forget the cached graph of `file` and everything resolved through it.
    pub fn invalidate_file(&self, file: &FileId) {
        self.shared.files.invalidate(file);
        self.shared.adopted.remove(file);
        self.shared.back_refs.retain(|target, source| &target.file != file && &source.file != file);
        self.bump_modifications();
    }

    pub fn clear_caches(&self) {
        self.shared.files.clear();
        self.shared.adopted.clear();
        self.shared.back_refs.clear();
        self.bump_modifications();
    }

    /// Make a root the caller built itself reachable for local `$ref`s.
    /// Ignored when the service already serves that file.
    pub fn adopt_root(&self, root: &Schema) {
        if root.is_null_object() || self.shared.service.stamp(root.file()).is_some() {
            return;
        }
        self.shared.adopted.entry(root.file().clone()).or_insert_with(|| root.clone());
    }

    /// Root schema of `file`, read at most once per file revision.
    ///
    /// This is the directly requested path: failures surface as typed errors.
    pub fn schema_for_file(&self, file: &FileId) -> Result<Schema, SchemaError> {
        self.cancel.check()?;
        let Some(stamp) = self.shared.service.stamp(file) else {
            if let Some(root) = self.shared.adopted.get(file) {
                return Ok(root.clone());
            }
            return Err(SchemaError::UnknownFile { file: file.to_string() });
        };
        let (schema, evicted) = self.shared.files.get_or_compute(file, stamp, || {
            self.cancel.check()?;
            match self.shared.service.fetch(file) {
                Fetch::Ready(document) => {
                    tracing::debug!(file = %file, "reading schema graph");
                    let schema = reader::read(file.clone(), document.root());
                    // a result observed under cancellation is discarded
                    self.cancel.check()?;
                    Ok(schema)
                }
                Fetch::Pending => Err(SchemaError::Pending { file: file.to_string() }),
                Fetch::Failed(err) => Err(err),
            }
        })?;
        if evicted {
            self.bump_modifications();
        }
        Ok(schema)
    }

    pub(crate) fn back_reference(&self, key: &SchemaKey) -> Option<SchemaKey> {
        self.shared.back_refs.get(key).map(|r| r.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::service::InMemorySchemaService;
    use serde_json::json;

    #[test]
    fn reads_once_per_revision() {
        let service = Arc::new(InMemorySchemaService::new());
        let file = FileId::new("mem://root.json");
        service.insert(file.clone(), json!({"type": "object"}));
        let ctx = EngineContext::with_service(service.clone());

        let first = ctx.schema_for_file(&file).unwrap();
        let again = ctx.schema_for_file(&file).unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(ctx.modification_count(), 0);

        service.insert(file.clone(), json!({"type": "array"}));
        let changed = ctx.schema_for_file(&file).unwrap();
        assert!(!Arc::ptr_eq(&first, &changed));
        assert_eq!(ctx.modification_count(), 1);
    }

    #[test]
    fn typed_failures_for_requested_files() {
        let service = Arc::new(InMemorySchemaService::new());
        let remote = FileId::new("mem://remote.json");
        service.mark_pending(remote.clone());
        let ctx = EngineContext::with_service(service.clone());

        assert!(matches!(
            ctx.schema_for_file(&FileId::new("mem://none")),
            Err(SchemaError::UnknownFile { .. })
        ));
        assert!(matches!(ctx.schema_for_file(&remote), Err(SchemaError::Pending { .. })));

        service.insert(remote.clone(), json!({}));
        assert!(ctx.schema_for_file(&remote).is_ok());
    }

    #[test]
    fn cancelled_reads_are_not_cached() {
        let service = Arc::new(InMemorySchemaService::new());
        let file = FileId::new("mem://a.json");
        service.insert(file.clone(), json!({}));
        let token = CancellationToken::new();
        let ctx = EngineContext::with_service(service).with_cancellation(token.clone());
        token.cancel();
        assert!(matches!(ctx.schema_for_file(&file), Err(SchemaError::Cancelled)));
        assert_eq!(ctx.shared.files.len(), 0);
    }

    #[test]
    fn cancelling_one_view_leaves_the_others_working() {
        let service = Arc::new(InMemorySchemaService::new());
        let file = FileId::new("mem://shared.json");
        service.insert(file.clone(), json!({"type": "object"}));
        let ctx = EngineContext::with_service(service);

        let token = CancellationToken::new();
        let cancelled = ctx.scoped(token.clone());
        token.cancel();
        assert!(matches!(cancelled.schema_for_file(&file), Err(SchemaError::Cancelled)));

        let first = ctx.schema_for_file(&file).unwrap();
        let retry = ctx.scoped(CancellationToken::new());
        assert!(Arc::ptr_eq(&first, &retry.schema_for_file(&file).unwrap()));
        assert_eq!(ctx.shared.files.len(), 1);
    }

    #[test]
    fn adopted_roots_serve_unknown_files() {
        let ctx = EngineContext::new(InMemorySchemaService::new());
        let root = reader::read_value(FileId::new("mem://adhoc"), json!({"type": "string"}));
        ctx.adopt_root(&root);
        assert!(Arc::ptr_eq(&ctx.schema_for_file(root.file()).unwrap(), &root));
    }
}
