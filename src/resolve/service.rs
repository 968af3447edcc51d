//! The schema-file resolution collaborator and two stock implementations.
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::UNIX_EPOCH;

use parking_lot::RwLock;
use serde_json::Value;
use url::Url;

use crate::config::{self, MAX_SCHEMA_LENGTH, SchemaMappings};
use crate::document::{Dialect, Document, cirjson};
use crate::error::{DocumentError, SchemaError};
use crate::pointer;
use crate::schema::{FileId, SchemaObject, SchemaVersion};

/// Revision of a schema source. A change in either half invalidates every
/// cached read of that file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FileStamp {
    pub source: u64,
    pub tree: u64,
}

/// Outcome of asking the service for a document.
#[derive(Debug)]
pub enum Fetch {
    Ready(Arc<Document>),
    /// Known but not available yet (a remote download in flight).
    Pending,
    Failed(SchemaError),
}

/// Host-side knowledge about schema files. The engine never touches the
/// filesystem or network itself.
pub trait SchemaService: Send + Sync {
    /// Target file of `reference` as written in `referent`.
    fn find_schema_file_by_reference(&self, reference: &str, referent: &FileId) -> Option<FileId>;

    fn is_schema_file(&self, file: &FileId) -> bool;

    /// `None` when the file is unknown.
    fn stamp(&self, file: &FileId) -> Option<FileStamp>;

    fn fetch(&self, file: &FileId) -> Fetch;

    /// Backing file of a schema object.
    fn resolve_schema_file(&self, schema: &SchemaObject) -> Option<FileId> {
        if schema.is_null_object() {
            return None;
        }
        Some(schema.file().clone())
    }
}

fn root_id(document: &Document) -> Option<String> {
    let id = document.root().find_property("$id")?.single_value()?.as_str()?;
    let id = pointer::normalize_id(id);
    (!id.is_empty()).then(|| id.to_string())
}

fn root_declares_schema_version(document: &Document) -> bool {
    let declared = document
        .root()
        .find_property("$schema")
        .and_then(|p| p.single_value())
        .and_then(|v| v.as_str());
    SchemaVersion::is_schema_schema_id(declared)
}

// ————————————————————————————————————————————————————————————————————————————
// IN-MEMORY SERVICE
// ————————————————————————————————————————————————————————————————————————————

enum Entry {
    Ready { document: Arc<Document>, revision: u64 },
    Pending { revision: u64 },
}

/// Documents registered by id. Useful for embedding and tests; every
/// registration gets a fresh revision.
#[derive(Default)]
pub struct InMemorySchemaService {
    entries: RwLock<HashMap<FileId, Entry>>,
    aliases: RwLock<HashMap<String, FileId>>,
    revision: AtomicU64,
}

impl InMemorySchemaService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plain JSON schema document.
    pub fn insert(&self, file: FileId, value: Value) {
        self.insert_document(file, Document::from_json(value));
    }

    pub fn insert_text(&self, file: FileId, text: &str, dialect: Dialect) -> Result<(), DocumentError> {
        let document = Document::parse(text, dialect)?;
        self.insert_document(file, document);
        Ok(())
    }

    pub fn insert_document(&self, file: FileId, document: Document) {
        if let Some(id) = root_id(&document) {
            self.aliases.write().insert(id, file.clone());
        }
        let revision = self.next_revision();
        self.entries.write().insert(file, Entry::Ready { document: Arc::new(document), revision });
    }

    /// Announce a file whose content is still on its way.
    pub fn mark_pending(&self, file: FileId) {
        let revision = self.next_revision();
        self.entries.write().insert(file, Entry::Pending { revision });
    }

    pub fn remove(&self, file: &FileId) {
        self.entries.write().remove(file);
        self.aliases.write().retain(|_, target| target != file);
    }

    fn next_revision(&self) -> u64 {
        self.revision.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn lookup(&self, id: &str) -> Option<FileId> {
        let candidate = FileId::new(id);
        if self.entries.read().contains_key(&candidate) {
            return Some(candidate);
        }
        self.aliases.read().get(id).cloned()
    }
}

impl SchemaService for InMemorySchemaService {
    fn find_schema_file_by_reference(&self, reference: &str, referent: &FileId) -> Option<FileId> {
        if reference.starts_with('#') {
            return Some(referent.clone());
        }
        let id = pointer::normalize_id(reference);
        if let Some(file) = self.lookup(id) {
            return Some(file);
        }
        let joined = Url::parse(referent.as_str()).ok()?.join(id).ok()?;
        self.lookup(joined.as_str())
    }

    fn is_schema_file(&self, file: &FileId) -> bool {
        match self.entries.read().get(file) {
            Some(Entry::Ready { document, .. }) => {
                root_declares_schema_version(document) || self.aliases.read().values().any(|f| f == file)
            }
            Some(Entry::Pending { .. }) => true,
            None => false,
        }
    }

    fn stamp(&self, file: &FileId) -> Option<FileStamp> {
        let revision = match self.entries.read().get(file)? {
            Entry::Ready { revision, .. } | Entry::Pending { revision } => *revision,
        };
        Some(FileStamp { source: revision, tree: revision })
    }

    fn fetch(&self, file: &FileId) -> Fetch {
        match self.entries.read().get(file) {
            Some(Entry::Ready { document, .. }) => Fetch::Ready(document.clone()),
            Some(Entry::Pending { .. }) => Fetch::Pending,
            None => Fetch::Failed(SchemaError::UnknownFile { file: file.to_string() }),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// FILESYSTEM SERVICE
// ————————————————————————————————————————————————————————————————————————————

/// Schemas on local disk, identified by `file://` URLs. Remote references
/// are reported as pending; nothing here downloads.
#[derive(Default)]
pub struct FsSchemaService {
    mappings: Option<SchemaMappings>,
    /// Root `$id` values seen so far, pointing at the file declaring them.
    ids: RwLock<HashMap<String, FileId>>,
}

impl FsSchemaService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `mappings` for schema lookup and index the `$id` of every mapped
    /// schema so references by id resolve to local files.
    pub fn with_mappings(mappings: SchemaMappings) -> Self {
        let service = Self { mappings: None, ids: RwLock::new(HashMap::new()) };
        for path in mappings.schema_paths() {
            let Some(file) = Self::file_id(&path) else {
                continue;
            };
            if let Fetch::Failed(err) = service.fetch(&file) {
                tracing::debug!(file = %file, error = %err, "mapped schema not indexed");
            }
        }
        Self { mappings: Some(mappings), ..service }
    }

    pub fn mappings(&self) -> Option<&SchemaMappings> {
        self.mappings.as_ref()
    }

    /// `file://` identity of a local path.
    pub fn file_id(path: &Path) -> Option<FileId> {
        let absolute = std::path::absolute(path).ok()?;
        let url = Url::from_file_path(config::normalize(&absolute)).ok()?;
        Some(FileId::new(url.as_str()))
    }

    pub fn path_of(file: &FileId) -> Option<PathBuf> {
        let url = Url::parse(file.as_str()).ok()?;
        if url.scheme() != "file" {
            return None;
        }
        url.to_file_path().ok()
    }

    /// Schema mapped to `instance`, if any.
    pub fn schema_for_instance(&self, instance: &Path) -> Option<FileId> {
        let path = self.mappings.as_ref()?.schema_for(instance)?;
        Self::file_id(&path)
    }

    fn is_remote(file: &FileId) -> bool {
        let text = file.as_str();
        text.starts_with("http://") || text.starts_with("https://")
    }

    fn read(&self, file: &FileId) -> Result<Document, SchemaError> {
        let name = file.to_string();
        let path = Self::path_of(file).ok_or_else(|| SchemaError::UnknownFile { file: name.clone() })?;
        let metadata = std::fs::metadata(&path).map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => SchemaError::UnknownFile { file: name.clone() },
            _ => SchemaError::Unreadable { file: name.clone(), source },
        })?;
        if metadata.len() > MAX_SCHEMA_LENGTH {
            return Err(SchemaError::TooLarge { file: name, size: metadata.len(), limit: MAX_SCHEMA_LENGTH });
        }
        if metadata.len() == 0 {
            return Err(SchemaError::Empty { file: name });
        }
        let text = std::fs::read_to_string(&path)
            .map_err(|source| SchemaError::Unreadable { file: name.clone(), source })?;
        let dialect = detect_dialect(&path, &text);
        Document::parse(&text, dialect).map_err(|source| SchemaError::Malformed { file: name, source })
    }
}

/// `.cirjson` files are CirJSON; otherwise sniff for the id key.
pub fn detect_dialect(path: &Path, text: &str) -> Dialect {
    let by_extension = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
    match by_extension.as_deref() {
        Some("cirjson") => Dialect::CirJson,
        _ if text.contains(cirjson::ID_KEY) => Dialect::CirJson,
        _ => Dialect::Json,
    }
}

impl SchemaService for FsSchemaService {
    fn find_schema_file_by_reference(&self, reference: &str, referent: &FileId) -> Option<FileId> {
        if reference.starts_with('#') {
            return Some(referent.clone());
        }
        let id = pointer::normalize_id(reference);
        if let Some(file) = self.ids.read().get(id) {
            return Some(file.clone());
        }
        if let Ok(url) = Url::parse(id) {
            return Some(FileId::new(url.as_str()));
        }
        let joined = Url::parse(referent.as_str()).ok()?.join(id).ok()?;
        Some(FileId::new(joined.as_str()))
    }

    fn is_schema_file(&self, file: &FileId) -> bool {
        if self.ids.read().values().any(|f| f == file) {
            return true;
        }
        if let (Some(mappings), Some(path)) = (&self.mappings, Self::path_of(file)) {
            if mappings.schema_paths().any(|p| p == path) {
                return true;
            }
        }
        match self.fetch(file) {
            Fetch::Ready(document) => root_declares_schema_version(&document),
            Fetch::Pending => true,
            Fetch::Failed(_) => false,
        }
    }

    fn stamp(&self, file: &FileId) -> Option<FileStamp> {
        if Self::is_remote(file) {
            return Some(FileStamp { source: 0, tree: 0 });
        }
        let metadata = std::fs::metadata(Self::path_of(file)?).ok()?;
        let modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        Some(FileStamp { source: modified, tree: metadata.len() })
    }

    fn fetch(&self, file: &FileId) -> Fetch {
        if Self::is_remote(file) {
            tracing::debug!(file = %file, "remote schema reference left pending");
            return Fetch::Pending;
        }
        match self.read(file) {
            Ok(document) => {
                if let Some(id) = root_id(&document) {
                    self.ids.write().insert(id, file.clone());
                }
                Fetch::Ready(Arc::new(document))
            }
            Err(err) => Fetch::Failed(err),
        }
    }
}
