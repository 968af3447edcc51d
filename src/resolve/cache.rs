//! Per-file schema cache and the ref-resolution memo.
use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;

use crate::error::SchemaError;
use crate::resolve::service::FileStamp;
use crate::schema::{FileId, Schema, SchemaKey};

// ---- file cache ----

struct CacheEntry {
    stamp: FileStamp,
    cell: OnceCell<Schema>,
}

/// One schema graph per file and stamp.
///
/// Requesters of the same `(file, stamp)` share one [`OnceCell`]: the first
/// one computes, the rest block on it. A failed or cancelled computation
/// leaves the cell empty, so the next waiter runs its own attempt instead of
/// inheriting the failure.
#[derive(Default)]
pub(crate) struct FileCache {
    entries: DashMap<FileId, Arc<CacheEntry>>,
}

impl FileCache {
    /// Returns the schema and whether an older revision was evicted on the way.
    pub(crate) fn get_or_compute(
        &self,
        file: &FileId,
        stamp: FileStamp,
        compute: impl FnOnce() -> Result<Schema, SchemaError>,
    ) -> Result<(Schema, bool), SchemaError> {
        let mut evicted = false;
        let entry = {
            let mut slot = self
                .entries
                .entry(file.clone())
                .or_insert_with(|| Arc::new(CacheEntry { stamp, cell: OnceCell::new() }));
            if slot.stamp != stamp {
                tracing::debug!(file = %file, "schema file changed, dropping cached graph");
                *slot = Arc::new(CacheEntry { stamp, cell: OnceCell::new() });
                evicted = true;
            }
            slot.clone()
        };
        // the map shard lock is released before computing
        let schema = entry.cell.get_or_try_init(compute)?.clone();
        Ok((schema, evicted))
    }

    pub(crate) fn invalidate(&self, file: &FileId) {
        self.entries.remove(file);
    }

    pub(crate) fn clear(&self) {
        self.entries.clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

// ---- ref cache ----

/// Memoized outcome of one `$ref`. Pending lookups are never stored.
#[derive(Clone, Debug)]
pub(crate) enum RefOutcome {
    Found(Schema),
    Missing,
}

type RefKey = (SchemaKey, String);

struct Generation {
    counter: u64,
    map: HashMap<RefKey, RefOutcome>,
}

/// Ref results tagged with the modification counter they were computed
/// under. A newer counter drops the whole map in one step.
pub(crate) struct RefCache {
    inner: RwLock<Generation>,
}

impl Default for RefCache {
    fn default() -> Self {
        Self { inner: RwLock::new(Generation { counter: 0, map: HashMap::new() }) }
    }
}

impl RefCache {
    pub(crate) fn get(&self, counter: u64, key: &RefKey) -> Option<RefOutcome> {
        let inner = self.inner.read();
        if inner.counter != counter {
            return None;
        }
        inner.map.get(key).cloned()
    }

    pub(crate) fn insert(&self, counter: u64, key: RefKey, outcome: RefOutcome) {
        let mut inner = self.inner.write();
        if inner.counter < counter {
            tracing::debug!(from = inner.counter, to = counter, "ref cache invalidated");
            inner.counter = counter;
            inner.map.clear();
        } else if inner.counter > counter {
            // computed against an older revision
            return;
        }
        inner.map.insert(key, outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaObject;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn schema(pointer: &str) -> Schema {
        Arc::new(SchemaObject::new(FileId::new("mem://c"), pointer))
    }

    #[test]
    fn same_stamp_computes_once() {
        let cache = FileCache::default();
        let file = FileId::new("mem://c");
        let stamp = FileStamp { source: 1, tree: 1 };
        let calls = AtomicUsize::new(0);
        let compute = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(schema("/"))
        };
        let (first, _) = cache.get_or_compute(&file, stamp, compute).unwrap();
        let (second, evicted) = cache.get_or_compute(&file, stamp, || unreachable!()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!evicted);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let (_, evicted) = cache.get_or_compute(&file, FileStamp { source: 2, tree: 1 }, || Ok(schema("/"))).unwrap();
        assert!(evicted);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failure_is_not_cached() {
        let cache = FileCache::default();
        let file = FileId::new("mem://c");
        let stamp = FileStamp { source: 1, tree: 1 };
        let err = cache.get_or_compute(&file, stamp, || Err(SchemaError::Cancelled));
        assert!(matches!(err, Err(SchemaError::Cancelled)));
        let (ok, _) = cache.get_or_compute(&file, stamp, || Ok(schema("/"))).unwrap();
        assert_eq!(ok.pointer(), "/");
    }

    #[test]
    fn concurrent_requesters_share_one_computation() {
        let cache = Arc::new(FileCache::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let file = FileId::new("mem://c");
        let stamp = FileStamp { source: 7, tree: 7 };
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let calls = calls.clone();
                let file = file.clone();
                std::thread::spawn(move || {
                    cache
                        .get_or_compute(&file, stamp, || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(std::time::Duration::from_millis(20));
                            Ok(schema("/"))
                        })
                        .map(|(s, _)| s)
                })
            })
            .collect();
        let results: Vec<Schema> = handles.into_iter().map(|h| h.join().unwrap().unwrap()).collect();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn ref_cache_follows_counter() {
        let cache = RefCache::default();
        let key = (schema("/a").key().clone(), "#/definitions/x".to_string());
        cache.insert(0, key.clone(), RefOutcome::Missing);
        assert!(matches!(cache.get(0, &key), Some(RefOutcome::Missing)));
        assert!(cache.get(1, &key).is_none());

        cache.insert(1, key.clone(), RefOutcome::Found(schema("/x")));
        cache.insert(0, key.clone(), RefOutcome::Missing);
        assert!(matches!(cache.get(1, &key), Some(RefOutcome::Found(s)) if s.pointer() == "/x"));
    }
}
