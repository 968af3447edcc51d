//! Reference resolution, schema-file service and engine-wide caches.
//!
//! [`EngineContext`] views share all mutable state, and each carries its own
//! cancellation token. Schema graphs are read once per file revision and
//! shared; `$ref` results are memoized against the context's modification
//! counter, so bumping it invalidates them all.
pub(crate) mod cache;
pub mod cancel;
pub mod context;
pub mod refs;
pub mod service;

pub use cancel::CancellationToken;
pub use context::EngineContext;
pub use refs::SchemaUrlSplitter;
pub use service::{Fetch, FileStamp, FsSchemaService, InMemorySchemaService, SchemaService};
