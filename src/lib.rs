//! CirJSON schema composition and validation.
//!
//! Schema files are read into shared [`schema::SchemaObject`] graphs, the
//! composition keywords (`$ref`, `allOf`, `anyOf`, `oneOf`, `if`) are
//! resolved per instance position into [`variants::MatchResult`]s, and
//! instance documents are checked against them with ranked
//! [`validate::Diagnostic`]s as the outcome. All caching lives in an explicit
//! [`resolve::EngineContext`].
pub mod cli;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod path_de;
pub mod pointer;
pub mod reader;
pub mod resolve;
pub mod schema;
pub mod validate;
pub mod variants;

pub use config::ComplianceOptions;
pub use document::{Dialect, Document};
pub use engine::{detailed_resolve, find_properties_that_must_not_be_present, resolve, select_schema, validate};
pub use error::{ConfigError, DocumentError, SchemaError};
pub use resolve::EngineContext;
pub use schema::{FileId, Schema, SchemaObject};
pub use validate::Diagnostic;
