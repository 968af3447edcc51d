//! Typed failures surfaced to callers.
//!
//! Only directly requested inputs fail hard. Problems inside one composition
//! branch (a dangling `$ref`, an invalid pattern) are logged and prune that
//! branch instead.
use thiserror::Error;

/// A schema file could not be turned into a schema graph.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// The service does not know the requested file.
    #[error("unknown schema file `{file}`")]
    UnknownFile {
        /// File identity as given by the caller.
        file: String,
    },

    /// The file exists but could not be read.
    #[error("failed to read schema file `{file}`: {source}")]
    Unreadable {
        file: String,
        #[source]
        source: std::io::Error,
    },

    /// The file is over the size limit.
    #[error("schema file `{file}` is {size} bytes, larger than the {limit} byte limit")]
    TooLarge { file: String, size: u64, limit: u64 },

    #[error("schema file `{file}` is empty")]
    Empty { file: String },

    /// The file is not a well-formed document.
    #[error("schema file `{file}` is malformed: {source}")]
    Malformed {
        file: String,
        #[source]
        source: DocumentError,
    },

    /// A remote file has not been fetched yet.
    #[error("schema file `{file}` is not available yet")]
    Pending { file: String },

    /// The caller's cancellation token fired.
    #[error("schema computation was cancelled")]
    Cancelled,
}

/// An instance or schema document could not be parsed.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("invalid JSON: {0}")]
    Syntax(#[source] serde_json::Error),

    /// CirJSON objects must open with an `__cirJsonId__` string member.
    #[error("object at `{pointer}` has no leading `__cirJsonId__` member")]
    MissingObjectId { pointer: String },

    /// CirJSON arrays must open with a string id element.
    #[error("array at `{pointer}` has no leading string id")]
    MissingArrayId { pointer: String },

    #[error("duplicate CirJSON id `{id}` at `{pointer}`")]
    DuplicateId { id: String, pointer: String },
}

/// A configuration file failed to load.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file `{file}`: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },

    /// Deserialization failed; `path` is the JSON path of the offending field.
    #[error("at JSON path {path} → {message}")]
    Invalid { path: String, message: String },
}
