//! Error type shared by the ingest and query paths.
//!
//! Every failure surfaces as one of a small set of kinds so callers (the CLI,
//! the HTTP layer, the MCP bridge) can react without parsing messages.

use std::io;
use std::path::Path;

/// Errors produced by the collection contract.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or inconsistent caller input: id/text count mismatch,
    /// duplicate ids, empty query text, badly formed collection names.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced directory, file, or collection does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A directory or file could not be read.
    #[error("permission denied: {0}")]
    Permission(String),

    /// The document store rejected an operation. The message is passed
    /// through as-is.
    #[error("store error: {0}")]
    Store(String),

    /// The embedding function failed to produce vectors.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Any other filesystem failure.
    #[error("i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Convenience alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Classify an I/O error raised while touching `path`.
    ///
    /// `NotFound` and `PermissionDenied` map to their dedicated kinds,
    /// invalid UTF-8 maps to [`Error::Validation`], everything else is kept
    /// as [`Error::Io`].
    pub fn from_io(err: io::Error, path: &Path) -> Self {
        let display = path.display().to_string();
        match err.kind() {
            io::ErrorKind::NotFound => Error::NotFound(display),
            io::ErrorKind::PermissionDenied => Error::Permission(display),
            io::ErrorKind::InvalidData => {
                Error::Validation(format!("{} is not valid UTF-8 text", display))
            }
            _ => Error::Io {
                path: display,
                source: err,
            },
        }
    }

    /// Short machine-readable code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "bad_request",
            Error::NotFound(_) => "not_found",
            Error::Permission(_) => "forbidden",
            Error::Store(_) => "store_error",
            Error::Embedding(_) => "embedding_error",
            Error::Io { .. } => "io_error",
        }
    }

    pub fn store(msg: impl std::fmt::Display) -> Self {
        Error::Store(msg.to_string())
    }
}
