//! Error types for the storage engine.
//!
//! Mirrors the teacher crate's nested `StorageError` shape: low-level,
//! structural failures (`EngineError`) are separated from the
//! caller-recoverable outcomes a mutating operation can produce
//! (`CollectionError`), per the error kinds spec'd out for the engine.

use std::collections::HashMap;
use std::io;

use thiserror::Error;

/// Field name -> human readable message, as produced by a
/// [`SchemaValidator`](crate::schema::SchemaValidator).
pub type FieldErrors = HashMap<String, String>;

/// Structural failures: I/O, codec, and page-layout violations. These
/// always propagate to the caller; none of them are locally recoverable.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("page error: {0}")]
    Page(#[from] PageError),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("corrupt page at byte offset {position}: decoded value was not a page tree")]
    CorruptPage { position: u64 },
}

/// Page-layout invariant violations.
#[derive(Debug, Error)]
pub enum PageError {
    #[error(
        "encoded page tree ({encoded} bytes) exceeds page capacity ({capacity} bytes); \
         TREE_SIZE is too large for PAGE_SIZE"
    )]
    Overflow { encoded: usize, capacity: usize },
}

/// Outcome of a mutating collection operation (insert / update / delete).
///
/// `Validation` and `Uniqueness` are locally recoverable: the caller can
/// retry with a different payload. `NoMatch` and `Updater` signal a
/// caller-supplied search or callback did not apply. `Engine` wraps any
/// structural failure, which is not locally recoverable.
#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("validation failed: {0:?}")]
    Validation(FieldErrors),

    #[error("uniqueness conflict on field '{0}'")]
    Uniqueness(String),

    #[error("No Document Matches")]
    NoMatch,

    #[error("{0}")]
    Updater(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl From<io::Error> for CollectionError {
    fn from(value: io::Error) -> Self {
        CollectionError::Engine(EngineError::from(value))
    }
}

impl From<PageError> for CollectionError {
    fn from(value: PageError) -> Self {
        CollectionError::Engine(EngineError::from(value))
    }
}

/// Convenience alias used throughout the storage layer.
pub type EngineResult<T> = Result<T, EngineError>;

/// Convenience alias used by [`Collection`](crate::storage::collection::Collection)'s
/// mutating operations.
pub type CollectionResult<T> = Result<T, CollectionError>;
