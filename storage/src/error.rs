//! Storage error types.
//!
//! Returned by [`KvStore`](crate::KvStore) operations. `NotFound` and `NilValue` are distinct so
//! callers can tell "never set" from "set to nil".

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when using storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("unable to open DB at {path}: {reason}")]
    Open { path: String, reason: String },
    #[error("namespace '{0}' does not exist")]
    NamespaceMissing(&'static str),
    #[error("key not found: {0}")]
    NotFound(String),
    #[error("value is nil for key: {0}")]
    NilValue(String),
    #[error("unable to close DB: timed out after {0:?}")]
    CloseTimeout(Duration),
    #[error("unable to close DB: {0}")]
    Close(String),
    #[error("DB is closed")]
    Closed,
    #[error("DB error: {0}")]
    Engine(#[from] redb::Error),
}

impl From<redb::TransactionError> for StorageError {
    fn from(e: redb::TransactionError) -> Self {
        Self::Engine(e.into())
    }
}

impl From<redb::TableError> for StorageError {
    fn from(e: redb::TableError) -> Self {
        Self::Engine(e.into())
    }
}

impl From<redb::StorageError> for StorageError {
    fn from(e: redb::StorageError) -> Self {
        Self::Engine(e.into())
    }
}

impl From<redb::CommitError> for StorageError {
    fn from(e: redb::CommitError) -> Self {
        Self::Engine(e.into())
    }
}
