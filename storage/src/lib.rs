//! Storage crate: embedded key/value persistence.
//!
//! ## Modules
//!
//! - [`error`] – Storage error types
//! - [`kv_store`] – KvStore (redb, single `global` namespace, bounded-timeout close)

mod error;
mod kv_store;

#[cfg(test)]
mod kv_store_test;

pub use error::StorageError;
pub use kv_store::{KvStore, DEFAULT_TIMEOUT, NAMESPACE};
