//! Single-file key/value store backed by redb.
//!
//! All keys live in one flat namespace (the `global` table). Every operation runs in its own
//! transaction. Values are stored as `Option<bytes>` so a deliberately nil value stays
//! distinguishable from a missing key.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use kvbot_core::{close_within, Component};
use redb::{
    Database, DatabaseError, ReadOnlyTable, ReadTransaction, ReadableTable, Table,
    TableDefinition, TableError, TableHandle, WriteTransaction,
};
use tracing::{debug, info, instrument, warn};

use crate::error::StorageError;

/// Name of the single namespace holding every record.
pub const NAMESPACE: &str = "global";

/// Lock-acquisition and close bound used when a zero timeout is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

const GLOBAL: TableDefinition<&str, Option<&[u8]>> = TableDefinition::new(NAMESPACE);

const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(50);

type GlobalTable<'txn> = Table<'txn, &'static str, Option<&'static [u8]>>;

/// Key/value store over a single database file.
///
/// Shared by reference (`Arc<KvStore>`); the engine serializes writers, the inner lock only
/// guards the open/closed handle.
pub struct KvStore {
    db: Arc<RwLock<Option<Database>>>,
    path: PathBuf,
    timeout: Duration,
}

impl KvStore {
    /// Identifier used in shutdown logs.
    pub const NAME: &'static str = "storage";

    /// Opens or creates the database at `path` and makes sure the namespace exists.
    ///
    /// `timeout` bounds waiting for a file lock held by another handle, and later bounds
    /// [`close`](Self::close). A zero timeout falls back to [`DEFAULT_TIMEOUT`].
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, timeout: Duration) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let timeout = if timeout.is_zero() {
            warn!(timeout = ?DEFAULT_TIMEOUT, "Zero DB timeout configured, using default");
            DEFAULT_TIMEOUT
        } else {
            timeout
        };

        debug!(timeout = ?timeout, "Creating DB connection");
        let db = open_with_lock_timeout(&path, timeout)?;
        let store = Self {
            db: Arc::new(RwLock::new(Some(db))),
            path,
            timeout,
        };

        debug!(namespace = NAMESPACE, "Setting the default namespace");
        store.init_namespace().map_err(|e| StorageError::Open {
            path: store.path.display().to_string(),
            reason: format!("unable to create {} namespace: {}", NAMESPACE, e),
        })?;

        info!("DB initiated");
        Ok(store)
    }

    /// Creates the namespace if it does not exist. Needed again after [`purge`](Self::purge).
    pub fn init_namespace(&self) -> Result<(), StorageError> {
        self.with_db(|db| {
            let txn = db.begin_write()?;
            txn.open_table(GLOBAL)?;
            txn.commit()?;
            Ok(())
        })
    }

    /// All keys holding a non-nil value, ascending by byte value.
    pub fn keys(&self) -> Result<Vec<String>, StorageError> {
        debug!("Getting the list of DB current keys");
        let mut keys = self.with_db(|db| {
            let txn = db.begin_read()?;
            let table = read_table(&txn)?;
            let mut keys = Vec::new();
            for entry in table.iter()? {
                let (k, v) = entry?;
                if v.value().is_some() {
                    keys.push(k.value().to_string());
                }
            }
            Ok(keys)
        })?;
        keys.sort();
        Ok(keys)
    }

    /// Returns an owned copy of the value stored under `key`.
    pub fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        debug!(key = %key, "Getting value from DB");
        let value = self.with_db(|db| {
            let txn = db.begin_read()?;
            let table = read_table(&txn)?;
            let guard = table
                .get(key)?
                .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
            match guard.value() {
                Some(v) => Ok(v.to_vec()),
                None => Err(StorageError::NilValue(key.to_string())),
            }
        })?;
        debug!(key = %key, "Got the value");
        Ok(value)
    }

    /// Sets or replaces the value under `key`. An empty slice is a regular value.
    pub fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.insert(key, Some(value))
    }

    /// Stores a nil value under `key`; [`get`](Self::get) then reports
    /// [`StorageError::NilValue`] and [`keys`](Self::keys) skips it.
    pub fn put_nil(&self, key: &str) -> Result<(), StorageError> {
        self.insert(key, None)
    }

    /// Removes `key`. Removing a missing key is not an error.
    pub fn delete(&self, key: &str) -> Result<(), StorageError> {
        debug!(key = %key, "Deleting from DB");
        self.write(|table| {
            table.remove(key)?;
            Ok(())
        })
    }

    /// Drops the whole namespace. Every other operation fails with
    /// [`StorageError::NamespaceMissing`] until [`init_namespace`](Self::init_namespace) runs.
    pub fn purge(&self) -> Result<(), StorageError> {
        warn!(namespace = NAMESPACE, "Purging the namespace from DB");
        self.with_db(|db| {
            let txn = db.begin_write()?;
            if !txn.delete_table(GLOBAL)? {
                txn.abort()?;
                return Err(StorageError::NamespaceMissing(NAMESPACE));
            }
            txn.commit()?;
            Ok(())
        })
    }

    /// Closes the database, waiting at most the configured timeout.
    ///
    /// Waiting for in-flight operations and the engine close both run on a blocking thread; if
    /// the timer fires first this returns [`StorageError::CloseTimeout`] while the close carries
    /// on in the background. Closing an already closed store is a no-op.
    pub async fn close(&self) -> Result<(), StorageError> {
        debug!(path = %self.path.display(), "Closing the DB");
        let db = Arc::clone(&self.db);
        close_blocking_within(self.timeout, move || {
            let taken = db.write().unwrap_or_else(PoisonError::into_inner).take();
            match taken {
                Some(db) => drop(db),
                None => debug!("DB already closed"),
            }
        })
        .await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Handle lock shared with in-flight operations.
    #[cfg(test)]
    pub(crate) fn db_handle(&self) -> Arc<RwLock<Option<Database>>> {
        Arc::clone(&self.db)
    }

    fn insert(&self, key: &str, value: Option<&[u8]>) -> Result<(), StorageError> {
        debug!(key = %key, nil = value.is_none(), "Saving the value to DB");
        self.write(|table| {
            table.insert(key, value)?;
            Ok(())
        })
    }

    fn with_db<T>(
        &self,
        f: impl FnOnce(&Database) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let guard = self.db.read().unwrap_or_else(PoisonError::into_inner);
        let db = guard.as_ref().ok_or(StorageError::Closed)?;
        f(db)
    }

    /// Runs `f` in a write transaction against an existing namespace. Never creates the
    /// namespace; a purged store stays purged.
    fn write<T>(
        &self,
        f: impl FnOnce(&mut GlobalTable<'_>) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        self.with_db(|db| {
            let txn = db.begin_write()?;
            if !namespace_exists(&txn)? {
                txn.abort()?;
                return Err(StorageError::NamespaceMissing(NAMESPACE));
            }
            let out = {
                let mut table = txn.open_table(GLOBAL)?;
                f(&mut table)?
            };
            txn.commit()?;
            Ok(out)
        })
    }
}

#[async_trait]
impl Component for KvStore {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn close(&self) -> anyhow::Result<()> {
        KvStore::close(self).await?;
        Ok(())
    }
}

/// Retries while another handle holds the file lock, up to `timeout`.
fn open_with_lock_timeout(path: &Path, timeout: Duration) -> Result<Database, StorageError> {
    let deadline = Instant::now() + timeout;
    loop {
        match Database::create(path) {
            Ok(db) => return Ok(db),
            Err(DatabaseError::DatabaseAlreadyOpen) if Instant::now() < deadline => {
                std::thread::sleep(LOCK_RETRY_INTERVAL);
            }
            Err(e) => {
                return Err(StorageError::Open {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }
}

fn read_table(
    txn: &ReadTransaction,
) -> Result<ReadOnlyTable<&'static str, Option<&'static [u8]>>, StorageError> {
    match txn.open_table(GLOBAL) {
        Ok(table) => Ok(table),
        Err(TableError::TableDoesNotExist(_)) => Err(StorageError::NamespaceMissing(NAMESPACE)),
        Err(e) => Err(e.into()),
    }
}

fn namespace_exists(txn: &WriteTransaction) -> Result<bool, StorageError> {
    Ok(txn.list_tables()?.any(|t| t.name() == NAMESPACE))
}

/// Runs a blocking close on the blocking pool and races it against `timeout`.
pub(crate) async fn close_blocking_within<F>(timeout: Duration, close: F) -> Result<(), StorageError>
where
    F: FnOnce() + Send + 'static,
{
    let task = tokio::task::spawn_blocking(close);
    match close_within(timeout, task).await {
        Ok(Ok(())) => {
            debug!("DB closed OK");
            Ok(())
        }
        Ok(Err(e)) => Err(StorageError::Close(e.to_string())),
        Err(_) => Err(StorageError::CloseTimeout(timeout)),
    }
}
