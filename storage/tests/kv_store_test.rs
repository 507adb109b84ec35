//! Integration tests for [`storage::KvStore`].
//!
//! Covers get/put/delete/keys/purge semantics, the nil-vs-missing distinction, namespace
//! re-initialization, lock timeout on open, and reopening persisted data. Each test uses a
//! fresh database file in a temp dir.

use std::time::Duration;

use storage::{KvStore, StorageError};
use tempfile::TempDir;

fn open_store() -> (TempDir, KvStore) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let store = KvStore::open(dir.path().join("bot.db"), Duration::from_secs(1))
        .expect("Failed to open store");
    (dir, store)
}

/// **Test: Get on a key that was never written.**
///
/// **Setup:** Empty store.
/// **Action:** `get("missing")`.
/// **Expected:** `NotFound`.
#[test]
fn test_get_missing_key_is_not_found() {
    let (_dir, store) = open_store();

    let result = store.get("missing");

    assert!(matches!(result, Err(StorageError::NotFound(k)) if k == "missing"));
}

/// **Test: Put then get returns the stored value, including an empty one.**
///
/// **Setup:** Empty store.
/// **Action:** `put("greeting", b"hello")`, `put("empty", b"")`, then get both.
/// **Expected:** Values equal what was written; the empty value is `Ok(vec![])`, not an error.
#[test]
fn test_put_then_get_round_trips_value() {
    let (_dir, store) = open_store();

    store.put("greeting", b"hello").unwrap();
    store.put("empty", b"").unwrap();

    assert_eq!(store.get("greeting").unwrap(), b"hello".to_vec());
    assert_eq!(store.get("empty").unwrap(), Vec::<u8>::new());
}

/// **Test: Mutating a returned value does not change what is stored.**
///
/// **Setup:** `put("k", b"abc")`.
/// **Action:** Overwrite the returned buffer, then get again.
/// **Expected:** Second get still returns `abc`.
#[test]
fn test_get_returns_owned_copy() {
    let (_dir, store) = open_store();
    store.put("k", b"abc").unwrap();

    let mut first = store.get("k").unwrap();
    first.iter_mut().for_each(|b| *b = b'z');
    first.push(b'!');

    assert_eq!(store.get("k").unwrap(), b"abc".to_vec());
}

/// **Test: A nil value is reported differently from a missing key.**
///
/// **Setup:** `put_nil("nil")`.
/// **Action:** `get("nil")` and `keys()`.
/// **Expected:** `NilValue`; the key is not listed by `keys()`.
#[test]
fn test_nil_value_is_distinct_from_not_found() {
    let (_dir, store) = open_store();
    store.put_nil("nil").unwrap();
    store.put("set", b"1").unwrap();

    assert!(matches!(store.get("nil"), Err(StorageError::NilValue(k)) if k == "nil"));
    assert_eq!(store.keys().unwrap(), vec!["set".to_string()]);
}

/// **Test: Keys are returned in ascending order regardless of write order.**
///
/// **Setup:** Write b, a, c.
/// **Action:** `keys()`.
/// **Expected:** `["a", "b", "c"]`.
#[test]
fn test_keys_sorted() {
    let (_dir, store) = open_store();

    store.put("b", b"1").unwrap();
    store.put("a", b"2").unwrap();
    store.put("c", b"3").unwrap();

    assert_eq!(store.keys().unwrap(), vec!["a", "b", "c"]);
}

/// **Test: Put replaces an existing value.**
#[test]
fn test_put_overwrites() {
    let (_dir, store) = open_store();

    store.put("k", b"old").unwrap();
    store.put("k", b"new").unwrap();

    assert_eq!(store.get("k").unwrap(), b"new".to_vec());
    assert_eq!(store.keys().unwrap().len(), 1);
}

/// **Test: Delete removes a key; deleting a missing key is fine.**
///
/// **Setup:** `put("k", b"v")`.
/// **Action:** `delete("k")`, `get("k")`, `delete("never")`.
/// **Expected:** `NotFound` after delete; deleting a missing key returns `Ok`.
#[test]
fn test_delete() {
    let (_dir, store) = open_store();
    store.put("k", b"v").unwrap();

    store.delete("k").unwrap();

    assert!(matches!(store.get("k"), Err(StorageError::NotFound(_))));
    assert!(store.delete("never").is_ok());
}

/// **Test: After purge every operation fails with NamespaceMissing.**
///
/// **Setup:** Store with one key.
/// **Action:** `purge()`, then get/put/delete/keys/purge.
/// **Expected:** All return `NamespaceMissing`; put does not silently recreate the namespace.
#[test]
fn test_purge_removes_namespace() {
    let (_dir, store) = open_store();
    store.put("k", b"v").unwrap();

    store.purge().unwrap();

    assert!(matches!(store.get("k"), Err(StorageError::NamespaceMissing(_))));
    assert!(matches!(
        store.put("k", b"v"),
        Err(StorageError::NamespaceMissing(_))
    ));
    assert!(matches!(store.delete("k"), Err(StorageError::NamespaceMissing(_))));
    assert!(matches!(store.keys(), Err(StorageError::NamespaceMissing(_))));
    assert!(matches!(store.purge(), Err(StorageError::NamespaceMissing(_))));
}

/// **Test: init_namespace restores a usable, empty namespace after purge.**
#[test]
fn test_init_namespace_after_purge() {
    let (_dir, store) = open_store();
    store.put("k", b"v").unwrap();
    store.purge().unwrap();

    store.init_namespace().unwrap();

    assert!(store.keys().unwrap().is_empty());
    store.put("k", b"again").unwrap();
    assert_eq!(store.get("k").unwrap(), b"again".to_vec());
}

/// **Test: Data survives close and reopen.**
///
/// **Setup:** Put a key, close the store.
/// **Action:** Reopen the same file.
/// **Expected:** Value is still there.
#[tokio::test]
async fn test_reopen_keeps_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bot.db");

    let store = KvStore::open(&path, Duration::from_secs(1)).unwrap();
    store.put("persisted", b"yes").unwrap();
    store.close().await.unwrap();

    let reopened = KvStore::open(&path, Duration::from_secs(1)).unwrap();
    assert_eq!(reopened.get("persisted").unwrap(), b"yes".to_vec());
    reopened.close().await.unwrap();
}

/// **Test: Opening a file already held open fails once the lock timeout elapses.**
///
/// **Setup:** One open store on the file.
/// **Action:** Open the same path again with a 200ms timeout.
/// **Expected:** `Open` error; the first store keeps working.
#[test]
fn test_open_locked_file_times_out() {
    let (dir, store) = open_store();

    let second = KvStore::open(dir.path().join("bot.db"), Duration::from_millis(200));

    assert!(matches!(second, Err(StorageError::Open { .. })));
    store.put("still", b"works").unwrap();
}

/// **Test: Operations after close report Closed.**
#[tokio::test]
async fn test_operations_after_close_fail() {
    let (_dir, store) = open_store();
    store.close().await.unwrap();

    assert!(matches!(store.keys(), Err(StorageError::Closed)));
    assert!(matches!(store.put("k", b"v"), Err(StorageError::Closed)));
}

/// **Test: The store identifies itself as "storage" to the shutdown coordinator.**
#[test]
fn test_component_name() {
    use kvbot_core::Component;

    let (_dir, store) = open_store();
    assert_eq!(Component::name(&store), "storage");
}
