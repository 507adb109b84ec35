//! Unit tests for KvStore internals: the close race, close under contention and close idempotence.

use std::time::Duration;

use crate::error::StorageError;
use crate::kv_store::{close_blocking_within, KvStore};

#[tokio::test]
async fn test_close_exceeding_timeout_is_close_timeout() {
    let result = close_blocking_within(Duration::from_millis(20), || {
        std::thread::sleep(Duration::from_millis(500));
    })
    .await;

    match result {
        Err(StorageError::CloseTimeout(t)) => assert_eq!(t, Duration::from_millis(20)),
        other => panic!("expected CloseTimeout, got {:?}", other),
    }
}

#[tokio::test]
async fn test_close_within_timeout_is_ok() {
    let result = close_blocking_within(Duration::from_secs(5), || {}).await;
    assert!(result.is_ok());
}

/// **Test: Close is bounded even while an operation still holds the DB handle.**
///
/// **Setup:** Store with a 100ms timeout; another thread holds the handle for 500ms, as a long
/// `keys()` would.
/// **Action:** `close()`.
/// **Expected:** `CloseTimeout(100ms)` instead of waiting for the operation to finish.
#[tokio::test]
async fn test_close_with_in_flight_operation_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let store = KvStore::open(dir.path().join("bot.db"), Duration::from_millis(100)).unwrap();
    let handle = store.db_handle();
    let (held_tx, held_rx) = std::sync::mpsc::channel();
    let reader = std::thread::spawn(move || {
        let _guard = handle.read().unwrap();
        held_tx.send(()).unwrap();
        std::thread::sleep(Duration::from_millis(500));
    });
    held_rx.recv().unwrap();

    let result = store.close().await;

    assert!(matches!(
        result,
        Err(StorageError::CloseTimeout(t)) if t == Duration::from_millis(100)
    ));
    reader.join().unwrap();
}

#[tokio::test]
async fn test_close_twice_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    let store = KvStore::open(dir.path().join("bot.db"), Duration::from_secs(1)).unwrap();

    store.close().await.unwrap();
    store.close().await.unwrap();

    assert!(matches!(store.get("k"), Err(StorageError::Closed)));
}

#[test]
fn test_zero_timeout_falls_back_to_default() {
    let dir = tempfile::tempdir().unwrap();
    let store = KvStore::open(dir.path().join("bot.db"), Duration::ZERO).unwrap();
    assert_eq!(store.timeout(), crate::DEFAULT_TIMEOUT);
}
