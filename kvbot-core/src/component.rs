//! Long-lived subsystems released at shutdown.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// A named, closeable component. Registered once with the
/// [`ShutdownCoordinator`](crate::ShutdownCoordinator) and closed in registration order.
///
/// `close` may be called more than once; implementations make repeated calls harmless.
#[async_trait]
pub trait Component: Send + Sync {
    /// Identifier used in shutdown logs.
    fn name(&self) -> &str;
    /// Releases the component.
    async fn close(&self) -> anyhow::Result<()>;
}

/// Error returned by [`close_within`] when the close did not finish in time.
#[derive(Debug, thiserror::Error)]
#[error("close did not finish within {0:?}")]
pub struct CloseTimedOut(pub Duration);

/// Races `close` against a timer. When the timer wins the future is dropped, so whatever
/// it already handed off (e.g. a blocking task) keeps running unobserved.
pub async fn close_within<F, T>(timeout: Duration, close: F) -> Result<T, CloseTimedOut>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(timeout, close)
        .await
        .map_err(|_| CloseTimedOut(timeout))
}
