//! Graceful shutdown coordinator.
//!
//! Waits for the first of an OS termination signal or a [`CancellationToken`] firing, then closes
//! a fixed list of [`Component`]s in registration order. The sequence runs once: later signals or
//! cancellations are ignored. Close failures are logged with the component name and never abort
//! the sequence.

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::component::{close_within, Component};

/// Upper bound for a single component close when none is configured.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Coordinator lifecycle. `Done` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Waiting,
    Closing,
    Done,
}

/// What started the shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownTrigger {
    /// An OS signal, by name (e.g. `SIGTERM`).
    Signal(String),
    /// The cancellation token fired.
    Cancelled,
}

/// Result of closing one component.
#[derive(Debug, Clone)]
pub struct CloseOutcome {
    pub component: String,
    pub error: Option<String>,
}

/// Everything the shutdown sequence did, in close order.
#[derive(Debug, Clone)]
pub struct ShutdownReport {
    pub trigger: ShutdownTrigger,
    pub outcomes: Vec<CloseOutcome>,
}

impl ShutdownReport {
    /// Number of components whose close failed or timed out.
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| o.error.is_some()).count()
    }
}

/// Drives the one-shot close sequence. Build it with the components in close order, then
/// call [`run`](Self::run).
pub struct ShutdownCoordinator {
    components: Vec<Arc<dyn Component>>,
    close_timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new(components: Vec<Arc<dyn Component>>) -> Self {
        Self {
            components,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }

    /// Bounds every component close; a close that exceeds it is reported as failed and the
    /// sequence moves on.
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Registers for SIGINT/SIGTERM (Ctrl-C elsewhere) before returning, then supervises in the
    /// background. Fails only if signal registration fails.
    pub fn run(self, cancel: CancellationToken) -> io::Result<ShutdownHandle> {
        let signal = os_signal()?;
        Ok(self.run_until(cancel, signal))
    }

    /// Like [`run`](Self::run) with a caller-supplied signal source; the future resolves to the
    /// signal name.
    pub fn run_until<S>(self, cancel: CancellationToken, signal: S) -> ShutdownHandle
    where
        S: Future<Output = String> + Send + 'static,
    {
        let (state_tx, state_rx) = watch::channel(ShutdownState::Waiting);

        let task = tokio::spawn(async move {
            let trigger = tokio::select! {
                name = signal => {
                    warn!(signal = %name, "Stopping the app due to a caught signal");
                    ShutdownTrigger::Signal(name)
                }
                _ = cancel.cancelled() => {
                    warn!("Stopping the app due to a canceled context");
                    ShutdownTrigger::Cancelled
                }
            };

            state_tx.send_replace(ShutdownState::Closing);
            let outcomes = self.close_all().await;
            state_tx.send_replace(ShutdownState::Done);

            let report = ShutdownReport { trigger, outcomes };
            info!(
                components = report.outcomes.len(),
                failures = report.failures(),
                "Shutdown sequence finished"
            );
            report
        });

        ShutdownHandle {
            state: state_rx,
            task,
        }
    }

    async fn close_all(&self) -> Vec<CloseOutcome> {
        let mut outcomes = Vec::with_capacity(self.components.len());
        for component in &self.components {
            let name = component.name().to_string();
            debug!(component = %name, "Closing component");

            let error = match close_within(self.close_timeout, component.close()).await {
                Ok(Ok(())) => {
                    info!(component = %name, "Component closed");
                    None
                }
                Ok(Err(e)) => Some(format!("{:#}", e)),
                Err(e) => Some(e.to_string()),
            };
            if let Some(ref e) = error {
                warn!(component = %name, error = %e, "Unable to close the component");
            }

            outcomes.push(CloseOutcome {
                component: name,
                error,
            });
        }
        outcomes
    }
}

/// Completion side of a running coordinator.
pub struct ShutdownHandle {
    state: watch::Receiver<ShutdownState>,
    task: JoinHandle<ShutdownReport>,
}

impl ShutdownHandle {
    /// Current lifecycle state.
    pub fn state(&self) -> ShutdownState {
        *self.state.borrow()
    }

    /// Watch channel of lifecycle transitions, for callers that only need to observe.
    pub fn subscribe(&self) -> watch::Receiver<ShutdownState> {
        self.state.clone()
    }

    /// Blocks until the close sequence has finished.
    pub async fn wait(self) -> anyhow::Result<ShutdownReport> {
        self.task
            .await
            .map_err(|e| anyhow::anyhow!("shutdown supervisor failed: {}", e))
    }
}

#[cfg(unix)]
fn os_signal() -> io::Result<impl Future<Output = String> + Send + 'static> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => "SIGINT".to_string(),
            _ = terminate.recv() => "SIGTERM".to_string(),
        }
    })
}

#[cfg(not(unix))]
fn os_signal() -> io::Result<impl Future<Output = String> + Send + 'static> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Unable to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
        "ctrl-c".to_string()
    })
}
