//! Process lifecycle coordination.
//!
//! A [`Lifecycle`] owns the pieces a program needs to shut down cleanly:
//! - a [`TaskGroup`] counting in-flight background work, with a join barrier,
//! - a [`CancelScope`] that long-running work can poll or await,
//! - a small bounded queue of shutdown requests fed by OS signals or by
//!   [`Lifecycle::trigger_manual_shutdown`].
//!
//! One `Lifecycle` is created at startup and handed by clone to every
//! component that spawns tracked work.

pub mod cancel;
pub mod task_group;

pub use cancel::CancelScope;
pub use task_group::TaskGroup;

use arc_swap::ArcSwap;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Capacity of the shutdown-request queue.
pub const SIGNAL_QUEUE_CAPACITY: usize = 3;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("task counter would become negative")]
    CounterUnderflow,

    #[error("no Tokio runtime to bind the lifecycle to")]
    NoRuntime,
}

/// A request to shut down the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGINT / ctrl-c.
    Interrupt,
    /// SIGTERM.
    Terminate,
    /// Injected from inside the process.
    Manual,
}

/// Observable coordinator states.
///
/// A received shutdown request cancels synchronously, so there is no
/// observable state between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Running,
    Cancelled,
}

/// Shared handle to the process lifecycle coordinator.
#[derive(Clone, Debug)]
pub struct Lifecycle {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    tasks: TaskGroup,
    scope: ArcSwap<CancelScope>,
    signal_tx: mpsc::Sender<ShutdownSignal>,
    signal_rx: Mutex<mpsc::Receiver<ShutdownSignal>>,
}

impl Lifecycle {
    /// Creates a coordinator bound to the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a Tokio runtime. Use
    /// [`Lifecycle::with_handle`] to bind to an explicit runtime instead.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self::with_handle(Handle::current())
    }

    /// Like [`Lifecycle::new`], but fails instead of panicking outside a runtime.
    pub fn try_new() -> Result<Self, LifecycleError> {
        Handle::try_current()
            .map(Self::with_handle)
            .map_err(|_| LifecycleError::NoRuntime)
    }

    /// Creates a coordinator that spawns tracked tasks onto `handle`.
    pub fn with_handle(handle: Handle) -> Self {
        let (signal_tx, signal_rx) = mpsc::channel(SIGNAL_QUEUE_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                tasks: TaskGroup::new(handle),
                scope: ArcSwap::from_pointee(CancelScope::new()),
                signal_tx,
                signal_rx: Mutex::new(signal_rx),
            }),
        }
    }

    /// The task group backing this coordinator.
    pub fn tasks(&self) -> &TaskGroup {
        &self.inner.tasks
    }

    /// Spawns a tracked task. [`Lifecycle::wait`] will not return before it ends.
    pub fn spawn<F>(&self, name: &str, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.inner.tasks.spawn(name, future);
    }

    /// Adds `n` externally managed tasks to the pending counter.
    pub fn add_task(&self, n: usize) {
        self.inner.tasks.add(n);
    }

    /// Marks one externally managed task as finished.
    pub fn task_done(&self) -> Result<(), LifecycleError> {
        self.inner.tasks.done()
    }

    /// Number of tracked tasks in flight.
    pub fn pending(&self) -> usize {
        self.inner.tasks.pending()
    }

    /// Waits until every tracked task has finished.
    pub async fn wait(&self) {
        self.inner.tasks.wait().await;
    }

    /// Installs OS signal handlers that feed the shutdown queue.
    ///
    /// The listener is not tracked by the task group; it stops once the scope
    /// that was current at installation time is cancelled.
    pub fn listen_for_os_signals(&self) -> std::io::Result<()> {
        let handle = self.inner.tasks.handle().clone();
        let _enter = handle.enter();
        let mut listener = OsSignals::new()?;
        let signal_tx = self.inner.signal_tx.clone();
        let scope = self.context();

        handle.spawn(async move {
            debug!("Listening for OS shutdown signals.");
            loop {
                let received = tokio::select! {
                    biased;
                    _ = scope.cancelled() => {
                        debug!("Signal listener received cancellation, exiting.");
                        break;
                    }
                    received = listener.recv() => received,
                };

                let Some(signal) = received else {
                    warn!("OS signal stream closed, listener exiting.");
                    break;
                };
                info!(?signal, "Received OS shutdown signal.");
                if signal_tx.try_send(signal).is_err() {
                    warn!(?signal, "Shutdown queue is full, dropping signal.");
                }
            }
        });
        Ok(())
    }

    /// Waits for a shutdown request, logs `tip` (when non-empty) and cancels.
    pub async fn await_signal(&self, tip: &str) -> ShutdownSignal {
        let received = {
            let mut signal_rx = self.inner.signal_rx.lock().await;
            signal_rx.recv().await
        };
        // `Inner` owns a sender, so the queue stays open while `self` is alive.
        let signal = received.unwrap_or(ShutdownSignal::Manual);

        if !tip.is_empty() {
            warn!("{}", tip);
        }
        self.cancel();
        signal
    }

    /// Queues a manual shutdown request without blocking.
    ///
    /// Returns `false` when the queue is already full.
    pub fn trigger_manual_shutdown(&self) -> bool {
        match self.inner.signal_tx.try_send(ShutdownSignal::Manual) {
            Ok(()) => {
                debug!("Manual shutdown requested.");
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!("Shutdown queue is full, manual shutdown request dropped.");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Cancels the current scope. Returns `true` on the first transition only.
    pub fn cancel(&self) -> bool {
        let first = self.context().cancel();
        if first {
            info!("Lifecycle cancelled.");
        }
        first
    }

    /// The current cancellation scope.
    pub fn context(&self) -> CancelScope {
        let scope = self.inner.scope.load();
        CancelScope::clone(&scope)
    }

    /// Replaces the cancellation scope, typically with one a test controls.
    pub fn set_context(&self, scope: CancelScope) {
        self.inner.scope.store(Arc::new(scope));
    }

    pub fn is_cancelled(&self) -> bool {
        self.context().is_cancelled()
    }

    pub fn state(&self) -> LifecycleState {
        if self.is_cancelled() {
            LifecycleState::Cancelled
        } else {
            LifecycleState::Running
        }
    }
}

/// The OS signals that request shutdown.
struct OsSignals {
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl OsSignals {
    fn new() -> std::io::Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            terminate: tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?,
        })
    }

    #[cfg(unix)]
    async fn recv(&mut self) -> Option<ShutdownSignal> {
        tokio::select! {
            res = tokio::signal::ctrl_c() => res.ok().map(|_| ShutdownSignal::Interrupt),
            res = self.terminate.recv() => res.map(|_| ShutdownSignal::Terminate),
        }
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) -> Option<ShutdownSignal> {
        tokio::signal::ctrl_c()
            .await
            .ok()
            .map(|_| ShutdownSignal::Interrupt)
    }
}
