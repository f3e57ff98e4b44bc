//! Cooperative cancellation shared by everything spawned on a [`Lifecycle`].
//!
//! [`Lifecycle`]: crate::lifecycle::Lifecycle

use std::sync::Arc;
use tokio::sync::watch;

/// A cloneable, one-way cancellation flag.
///
/// Clones observe the same flag. Once cancelled a scope stays cancelled.
#[derive(Clone, Debug)]
pub struct CancelScope {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelScope {
    /// Creates a scope in the running (not cancelled) state.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Marks the scope as cancelled.
    ///
    /// Returns `true` only for the call that performed the transition.
    pub fn cancel(&self) -> bool {
        self.tx.send_if_modified(|cancelled| {
            if *cancelled {
                false
            } else {
                *cancelled = true;
                true
            }
        })
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Returns a receiver that is notified when the scope is cancelled.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Resolves once the scope is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot observe a closed channel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelScope {
    fn default() -> Self {
        Self::new()
    }
}
