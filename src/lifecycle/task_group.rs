//! Tracks in-flight background tasks and provides a join barrier over them.
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::{debug, error, trace};

use super::LifecycleError;

/// A group of tracked tasks sharing one pending counter.
///
/// This struct is responsible for:
/// - Spawning tasks on a runtime and counting them while they run.
/// - Letting any number of callers wait until the counter drains to zero.
#[derive(Clone, Debug)]
pub struct TaskGroup {
    counter: Arc<Counter>,
    handle: Handle,
}

#[derive(Debug, Default)]
struct Counter {
    pending: AtomicUsize,
    idle: Notify,
}

impl Counter {
    fn release(&self) -> Result<(), LifecycleError> {
        let previous = self
            .pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |pending| {
                pending.checked_sub(1)
            })
            .map_err(|_| LifecycleError::CounterUnderflow)?;
        if previous == 1 {
            self.idle.notify_waiters();
        }
        Ok(())
    }
}

/// Decrements the pending counter when dropped.
///
/// Held by every spawned task, so the decrement runs whether the task returns,
/// panics, or is dropped by a runtime that is shutting down.
#[derive(Debug)]
struct TaskGuard {
    counter: Arc<Counter>,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        // Every guard was created by a matching increment.
        let _ = self.counter.release();
    }
}

impl TaskGroup {
    /// Creates an empty group that spawns onto `handle`.
    pub fn new(handle: Handle) -> Self {
        Self {
            counter: Arc::new(Counter::default()),
            handle,
        }
    }

    /// The runtime this group spawns onto.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Spawns a new tracked task.
    pub fn spawn<F>(&self, name: &str, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let guard = self.track();
        let task_name = name.to_owned();
        debug!(task_name = %task_name, pending = self.pending(), "Spawning task");

        self.handle.spawn(async move {
            let _guard = guard;
            if AssertUnwindSafe(future).catch_unwind().await.is_err() {
                error!(task_name = %task_name, "Task panicked.");
            } else {
                trace!(task_name = %task_name, "Task finished.");
            }
        });
    }

    fn track(&self) -> TaskGuard {
        self.counter.pending.fetch_add(1, Ordering::AcqRel);
        TaskGuard {
            counter: self.counter.clone(),
        }
    }

    /// Adds `n` externally managed tasks to the counter.
    pub fn add(&self, n: usize) {
        self.counter.pending.fetch_add(n, Ordering::AcqRel);
    }

    /// Marks one externally managed task as finished.
    pub fn done(&self) -> Result<(), LifecycleError> {
        self.counter.release()
    }

    /// Number of tasks currently in flight.
    pub fn pending(&self) -> usize {
        self.counter.pending.load(Ordering::Acquire)
    }

    /// Waits until no tracked task is in flight.
    ///
    /// Tasks spawned while a wait is in progress extend it.
    pub async fn wait(&self) {
        loop {
            let notified = self.counter.idle.notified();
            tokio::pin!(notified);
            // Register before checking, so a release in between is not lost.
            notified.as_mut().enable();

            let pending = self.pending();
            if pending == 0 {
                return;
            }
            trace!(pending, "Waiting for tracked tasks to complete.");
            notified.await;
        }
    }
}
