//! Fakes for exercising loggers and sinks in tests.

use crate::notification::{NotificationSink, SendError};
use async_trait::async_trait;
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, Semaphore};

/// An in-memory output stream whose clones share one buffer.
#[derive(Clone, Debug, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes.lock().unwrap()).into_owned()
    }

    /// The emitted lines, without their terminators.
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A sink that records every message it receives.
#[derive(Clone, Debug)]
pub struct RecordingSink {
    name: String,
    messages: Arc<Mutex<Vec<String>>>,
    received: Arc<Notify>,
}

impl RecordingSink {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            messages: Arc::new(Mutex::new(Vec::new())),
            received: Arc::new(Notify::new()),
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    /// Waits until at least `count` messages have arrived.
    pub async fn wait_for_count(&self, count: usize, timeout: std::time::Duration) {
        let wait = async {
            loop {
                let notified = self.received.notified();
                if self.messages.lock().unwrap().len() >= count {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait)
            .await
            .expect("Timed out waiting for notifications");
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, message: &str) -> Result<(), SendError> {
        self.messages.lock().unwrap().push(message.to_string());
        self.received.notify_waiters();
        Ok(())
    }
}

/// A sink whose every delivery fails.
#[derive(Clone, Debug)]
pub struct FailingSink {
    name: String,
    attempts: Arc<AtomicUsize>,
}

impl FailingSink {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationSink for FailingSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, _message: &str) -> Result<(), SendError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(SendError::Other(anyhow::anyhow!("{} is unreachable", self.name)))
    }
}

/// A sink whose deliveries block until the test opens the gate.
#[derive(Clone, Debug)]
pub struct GatedSink {
    inner: RecordingSink,
    gate: Arc<Semaphore>,
}

impl GatedSink {
    pub fn new(name: &str) -> Self {
        Self {
            inner: RecordingSink::new(name),
            gate: Arc::new(Semaphore::new(0)),
        }
    }

    /// Lets `n` pending or future deliveries complete.
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    pub fn messages(&self) -> Vec<String> {
        self.inner.messages()
    }
}

#[async_trait]
impl NotificationSink for GatedSink {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn send(&self, message: &str) -> Result<(), SendError> {
        if let Ok(permit) = self.gate.acquire().await {
            permit.forget();
        }
        self.inner.send(message).await
    }
}
