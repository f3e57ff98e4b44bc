//! Delivery of selected log messages to external notification sinks.
//!
//! This module defines the [`NotificationSink`] contract, the registry that a
//! [`Logger`](crate::logger::Logger) fans messages out through, the typed sink
//! configuration, and the concrete webhook transports.
pub mod config;
pub mod registry;
pub mod webhook;

pub use config::{build_sink, ConfigError, SinkConfig, WebhookConfig};
pub use registry::SinkRegistry;
pub use webhook::{WebhookFlavor, WebhookSink};

use async_trait::async_trait;
use thiserror::Error;

/// A failed delivery.
#[derive(Error, Debug)]
pub enum SendError {
    #[error("webhook responded with status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("webhook rejected the message (code {code}): {msg}")]
    Rejected { code: i64, msg: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A named delivery target for notification messages.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// A unique, descriptive name for the sink (e.g., "feishu", "slack").
    fn name(&self) -> &str;

    /// Delivers one fully formatted message.
    ///
    /// # Returns
    /// * `Ok(())` if the transport accepted the message
    /// * `Err` on a non-success response, a timeout, or a connection failure
    async fn send(&self, message: &str) -> Result<(), SendError>;
}
