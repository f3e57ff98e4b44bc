//! Sink configuration.
//!
//! Sink entries arrive as generic string-keyed maps (one per `[[sinks]]` table
//! in the configuration file). They are validated eagerly into the closed
//! [`SinkConfig`] enum, which is then turned into a sink instance.

use crate::notification::{NotificationSink, WebhookSink};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP timeout for webhook deliveries.
pub const DEFAULT_WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("sink entry is missing the '{0}' key")]
    MissingKey(&'static str),

    #[error("sink key '{key}' must be {expected}")]
    InvalidType {
        key: &'static str,
        expected: &'static str,
    },

    #[error("sink '{sink}' is enabled but '{key}' is missing")]
    MissingParameter {
        sink: &'static str,
        key: &'static str,
    },
}

/// Parameters shared by webhook-style sinks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookConfig {
    /// The incoming webhook URL.
    pub webhook: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

/// A validated, enabled sink entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkConfig {
    /// Feishu / Lark custom bot webhook.
    Feishu(WebhookConfig),
    /// Slack incoming webhook.
    Slack(WebhookConfig),
}

impl SinkConfig {
    /// Validates a raw sink entry.
    ///
    /// # Returns
    /// * `Ok(Some(_))` for an enabled entry with a recognized name
    /// * `Ok(None)` for a disabled entry or an unrecognized name
    /// * `Err` when `name` or `enable` is missing or mistyped, or when a
    ///   recognized, enabled sink lacks a required parameter
    pub fn from_map(entry: &Map<String, Value>) -> Result<Option<Self>, ConfigError> {
        let name = match entry.get("name") {
            None => return Err(ConfigError::MissingKey("name")),
            Some(Value::String(name)) => name.as_str(),
            Some(_) => {
                return Err(ConfigError::InvalidType {
                    key: "name",
                    expected: "a string",
                })
            }
        };

        let enabled = match entry.get("enable") {
            None => return Err(ConfigError::MissingKey("enable")),
            Some(Value::Bool(enabled)) => *enabled,
            Some(_) => {
                return Err(ConfigError::InvalidType {
                    key: "enable",
                    expected: "a boolean",
                })
            }
        };

        if !enabled {
            return Ok(None);
        }

        match name {
            "feishu" => Ok(Some(SinkConfig::Feishu(webhook_config("feishu", entry)?))),
            "slack" => Ok(Some(SinkConfig::Slack(webhook_config("slack", entry)?))),
            _ => Ok(None),
        }
    }

    /// The registry name of this sink.
    pub fn name(&self) -> &'static str {
        match self {
            SinkConfig::Feishu(_) => "feishu",
            SinkConfig::Slack(_) => "slack",
        }
    }

    /// Constructs the sink described by this entry.
    pub fn build(&self) -> Arc<dyn NotificationSink> {
        match self {
            SinkConfig::Feishu(cfg) => {
                Arc::new(WebhookSink::feishu(cfg.webhook.clone()).with_timeout(cfg.timeout))
            }
            SinkConfig::Slack(cfg) => {
                Arc::new(WebhookSink::slack(cfg.webhook.clone()).with_timeout(cfg.timeout))
            }
        }
    }
}

fn webhook_config(
    sink: &'static str,
    entry: &Map<String, Value>,
) -> Result<WebhookConfig, ConfigError> {
    let webhook = match entry.get("webhook") {
        None => return Err(ConfigError::MissingParameter { sink, key: "webhook" }),
        Some(Value::String(url)) if url.is_empty() => {
            return Err(ConfigError::MissingParameter { sink, key: "webhook" })
        }
        Some(Value::String(url)) => url.clone(),
        Some(_) => {
            return Err(ConfigError::InvalidType {
                key: "webhook",
                expected: "a string",
            })
        }
    };

    let timeout = match entry.get("timeout_seconds") {
        None => DEFAULT_WEBHOOK_TIMEOUT,
        Some(value) => value
            .as_u64()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .ok_or(ConfigError::InvalidType {
                key: "timeout_seconds",
                expected: "a positive integer",
            })?,
    };

    Ok(WebhookConfig { webhook, timeout })
}

/// Validates a raw sink entry and constructs the sink it describes.
///
/// Disabled entries and unrecognized names yield `Ok(None)`.
pub fn build_sink(
    entry: &Map<String, Value>,
) -> Result<Option<Arc<dyn NotificationSink>>, ConfigError> {
    Ok(SinkConfig::from_map(entry)?.map(|config| config.build()))
}
