//! Sinks that post notifications to chat incoming webhooks.

use crate::notification::config::DEFAULT_WEBHOOK_TIMEOUT;
use crate::notification::{NotificationSink, SendError};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, instrument};

/// The JSON dialect a webhook endpoint expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookFlavor {
    /// Feishu / Lark custom bot: `{"msg_type":"text","content":{"text":...}}`.
    Feishu,
    /// Slack incoming webhook: `{"text":...}`.
    Slack,
}

impl WebhookFlavor {
    fn sink_name(self) -> &'static str {
        match self {
            WebhookFlavor::Feishu => "feishu",
            WebhookFlavor::Slack => "slack",
        }
    }

    /// Builds the request body for a plain-text message.
    pub fn payload(self, message: &str) -> Value {
        match self {
            WebhookFlavor::Feishu => json!({
                "msg_type": "text",
                "content": { "text": message },
            }),
            WebhookFlavor::Slack => json!({ "text": message }),
        }
    }
}

/// A sink that sends each message as one webhook POST.
pub struct WebhookSink {
    name: String,
    webhook_url: String,
    flavor: WebhookFlavor,
    client: reqwest::Client,
    timeout: Duration,
}

impl WebhookSink {
    /// Creates a new `WebhookSink` with the default timeout.
    pub fn new(flavor: WebhookFlavor, webhook_url: String) -> Self {
        Self {
            name: flavor.sink_name().to_string(),
            webhook_url,
            flavor,
            client: reqwest::Client::new(),
            timeout: DEFAULT_WEBHOOK_TIMEOUT,
        }
    }

    pub fn feishu(webhook_url: String) -> Self {
        Self::new(WebhookFlavor::Feishu, webhook_url)
    }

    pub fn slack(webhook_url: String) -> Self {
        Self::new(WebhookFlavor::Slack, webhook_url)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn flavor(&self) -> WebhookFlavor {
        self.flavor
    }

    /// Feishu answers HTTP 200 even for rejected messages and reports the
    /// outcome in a `code` field instead.
    fn check_feishu_body(body: &str) -> Result<(), SendError> {
        let Ok(reply) = serde_json::from_str::<Value>(body) else {
            return Ok(());
        };
        match reply.get("code").and_then(Value::as_i64) {
            Some(code) if code != 0 => Err(SendError::Rejected {
                code,
                msg: reply
                    .get("msg")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            }),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, message), fields(sink = %self.name))]
    async fn send(&self, message: &str) -> Result<(), SendError> {
        let payload = self.flavor.payload(message);
        let response = self
            .client
            .post(&self.webhook_url)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP request to webhook failed");
                SendError::Http(e)
            })?;

        let status = response.status();
        // An unreadable body hides a possible Feishu rejection, so it is not a delivery.
        let body = response.text().await.map_err(|e| {
            error!(status = %status, error = %e, "Failed to read webhook response body");
            SendError::Http(e)
        })?;
        if !status.is_success() {
            error!(
                status = %status,
                body = %body,
                "Failed to send webhook notification"
            );
            return Err(SendError::Status { status, body });
        }

        if self.flavor == WebhookFlavor::Feishu {
            Self::check_feishu_body(&body)?;
        }
        debug!("Delivered webhook notification.");
        Ok(())
    }
}
