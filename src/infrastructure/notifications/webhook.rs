use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::domain::ports::transport::{MessageTransport, OutgoingMessage, TransportError};

/// Webhook payload format, auto-detected from the URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WebhookFormat {
    Slack,
    Discord,
    Generic,
}

/// Alarm red, as used by the chat formats.
const ALARM_COLOR_HEX: &str = "#E74C3C";
const ALARM_COLOR_DECIMAL: u32 = 0x00_E7_4C_3C;

/// Delivers messages by POSTing JSON to an HTTP endpoint.
///
/// Slack and Discord webhooks get their native layout; anything else
/// receives `{from, to, subject, body}`. Every recipient produces one
/// request, with the address carried in the payload. A non-2xx response
/// counts as a failed send.
pub struct WebhookTransport {
    url: String,
    from: String,
    client: reqwest::Client,
}

impl WebhookTransport {
    /// `timeout` bounds DNS resolution, connection and response together.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::ChannelUnavailable` if the HTTP client
    /// cannot be initialized (e.g. TLS backend failure).
    pub fn new(url: String, from: String, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                TransportError::ChannelUnavailable(format!("cannot build HTTP client: {e}"))
            })?;

        Ok(Self { url, from, client })
    }

    fn detect_format(&self) -> WebhookFormat {
        // Compare the host only, so a path containing "slack" stays generic.
        let host = self
            .url
            .split("//")
            .nth(1)
            .and_then(|s| s.split('/').next())
            .and_then(|h| h.split(':').next())
            .unwrap_or("");

        if host == "hooks.slack.com" {
            WebhookFormat::Slack
        } else if host == "discord.com" || host == "discordapp.com" {
            WebhookFormat::Discord
        } else {
            WebhookFormat::Generic
        }
    }

    fn format_message(&self, address: &str, message: &OutgoingMessage) -> Value {
        match self.detect_format() {
            WebhookFormat::Slack => Self::format_slack(address, message),
            WebhookFormat::Discord => Self::format_discord(address, message),
            WebhookFormat::Generic => self.format_generic(address, message),
        }
    }

    fn format_slack(address: &str, message: &OutgoingMessage) -> Value {
        json!({
            "attachments": [{
                "color": ALARM_COLOR_HEX,
                "blocks": [
                    {
                        "type": "header",
                        "text": { "type": "plain_text", "text": &message.subject }
                    },
                    {
                        "type": "section",
                        "text": { "type": "mrkdwn", "text": format!("```{}```", message.body) }
                    },
                    {
                        "type": "context",
                        "elements": [{ "type": "mrkdwn", "text": format!("for {address}") }]
                    }
                ]
            }]
        })
    }

    fn format_discord(address: &str, message: &OutgoingMessage) -> Value {
        json!({
            "username": "cabwatch",
            "embeds": [{
                "title": &message.subject,
                "description": &message.body,
                "color": ALARM_COLOR_DECIMAL,
                "footer": { "text": format!("for {address}") }
            }]
        })
    }

    fn format_generic(&self, address: &str, message: &OutgoingMessage) -> Value {
        json!({
            "from": &self.from,
            "to": address,
            "subject": &message.subject,
            "body": &message.body,
        })
    }
}

#[async_trait]
impl MessageTransport for WebhookTransport {
    async fn send(&self, address: &str, message: &OutgoingMessage) -> Result<(), TransportError> {
        let payload = self.format_message(address, message);
        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| TransportError::SendFailed(format!("webhook request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::SendFailed(format!("webhook HTTP {status}")));
        }
        Ok(())
    }
}
