pub mod log_file;
pub mod webhook;

use std::sync::Arc;

use crate::application::config::{NotificationConfig, TransportKind};
use crate::domain::ports::transport::{MessageTransport, TransportError};

use self::log_file::LogFileTransport;
use self::webhook::WebhookTransport;

/// Build the durable transport selected in configuration.
///
/// # Errors
///
/// Returns `TransportError::ChannelUnavailable` when the webhook transport
/// is selected without a URL, or its HTTP client cannot be built.
pub fn create_transport(
    config: &NotificationConfig,
) -> Result<Arc<dyn MessageTransport>, TransportError> {
    match config.transport {
        TransportKind::Log => {
            tracing::info!(path = %config.mailbox_path, "durable notifications go to mailbox file");
            Ok(Arc::new(LogFileTransport::new(
                &config.mailbox_path,
                &config.from,
            )))
        }
        TransportKind::Webhook => {
            let url = config
                .webhook_url
                .as_deref()
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .ok_or_else(|| {
                    TransportError::ChannelUnavailable("webhook transport needs a URL".into())
                })?;
            tracing::info!(url, "durable notifications go to webhook");
            Ok(Arc::new(WebhookTransport::new(
                url.to_string(),
                config.from.clone(),
                config.send_timeout(),
            )?))
        }
    }
}
