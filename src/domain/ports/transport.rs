use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to send message: {0}")]
    SendFailed(String),
    #[error("transport unavailable: {0}")]
    ChannelUnavailable(String),
    #[error("send timed out after {0:?}")]
    Timeout(Duration),
}

/// A rendered durable notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Deliver one message to one address.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the message could not be handed to the
    /// underlying channel.
    async fn send(&self, address: &str, message: &OutgoingMessage) -> Result<(), TransportError>;
}
