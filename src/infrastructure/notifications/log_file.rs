use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::ports::transport::{MessageTransport, OutgoingMessage, TransportError};

/// Delivers messages by appending one JSON line per message to a local
/// mailbox file. Useful on hosts without an outbound relay, and in tests.
pub struct LogFileTransport {
    path: PathBuf,
    from: String,
}

impl LogFileTransport {
    #[must_use]
    pub fn new(path: &str, from: &str) -> Self {
        let expanded = shellexpand::tilde(path);
        Self {
            path: PathBuf::from(expanded.as_ref()),
            from: from.to_string(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn append_line(path: &Path, line: &str) -> Result<(), TransportError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            TransportError::ChannelUnavailable(format!("cannot create mailbox directory: {e}"))
        })?;
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| TransportError::ChannelUnavailable(format!("cannot open mailbox: {e}")))?;

    // One write per message keeps concurrent appends from interleaving.
    file.write_all(line.as_bytes())
        .map_err(|e| TransportError::SendFailed(format!("cannot write to mailbox: {e}")))
}

#[async_trait]
impl MessageTransport for LogFileTransport {
    async fn send(&self, address: &str, message: &OutgoingMessage) -> Result<(), TransportError> {
        let entry = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "from": self.from,
            "to": address,
            "subject": message.subject,
            "body": message.body,
        });
        let mut line = serde_json::to_string(&entry)
            .map_err(|e| TransportError::SendFailed(format!("JSON serialization error: {e}")))?;
        line.push('\n');

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || append_line(&path, &line))
            .await
            .map_err(|e| TransportError::SendFailed(format!("mailbox writer stopped: {e}")))??;

        tracing::debug!(recipient = address, path = %self.path.display(), "message written to mailbox");
        Ok(())
    }
}
