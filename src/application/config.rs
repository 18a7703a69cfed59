use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level application configuration loaded from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

/// Database storage path (tilde-expanded at point of use).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

/// Which transport carries durable notifications.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Append messages to a local mailbox file.
    #[default]
    Log,
    /// POST messages to an HTTP endpoint.
    Webhook,
}

/// Durable notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub transport: TransportKind,
    #[serde(default = "default_mailbox_path")]
    pub mailbox_path: String,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_from")]
    pub from: String,
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,
    /// Seeded as an opted-in recipient at startup.
    #[serde(default)]
    pub admin_email: Option<String>,
}

/// Evaluation queue and live fan-out sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_live_buffer")]
    pub live_buffer: usize,
    /// Samples evaluated at once; further jobs wait in the queue.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

// --- Defaults ---

fn default_bind_addr() -> String {
    "0.0.0.0:8090".into()
}

// NOTE: stored with the tilde; expanded with shellexpand where opened.
fn default_database_path() -> String {
    "~/.local/share/cabwatch/cabwatch.db".into()
}

fn default_mailbox_path() -> String {
    "~/.local/share/cabwatch/mailbox.jsonl".into()
}

fn default_from() -> String {
    "cabwatch@localhost".into()
}

const fn default_send_timeout() -> u64 {
    10
}

const fn default_queue_capacity() -> usize {
    256
}

const fn default_live_buffer() -> usize {
    32
}

const fn default_max_in_flight() -> usize {
    16
}

// --- Default impls ---

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::default(),
            mailbox_path: default_mailbox_path(),
            webhook_url: None,
            from: default_from(),
            send_timeout_secs: default_send_timeout(),
            admin_email: None,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            live_buffer: default_live_buffer(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

impl NotificationConfig {
    #[must_use]
    pub const fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }
}

// --- AppConfig methods ---

impl AppConfig {
    /// Load config from default path or create default config file
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined,
    /// the file cannot be read, or the TOML content is invalid.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_or_create(&path)
    }

    /// Load from a specific path, or create a default config file if missing
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the TOML content is invalid,
    /// or the default config file cannot be written.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from(path)
        } else {
            let config = Self::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Load from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the TOML content is invalid,
    /// or the values fail [`AppConfig::validate`].
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).context("Failed to read config file")?;
        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to a specific path, creating parent directories if needed
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created,
    /// serialization fails, or the file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Reject values the pipeline cannot run with.
    ///
    /// # Errors
    ///
    /// Returns an error for a zero send timeout, zero queue or live buffer
    /// capacity, or a webhook transport without a URL.
    pub fn validate(&self) -> Result<()> {
        if self.notifications.send_timeout_secs == 0 {
            bail!("notifications.send_timeout_secs must be greater than 0");
        }
        if self.pipeline.queue_capacity == 0 {
            bail!("pipeline.queue_capacity must be greater than 0");
        }
        if self.pipeline.live_buffer == 0 {
            bail!("pipeline.live_buffer must be greater than 0");
        }
        if self.pipeline.max_in_flight == 0 {
            bail!("pipeline.max_in_flight must be greater than 0");
        }
        if self.notifications.transport == TransportKind::Webhook
            && self
                .notifications
                .webhook_url
                .as_deref()
                .is_none_or(|url| url.trim().is_empty())
        {
            bail!("notifications.webhook_url is required when transport = \"webhook\"");
        }
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not determine config directory")?;
        Ok(config_dir.join("cabwatch").join("config.toml"))
    }
}
