use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WidgetError};

pub const DEFAULT_WEBHOOK_URL: &str = "http://localhost:5005/webhooks/rest/webhook";
pub const DEFAULT_FALLBACK_MESSAGE: &str =
    "Sorry, I'm having trouble connecting to the server. Please try again later.";
pub const DEFAULT_SENDER_PREFIX: &str = "user_";

const CONFIG_FILE_PATH: &str = "chat_widget.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetConfig {
    #[serde(default = "default_webhook_url")]
    pub webhook_url: String,
    /// Bot entry rendered when the webhook cannot be reached.
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,
    #[serde(default = "default_sender_prefix")]
    pub sender_prefix: String,
    /// No timeout unless set; the request lives as long as the HTTP stack allows.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

fn default_webhook_url() -> String {
    DEFAULT_WEBHOOK_URL.to_string()
}

fn default_fallback_message() -> String {
    DEFAULT_FALLBACK_MESSAGE.to_string()
}

fn default_sender_prefix() -> String {
    DEFAULT_SENDER_PREFIX.to_string()
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            webhook_url: default_webhook_url(),
            fallback_message: default_fallback_message(),
            sender_prefix: default_sender_prefix(),
            request_timeout_secs: None,
        }
    }
}

impl WidgetConfig {
    /// Defaults, then `chat_widget.toml` in the working directory, then environment.
    pub fn new() -> Self {
        let mut config = match Self::from_file(CONFIG_FILE_PATH) {
            Ok(Some(config)) => config,
            Ok(None) => Self::default(),
            Err(e) => {
                tracing::warn!("Ignoring {}: {}", CONFIG_FILE_PATH, e);
                Self::default()
            }
        };
        config.apply_env();
        config
    }

    /// Returns `Ok(None)` when the file does not exist.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str::<WidgetConfig>(&content)
            .map(Some)
            .map_err(|e| WidgetError::Config(format!("{}: {}", path.display(), e)))
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("CHAT_WIDGET_WEBHOOK_URL") {
            if !url.trim().is_empty() {
                self.webhook_url = url;
            }
        }
        if let Ok(secs) = std::env::var("CHAT_WIDGET_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_timeout_env(&secs);
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

fn parse_timeout_env(value: &str) -> Option<u64> {
    match value.trim().parse::<u64>() {
        Ok(0) | Err(_) => None,
        Ok(secs) => Some(secs),
    }
}
