//! Client configuration: optional TOML file, then CLI overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ChatError, Result};
use crate::render::DEFAULT_MAX_MARKDOWN_BYTES;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_MODEL: &str = "qwen2.5vl:72b-q4_K_M";
pub const DEFAULT_PREFS_FILE: &str = "chatpane-prefs.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL of the chat backend; `/chat/` and `/models/` hang off it.
    pub server_url: String,
    /// Model submitted when neither the saved preference nor the server's
    /// list says otherwise.
    pub default_model: String,
    pub connect_timeout_secs: u64,
    /// Larger message bodies are shown as literal text.
    pub max_markdown_bytes: usize,
    pub prefs_path: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            connect_timeout_secs: 10,
            max_markdown_bytes: DEFAULT_MAX_MARKDOWN_BYTES,
            prefs_path: PathBuf::from(DEFAULT_PREFS_FILE),
        }
    }
}

impl ClientConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| ChatError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ChatError::io(path.display().to_string(), e))?;
        Self::from_toml(&text)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// `server_url` without a trailing slash, so paths can be appended.
    pub fn base_url(&self) -> &str {
        self.server_url.trim_end_matches('/')
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.server_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ChatError::Config(format!(
                "server_url must start with http:// or https://, got '{}'",
                self.server_url
            )));
        }
        if self.default_model.trim().is_empty() {
            return Err(ChatError::Config("default_model must not be empty".to_string()));
        }
        if self.max_markdown_bytes == 0 {
            return Err(ChatError::Config("max_markdown_bytes must be positive".to_string()));
        }
        Ok(())
    }
}
