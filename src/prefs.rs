//! Persisted client state: theme and the last selected model.

use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ChatError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Theme::Light => write!(f, "light"),
            Theme::Dark => write!(f, "dark"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub theme: Theme,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_model: Option<String>,
}

/// TOML file holding [`Preferences`].
#[derive(Debug, Clone)]
pub struct PrefsStore {
    path: PathBuf,
}

impl PrefsStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or unreadable files fall back to defaults.
    pub fn load(&self) -> Preferences {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Preferences::default(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "could not read preferences");
                return Preferences::default();
            }
        };
        toml::from_str(&text).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "ignoring corrupt preferences");
            Preferences::default()
        })
    }

    pub fn save(&self, prefs: &Preferences) -> Result<()> {
        let text = toml::to_string(prefs).map_err(|e| ChatError::Prefs(e.to_string()))?;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| ChatError::io(dir.display().to_string(), e))?;
        }
        std::fs::write(&self.path, text)
            .map_err(|e| ChatError::io(self.path.display().to_string(), e))
    }
}

/// Pick the model to submit with: the saved one if the server still offers it,
/// else `default` if offered, else the first offered model. With an empty
/// list the default is used as-is.
pub fn resolve_model(available: &[String], saved: Option<&str>, default: &str) -> String {
    if let Some(saved) = saved.filter(|s| available.iter().any(|m| m == s)) {
        return saved.to_string();
    }
    if available.is_empty() || available.iter().any(|m| m == default) {
        return default.to_string();
    }
    available[0].clone()
}
