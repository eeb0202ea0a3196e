// Engine configuration.
//
// Optional TOML file at `~/.docpatch/config.toml`; every field has a default
// so a missing or partial file is fine.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::merge::diff::DiffGranularity;

/// Root directory for docpatch state: `~/.docpatch/`.
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".docpatch"))
}

/// Path to the config file: `~/.docpatch/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Characters of slack around an occurrence in which `contextBefore` /
    /// `contextAfter` must appear, on top of the context's own length.
    pub context_window: usize,
    /// Token granularity for section rewrites.
    pub diff_granularity: DiffGranularity,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { context_window: 40, diff_granularity: DiffGranularity::Word }
    }
}

impl EngineConfig {
    /// Load from `~/.docpatch/config.toml`, falling back to defaults.
    pub fn load() -> Self {
        config_path().map(|p| Self::load_or_default(&p)).unwrap_or_default()
    }

    /// Defaults when `path` does not exist; a file that exists but cannot be
    /// read or parsed is reported with `warn!` before falling back.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load_from(path) {
            Ok(config) => config,
            Err(ConfigError::Io(error)) if error.kind() == std::io::ErrorKind::NotFound => {
                Self::default()
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "ignoring unusable config, using defaults");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Save to a specific path (creates parent directories).
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
