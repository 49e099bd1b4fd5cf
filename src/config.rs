//! User configuration, persisted as TOML in `$XDG_CONFIG_HOME/obra/config.toml`.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::paths::ObraPaths;

/// Errors from configuration loading and saving.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(obra::config::read),
        help("Ensure the config file exists and is readable, or run `obra init`.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}: {message}")]
    #[diagnostic(
        code(obra::config::parse),
        help("Check the TOML syntax in the config file.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(obra::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Which [`ProjectStore`](crate::store::ProjectStore) backend to open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// redb database under the data directory.
    #[default]
    Durable,
    /// Nothing survives the process.
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObraConfig {
    /// Identity used as owner of created projects.
    #[serde(default = "default_owner_id")]
    pub owner_id: String,
    /// Overrides the XDG data directory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub backend: StorageBackend,
    /// `tracing-subscriber` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// Units created for a new project when none are given.
    #[serde(default = "default_unit_count")]
    pub default_unit_count: usize,
}

fn default_owner_id() -> String {
    std::env::var("USER").unwrap_or_else(|_| "local".into())
}
fn default_log_filter() -> String {
    "info".into()
}
fn default_unit_count() -> usize {
    1
}

impl Default for ObraConfig {
    fn default() -> Self {
        Self {
            owner_id: default_owner_id(),
            data_dir: None,
            backend: StorageBackend::default(),
            log_filter: default_log_filter(),
            default_unit_count: default_unit_count(),
        }
    }
}

impl ObraConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Load the file if present, defaults otherwise.
    pub fn load_or_default(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Directory of the project database, honouring the `data_dir` override.
    pub fn store_dir(&self, paths: &ObraPaths) -> PathBuf {
        match &self.data_dir {
            Some(dir) => dir.join("store"),
            None => paths.store_dir(),
        }
    }
}
