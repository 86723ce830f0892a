//! Provisioning settings and configuration types.
//!
//! Settings are read from `~/.config/heap/settings.json` (or the platform
//! equivalent) and loaded at startup. Every section has defaults, so a
//! partial file or no file at all is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::ProviderConfig;
use crate::services::{TcpConnectivity, DEFAULT_PROVIDER_DOMAIN};

/// Errors that can occur while loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The settings file could not be read.
    #[error("settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid JSON for [`Settings`].
    #[error("settings file {path} is malformed: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// No home directory to derive default paths from.
    #[error("could not determine the user's home directory")]
    NoHomeDirectory,
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("com", "panbanda", "heap").ok_or(ConfigError::NoHomeDirectory)
}

/// Top-level settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Network timeouts and reachability.
    pub network: NetworkSettings,
    /// Provisioning behavior.
    pub provision: ProvisionSettings,
    /// Local storage.
    pub storage: StorageSettings,
    /// Extra providers, consulted before the built-in table.
    pub providers: Vec<ProviderConfig>,
}

impl Settings {
    /// Settings file name inside the config directory.
    pub const FILE_NAME: &'static str = "settings.json";

    /// Returns the default settings file location.
    pub fn default_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join(Self::FILE_NAME))
    }

    /// Loads settings from `path`, or from the default location.
    ///
    /// A missing file at the default location yields defaults. An explicit
    /// path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let path = Self::default_path()?;
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    tracing::debug!(path = %path.display(), "No settings file, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    /// Loads settings from the file at `path`.
    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = serde_json::from_str(&raw).map_err(|source| ConfigError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }
}

/// Network configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Timeout for each network step of a probe, in seconds.
    pub timeout_secs: u64,
    /// Address used to check connectivity (`host:port`).
    pub connectivity_address: String,
    /// Timeout for the connectivity check, in seconds.
    pub connectivity_timeout_secs: u64,
}

impl NetworkSettings {
    /// Per-step probe timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Connectivity check timeout.
    pub fn connectivity_timeout(&self) -> Duration {
        Duration::from_secs(self.connectivity_timeout_secs)
    }
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            connectivity_address: TcpConnectivity::DEFAULT_ADDRESS.to_string(),
            connectivity_timeout_secs: TcpConnectivity::DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

/// Provisioning configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionSettings {
    /// Domain whose provider accounts are set up against.
    pub provider_domain: String,
    /// How long to wait for an access token, in seconds.
    pub token_timeout_secs: u64,
}

impl ProvisionSettings {
    /// Token acquisition timeout.
    pub fn token_timeout(&self) -> Duration {
        Duration::from_secs(self.token_timeout_secs)
    }
}

impl Default for ProvisionSettings {
    fn default() -> Self {
        Self {
            provider_domain: DEFAULT_PROVIDER_DOMAIN.to_string(),
            token_timeout_secs: 20,
        }
    }
}

/// Local storage configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Account database path. Defaults to the platform data directory.
    pub database_path: Option<PathBuf>,
}

impl StorageSettings {
    /// Database file name inside the data directory.
    pub const DATABASE_FILE: &'static str = "accounts.db";

    /// Returns the configured database path or the default one.
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(project_dirs()?.data_dir().join(Self::DATABASE_FILE)),
        }
    }
}
