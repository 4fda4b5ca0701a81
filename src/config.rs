//! Configuration for wau.
//!
//! Settings are read from `~/.wau/config.toml` when it exists. Every key is
//! optional:
//!
//! ```toml
//! api_url = "https://addons-ecs.forgesvc.net/api/v2"
//! flavor = "classic"
//! timeout_secs = 30
//!
//! [logging]
//! level = "debug"
//! retention_hours = 48
//! ```
//!
//! Command-line flags override the file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::addons::{
    AddonError, DEFAULT_API_URL, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT, GameFlavor, HostClient,
};
use crate::logging::LogConfig;

/// Maximum config file size (64KB).
const MAX_CONFIG_SIZE: u64 = 64 * 1024;

/// Config file errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// TOML parsing error.
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// File too large.
    #[error("File too large (max {MAX_CONFIG_SIZE} bytes)")]
    FileTooLarge,
}

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Addon host API base URL.
    pub api_url: String,
    /// Game branch to update for.
    pub flavor: GameFlavor,
    /// HTTP timeout in seconds.
    pub timeout_secs: u64,
    /// `User-Agent` sent to the host.
    pub user_agent: String,
    /// Logging settings.
    pub logging: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            flavor: GameFlavor::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            logging: LogConfig::default(),
        }
    }
}

impl Config {
    /// Returns the default config file path (`~/.wau/config.toml`).
    #[must_use]
    pub fn default_path() -> PathBuf {
        wau_dir().join("config.toml")
    }

    /// Loads the config file at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let metadata = fs::metadata(path)?;
        if metadata.len() > MAX_CONFIG_SIZE {
            return Err(ConfigError::FileTooLarge);
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parses config text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(content)?;
        config.logging.normalize();
        if config.timeout_secs == 0 {
            config.timeout_secs = DEFAULT_TIMEOUT_SECS;
        }
        if config.api_url.trim().is_empty() {
            config.api_url = DEFAULT_API_URL.to_string();
        }
        if config.user_agent.trim().is_empty() {
            config.user_agent = DEFAULT_USER_AGENT.to_string();
        }
        Ok(config)
    }

    /// Returns the HTTP timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Builds the shared host client.
    pub fn host_client(&self) -> Result<HostClient, AddonError> {
        HostClient::new(&self.api_url, &self.user_agent, self.timeout())
    }
}

/// Returns the wau data directory (`~/.wau`).
#[must_use]
pub fn wau_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".wau")
}
