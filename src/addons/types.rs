//! Add-on type definitions.
//!
//! Core data structures shared by the manifest store, the resolver and the
//! installer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Game branch a host file targets.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum GameFlavor {
    /// Current retail client.
    #[default]
    #[serde(alias = "wow_retail")]
    #[value(alias = "wow_retail")]
    Retail,
    /// Classic client.
    #[serde(alias = "wow_classic")]
    #[value(alias = "wow_classic")]
    Classic,
}

impl GameFlavor {
    /// Returns the `gameVersionFlavor` tag the host uses for this branch.
    #[must_use]
    pub fn host_tag(&self) -> &'static str {
        match self {
            Self::Retail => "wow_retail",
            Self::Classic => "wow_classic",
        }
    }
}

impl std::fmt::Display for GameFlavor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Retail => write!(f, "retail"),
            Self::Classic => write!(f, "classic"),
        }
    }
}

/// Latest acceptable release of an addon, as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    /// Version label stored in the manifest (never contains whitespace).
    pub label: String,
    /// Where the release archive can be downloaded.
    pub download_url: String,
    /// Human-readable addon name.
    pub addon_name: String,
    /// Archive file name as published by the host.
    pub file_name: String,
    /// Top-level folders the release installs into the AddOns directory.
    pub modules: Vec<String>,
}

impl VersionInfo {
    /// Creates version info with only a label and download URL.
    #[must_use]
    pub fn new(label: impl Into<String>, download_url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            download_url: download_url.into(),
            addon_name: String::new(),
            file_name: String::new(),
            modules: Vec::new(),
        }
    }

    /// Sets the addon display name.
    #[must_use]
    pub fn with_addon_name(mut self, name: impl Into<String>) -> Self {
        self.addon_name = name.into();
        self
    }

    /// Sets the module folder names.
    #[must_use]
    pub fn with_modules(mut self, modules: Vec<String>) -> Self {
        self.modules = modules;
        self
    }
}

/// Turns a host display name into a single-field version label.
#[must_use]
pub fn version_label(display_name: &str) -> String {
    display_name
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

/// Outcome of a completed archive extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InstallReport {
    /// Files written.
    pub files: usize,
    /// Directories created.
    pub directories: usize,
}

/// Per-addon errors. None of these abort a run.
#[derive(Debug, Error)]
pub enum AddonError {
    /// The host has no addon with this id.
    #[error("add-on '{0}' not found on host")]
    AddonNotFound(String),

    /// Filtering left no file to install.
    #[error("no compatible {flavor} file for add-on '{addon_id}'")]
    NoCompatibleFile {
        addon_id: String,
        flavor: GameFlavor,
    },

    /// Transport failure, timeout, non-2xx status or undecodable body.
    #[error("network error: {0}")]
    NetworkError(String),

    /// Downloaded file is not a usable zip archive.
    #[error("corrupt archive: {0}")]
    CorruptArchive(String),

    /// Extraction started but did not finish.
    #[error("install incomplete after {extracted} of {total} entries: {reason}")]
    InstallIncomplete {
        extracted: usize,
        total: usize,
        reason: String,
    },

    /// Local file error outside of extraction (temp file, download dir).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for AddonError {
    fn from(e: reqwest::Error) -> Self {
        Self::NetworkError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_label_replaces_whitespace() {
        assert_eq!(version_label("DBM 9.0.17"), "DBM_9.0.17");
        assert_eq!(version_label("  v2 beta\t1 "), "v2_beta_1");
        assert_eq!(version_label("v2"), "v2");
    }

    #[test]
    fn test_flavor_host_tag() {
        assert_eq!(GameFlavor::Retail.host_tag(), "wow_retail");
        assert_eq!(GameFlavor::Classic.host_tag(), "wow_classic");
        assert_eq!(GameFlavor::default(), GameFlavor::Retail);
    }

    #[test]
    fn test_flavor_deserialize_aliases() {
        #[derive(Deserialize)]
        struct Wrapper {
            flavor: GameFlavor,
        }

        let w: Wrapper = toml::from_str("flavor = \"classic\"").unwrap();
        assert_eq!(w.flavor, GameFlavor::Classic);
        let w: Wrapper = toml::from_str("flavor = \"wow_retail\"").unwrap();
        assert_eq!(w.flavor, GameFlavor::Retail);
    }

    #[test]
    fn test_error_display() {
        let err = AddonError::NoCompatibleFile {
            addon_id: "61284".to_string(),
            flavor: GameFlavor::Classic,
        };
        assert_eq!(err.to_string(), "no compatible classic file for add-on '61284'");

        let err = AddonError::InstallIncomplete {
            extracted: 3,
            total: 5,
            reason: "disk full".to_string(),
        };
        assert!(err.to_string().contains("3 of 5"));
    }
}
