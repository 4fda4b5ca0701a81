//! HTTP client for the addon host.
//!
//! One `HostClient` is built at startup and shared by the resolver and the
//! installer. Cloning it is cheap; the underlying connection pool is shared.

use super::types::{AddonError, version_label};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::io::Write;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Default addon host API.
pub const DEFAULT_API_URL: &str = "https://addons-ecs.forgesvc.net/api/v2";

/// Default `User-Agent`. The host rejects unknown clients.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/87.0.4280.88 Safari/537.36";

/// Default request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Addon description returned by `GET /addon/{id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostAddon {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Most recent files, one or more per flavor and release type.
    #[serde(default)]
    pub latest_files: Vec<HostFile>,
}

/// A published file of an addon.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostFile {
    /// Human-readable version name.
    #[serde(default)]
    pub display_name: String,
    /// Archive file name.
    #[serde(default)]
    pub file_name: String,
    /// Publish time (ISO 8601).
    pub file_date: String,
    /// 1 = release, 2 = beta, 3 = alpha.
    pub release_type: u32,
    /// Game branch tag such as `wow_retail`.
    #[serde(default)]
    pub game_version_flavor: Option<String>,
    /// Archive download URL.
    pub download_url: String,
    /// Top-level folders contained in the archive.
    #[serde(default)]
    pub modules: Vec<HostModule>,
}

impl HostFile {
    /// Returns the manifest label for this file, if it has a usable one.
    #[must_use]
    pub fn label(&self) -> Option<String> {
        [&self.display_name, &self.file_name]
            .into_iter()
            .map(|name| version_label(name))
            .find(|label| !label.is_empty() && label != "-")
    }

    /// Parses the publish time. Dates without an offset are taken as UTC.
    #[must_use]
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        parse_host_date(&self.file_date)
    }
}

/// A folder installed by a file.
#[derive(Debug, Clone, Deserialize)]
pub struct HostModule {
    /// Folder name inside the AddOns directory.
    pub foldername: String,
}

/// Parses a host timestamp.
#[must_use]
pub fn parse_host_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    DateTime::parse_from_rfc3339(text)
        .map(|d| d.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// Blocking client for the addon host.
#[derive(Debug, Clone)]
pub struct HostClient {
    /// HTTP client.
    client: reqwest::blocking::Client,
    /// API base URL without trailing slash.
    api_url: String,
}

impl HostClient {
    /// Creates a client for the given API base URL.
    ///
    /// Fails if the URL is empty or the HTTP client cannot be built with the
    /// requested User-Agent and timeout.
    pub fn new(api_url: &str, user_agent: &str, timeout: Duration) -> Result<Self, AddonError> {
        let api_url = api_url.trim().trim_end_matches('/');
        if api_url.is_empty() {
            return Err(AddonError::NetworkError("API URL is empty".to_string()));
        }

        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| AddonError::NetworkError(format!("could not build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: api_url.to_string(),
        })
    }

    /// Returns the API base URL.
    #[must_use]
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Fetches an addon description and its latest files.
    pub fn fetch_addon(&self, addon_id: &str) -> Result<HostAddon, AddonError> {
        let url = format!("{}/addon/{}", self.api_url, addon_id);
        debug!("[HOST] GET {}", url);

        let start = Instant::now();
        let response = self.client.get(&url).send()?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AddonError::AddonNotFound(addon_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(AddonError::NetworkError(format!(
                "host returned {} for add-on '{}'",
                response.status(),
                addon_id
            )));
        }

        let addon = response
            .json::<HostAddon>()
            .map_err(|e| AddonError::NetworkError(format!("failed to parse response: {}", e)))?;

        debug!(
            "[HOST] Add-on '{}' listed {} file(s) in {:?}",
            addon_id,
            addon.latest_files.len(),
            start.elapsed()
        );
        Ok(addon)
    }

    /// Fetches the version of the host's addon database.
    ///
    /// The host answers with a timestamp string; it is returned as sent so
    /// callers compare it for equality instead of against the local clock.
    pub fn database_version(&self) -> Result<String, AddonError> {
        let url = format!("{}/addon/timestamp", self.api_url);
        debug!("[HOST] GET {}", url);

        let response = self.client.get(&url).send()?;
        if !response.status().is_success() {
            return Err(AddonError::NetworkError(format!(
                "host returned {} for database timestamp",
                response.status()
            )));
        }

        let text = response
            .json::<String>()
            .map_err(|e| AddonError::NetworkError(format!("failed to parse response: {}", e)))?;

        let text = text.trim();
        if text.is_empty() || text.contains(char::is_whitespace) {
            return Err(AddonError::NetworkError(format!(
                "invalid database timestamp '{}'",
                text
            )));
        }
        Ok(text.to_string())
    }

    /// Streams `url` into `dest`. Returns the number of bytes written.
    pub fn download<W: Write + ?Sized>(&self, url: &str, dest: &mut W) -> Result<u64, AddonError> {
        info!("[HOST] Downloading {}", url);

        let mut response = self.client.get(url).send()?;
        if !response.status().is_success() {
            return Err(AddonError::NetworkError(format!(
                "download failed: {}",
                response.status()
            )));
        }

        let bytes = response.copy_to(dest)?;
        debug!("[HOST] Downloaded {} bytes", bytes);
        Ok(bytes)
    }
}
