//! Version resolution against the addon host.

use super::host::{HostClient, HostFile};
use super::types::{AddonError, GameFlavor, VersionInfo};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

/// `releaseType` of a stable release.
const RELEASE_TYPE_STABLE: u32 = 1;

/// Finds the latest acceptable release of an addon.
pub trait VersionResolver {
    /// Resolves the newest file for `addon_id`.
    fn resolve(&self, addon_id: &str, allow_prerelease: bool) -> Result<VersionInfo, AddonError>;

    /// Version stamp of the host's addon database, if known. Two equal
    /// stamps mean nothing on the host changed in between.
    fn database_version(&self) -> Option<String> {
        None
    }
}

/// Resolver backed by the addon host.
#[derive(Debug, Clone)]
pub struct HostResolver {
    /// Shared host client.
    host: HostClient,
    /// Game branch to filter on.
    flavor: GameFlavor,
}

impl HostResolver {
    /// Creates a resolver for the given branch.
    #[must_use]
    pub fn new(host: HostClient, flavor: GameFlavor) -> Self {
        Self { host, flavor }
    }

    /// Returns the branch this resolver filters on.
    #[must_use]
    pub fn flavor(&self) -> GameFlavor {
        self.flavor
    }
}

impl VersionResolver for HostResolver {
    fn resolve(&self, addon_id: &str, allow_prerelease: bool) -> Result<VersionInfo, AddonError> {
        let addon = self.host.fetch_addon(addon_id)?;

        let file = select_latest(&addon.latest_files, self.flavor, allow_prerelease).ok_or_else(
            || AddonError::NoCompatibleFile {
                addon_id: addon_id.to_string(),
                flavor: self.flavor,
            },
        )?;

        // select_latest only returns files with a label
        let label = file.label().unwrap_or_default();
        info!(
            "[RESOLVER] '{}' ({}) latest {} file: {}",
            addon.name, addon_id, self.flavor, label
        );

        Ok(VersionInfo {
            label,
            download_url: file.download_url.clone(),
            addon_name: addon.name,
            file_name: file.file_name.clone(),
            modules: file.modules.iter().map(|m| m.foldername.clone()).collect(),
        })
    }

    fn database_version(&self) -> Option<String> {
        match self.host.database_version() {
            Ok(stamp) => {
                debug!("[RESOLVER] Host database version: {}", stamp);
                Some(stamp)
            }
            Err(e) => {
                warn!("[RESOLVER] Could not fetch host database timestamp: {}", e);
                None
            }
        }
    }
}

/// Picks the most recently published file for `flavor`.
///
/// Pre-release files are skipped unless `allow_prerelease` is set. When two
/// files share a publish time the one listed later wins.
#[must_use]
pub fn select_latest(
    files: &[HostFile],
    flavor: GameFlavor,
    allow_prerelease: bool,
) -> Option<&HostFile> {
    let mut latest: Option<(DateTime<Utc>, &HostFile)> = None;

    for file in files {
        if file.game_version_flavor.as_deref() != Some(flavor.host_tag()) {
            continue;
        }
        if !allow_prerelease && file.release_type != RELEASE_TYPE_STABLE {
            continue;
        }
        if file.label().is_none() {
            debug!("[RESOLVER] Skipping file without a usable name: {}", file.download_url);
            continue;
        }
        let Some(published) = file.published_at() else {
            warn!("[RESOLVER] Skipping file with bad date '{}'", file.file_date);
            continue;
        };

        if latest.is_none_or(|(best, _)| published >= best) {
            latest = Some((published, file));
        }
    }

    latest.map(|(_, file)| file)
}
