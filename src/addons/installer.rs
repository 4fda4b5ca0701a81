//! Archive installer.
//!
//! Downloads a release archive to a scoped temporary file and unpacks it
//! into the AddOns directory.

use super::host::HostClient;
use super::types::{AddonError, InstallReport, VersionInfo};
use std::env;
use std::fs::{self, File};
use std::io::{self, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};
use zip::ZipArchive;

/// Installs a resolved release into a directory.
pub trait ArchiveInstaller {
    /// Downloads `release` and extracts it into `target_dir`.
    fn install(&self, release: &VersionInfo, target_dir: &Path) -> Result<InstallReport, AddonError>;
}

/// Installer that downloads zip archives from the addon host.
#[derive(Debug, Clone)]
pub struct ZipInstaller {
    /// Shared host client.
    host: HostClient,
    /// Directory for temporary downloads.
    temp_dir: PathBuf,
}

impl ZipInstaller {
    /// Creates an installer that downloads into `<system temp>/wau`.
    #[must_use]
    pub fn new(host: HostClient) -> Self {
        Self::with_temp_dir(host, env::temp_dir().join("wau"))
    }

    /// Creates an installer with a custom download directory.
    #[must_use]
    pub fn with_temp_dir(host: HostClient, temp_dir: PathBuf) -> Self {
        Self { host, temp_dir }
    }

    /// Returns the download directory.
    #[must_use]
    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }
}

impl ArchiveInstaller for ZipInstaller {
    fn install(&self, release: &VersionInfo, target_dir: &Path) -> Result<InstallReport, AddonError> {
        fs::create_dir_all(&self.temp_dir)?;

        // Removed on drop, whatever happens below.
        let mut download = tempfile::Builder::new()
            .prefix("wau-")
            .suffix(".zip")
            .tempfile_in(&self.temp_dir)?;

        debug!("[INSTALLER] Downloading to {}", download.path().display());
        self.host.download(&release.download_url, download.as_file_mut())?;

        let file = download.as_file_mut();
        file.seek(SeekFrom::Start(0))?;

        let report = install_archive(file, &release.modules, target_dir)?;
        info!(
            "[INSTALLER] Installed '{}' {} ({} files)",
            release.addon_name, release.label, report.files
        );
        Ok(report)
    }
}

/// Validates and extracts a zip archive into `target_dir`.
///
/// `modules` names top-level folders owned by the release; they are removed
/// before extraction so files dropped upstream do not linger.
pub fn install_archive<R: io::Read + Seek>(
    reader: R,
    modules: &[String],
    target_dir: &Path,
) -> Result<InstallReport, AddonError> {
    let mut archive =
        ZipArchive::new(reader).map_err(|e| AddonError::CorruptArchive(e.to_string()))?;

    let entries = validate_entries(&mut archive)?;
    let total = entries.len();

    for module in modules {
        erase_module(target_dir, module);
    }

    let mut report = InstallReport::default();
    for (index, relative) in entries.into_iter().enumerate() {
        let incomplete = |reason: String| AddonError::InstallIncomplete {
            extracted: index,
            total,
            reason,
        };

        let mut entry = archive
            .by_index(index)
            .map_err(|e| incomplete(e.to_string()))?;
        let outpath = target_dir.join(&relative);

        if entry.is_dir() {
            if outpath.is_file() {
                fs::remove_file(&outpath).map_err(|e| incomplete(e.to_string()))?;
            }
            fs::create_dir_all(&outpath).map_err(|e| incomplete(e.to_string()))?;
            report.directories += 1;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent).map_err(|e| incomplete(e.to_string()))?;
        }
        if outpath.is_dir() {
            fs::remove_dir_all(&outpath).map_err(|e| incomplete(e.to_string()))?;
        }

        let mut outfile = File::create(&outpath)
            .map_err(|e| incomplete(format!("{}: {}", relative.display(), e)))?;
        io::copy(&mut entry, &mut outfile)
            .map_err(|e| incomplete(format!("{}: {}", relative.display(), e)))?;
        report.files += 1;
    }

    debug!(
        "[INSTALLER] Extracted {} files, {} directories into {}",
        report.files,
        report.directories,
        target_dir.display()
    );
    Ok(report)
}

/// Returns every entry's relative path, rejecting names that escape the
/// target directory.
fn validate_entries<R: io::Read + Seek>(
    archive: &mut ZipArchive<R>,
) -> Result<Vec<PathBuf>, AddonError> {
    if archive.is_empty() {
        return Err(AddonError::CorruptArchive("archive is empty".to_string()));
    }

    let mut entries = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let entry = archive
            .by_index(index)
            .map_err(|e| AddonError::CorruptArchive(e.to_string()))?;
        let relative = entry.enclosed_name().ok_or_else(|| {
            AddonError::CorruptArchive(format!("unsafe entry name '{}'", entry.name()))
        })?;
        entries.push(relative);
    }

    Ok(entries)
}

/// Removes a module folder from the AddOns directory.
///
/// Names that are not a single plain folder name are ignored.
fn erase_module(target_dir: &Path, module: &str) {
    let mut components = Path::new(module).components();
    let is_plain = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !is_plain {
        warn!("[INSTALLER] Ignoring suspicious module name '{}'", module);
        return;
    }

    let path = target_dir.join(module);
    if !path.is_dir() {
        return;
    }

    debug!("[INSTALLER] Erasing {}", path.display());
    if let Err(e) = fs::remove_dir_all(&path) {
        warn!("[INSTALLER] Could not erase {}: {}", path.display(), e);
    }
}
