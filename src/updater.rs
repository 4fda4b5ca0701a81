//! Update driver.
//!
//! Walks the manifest one addon at a time, resolves the latest release,
//! installs it when the label differs from the recorded one and persists
//! the manifest once at the end of the run.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::addons::{
    AddonError, AddonRecord, ArchiveInstaller, LastRun, Manifest, ManifestError, ManifestStore,
    VersionResolver,
};

/// Processing phase of a single addon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddonPhase {
    /// Not looked at yet.
    Pending,
    /// Asking the host for the latest release.
    Resolving,
    /// Recorded version matches the latest release.
    UpToDate,
    /// Downloading and extracting a new release.
    Installing,
    /// New release installed and recorded.
    Installed,
    /// Resolution or installation failed.
    Failed,
}

impl AddonPhase {
    /// Returns true if this phase ends processing of the addon.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::UpToDate | Self::Installed | Self::Failed)
    }

    /// Returns a display string for this phase.
    #[must_use]
    pub fn display(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Resolving => "resolving",
            Self::UpToDate => "up to date",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Failed => "failed",
        }
    }
}

/// Result of processing one addon.
#[derive(Debug)]
pub enum AddonOutcome {
    /// Nothing to do.
    UpToDate { version: String },
    /// A new release was installed.
    Updated { from: Option<String>, to: String },
    /// The addon was skipped; its record is unchanged.
    Failed(AddonError),
}

impl AddonOutcome {
    /// Final phase reached by the addon.
    #[must_use]
    pub fn phase(&self) -> AddonPhase {
        match self {
            Self::UpToDate { .. } => AddonPhase::UpToDate,
            Self::Updated { .. } => AddonPhase::Installed,
            Self::Failed(_) => AddonPhase::Failed,
        }
    }
}

/// Per-addon summary line.
#[derive(Debug)]
pub struct AddonReport {
    /// Addon id from the manifest.
    pub addon_id: String,
    /// Display name, when the host told us one.
    pub addon_name: Option<String>,
    /// What happened.
    pub outcome: AddonOutcome,
}

impl fmt::Display for AddonReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.addon_name {
            Some(name) => write!(f, "{} ({}): ", name, self.addon_id)?,
            None => write!(f, "{}: ", self.addon_id)?,
        }
        match &self.outcome {
            AddonOutcome::UpToDate { version } => write!(f, "unchanged ({})", version),
            AddonOutcome::Updated { from, to } => write!(
                f,
                "updated from {} to {}",
                from.as_deref().unwrap_or("nothing"),
                to
            ),
            AddonOutcome::Failed(e) => write!(f, "error: {}", e),
        }
    }
}

/// Result of a whole run.
#[derive(Debug)]
pub struct RunReport {
    /// When the run started; written to the manifest.
    pub started_at: DateTime<Utc>,
    /// True when the host database had not changed and nothing was done.
    pub skipped: bool,
    /// One entry per tracked addon, in manifest order.
    pub addons: Vec<AddonReport>,
}

impl RunReport {
    fn count(&self, phase: AddonPhase) -> usize {
        self.addons
            .iter()
            .filter(|r| r.outcome.phase() == phase)
            .count()
    }

    /// Number of addons that were updated.
    #[must_use]
    pub fn updated(&self) -> usize {
        self.count(AddonPhase::Installed)
    }

    /// Number of addons that were already current.
    #[must_use]
    pub fn unchanged(&self) -> usize {
        self.count(AddonPhase::UpToDate)
    }

    /// Number of addons that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(AddonPhase::Failed)
    }
}

/// Drives a run over one AddOns directory.
pub struct Updater<R, I> {
    /// Finds the latest releases.
    resolver: R,
    /// Installs releases.
    installer: I,
    /// AddOns directory holding the manifest and the addon folders.
    addons_dir: PathBuf,
    /// Process addons even if the host database is unchanged.
    force: bool,
}

impl<R: VersionResolver, I: ArchiveInstaller> Updater<R, I> {
    /// Creates a driver for `addons_dir`.
    #[must_use]
    pub fn new(resolver: R, installer: I, addons_dir: impl Into<PathBuf>) -> Self {
        Self {
            resolver,
            installer,
            addons_dir: addons_dir.into(),
            force: false,
        }
    }

    /// Sets whether the host database timestamp check is bypassed.
    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Returns the resolver.
    #[must_use]
    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Returns the installer.
    #[must_use]
    pub fn installer(&self) -> &I {
        &self.installer
    }

    /// Returns the AddOns directory.
    #[must_use]
    pub fn addons_dir(&self) -> &Path {
        &self.addons_dir
    }

    /// Loads the manifest, updates every addon and saves the manifest.
    ///
    /// The run is skipped when the host database has not changed since the
    /// last run that finished without errors and every tracked addon has
    /// been installed. Only manifest errors are returned; per-addon failures
    /// are part of the report.
    pub fn run(&self) -> Result<RunReport, ManifestError> {
        let started_at = Utc::now();
        let store = ManifestStore::in_addons_dir(&self.addons_dir);
        let mut manifest = store.load()?;

        let recorded = store.load_host_stamp()?;
        let remote = self.resolver.database_version();
        if self.host_unchanged(&manifest, recorded.as_deref(), remote.as_deref()) {
            info!("[UPDATER] Host database unchanged since last run; pass --force to check anyway");
            return Ok(RunReport {
                started_at,
                skipped: true,
                addons: Vec::new(),
            });
        }

        if recorded.is_some() {
            store.save_host_stamp(None)?;
        }

        let report = self.update_manifest(&mut manifest, started_at);
        store.save(&manifest)?;

        if report.failed() == 0 {
            store.save_host_stamp(remote.as_deref())?;
        } else {
            info!(
                "[UPDATER] {} add-on(s) failed; the next run checks the host again",
                report.failed()
            );
        }

        Ok(report)
    }

    /// Processes every record of `manifest` in order and stamps it with
    /// `started_at`, whatever the individual outcomes.
    pub fn update_manifest(&self, manifest: &mut Manifest, started_at: DateTime<Utc>) -> RunReport {
        info!("[UPDATER] Checking {} add-on(s)", manifest.len());
        let addons = manifest
            .records_mut()
            .iter_mut()
            .map(|record| self.process_addon(record))
            .collect();

        manifest.last_run = LastRun::stamp(started_at);

        RunReport {
            started_at,
            skipped: false,
            addons,
        }
    }

    /// Resolves and, if needed, installs one addon.
    ///
    /// The record's version changes only after a successful install.
    pub fn process_addon(&self, record: &mut AddonRecord) -> AddonReport {
        debug!("[UPDATER] {}: {}", record.id, AddonPhase::Resolving.display());

        let release = match self.resolver.resolve(&record.id, record.allow_prerelease) {
            Ok(release) => release,
            Err(e) => {
                warn!("[UPDATER] {}: could not resolve: {}", record.id, e);
                return AddonReport {
                    addon_id: record.id.clone(),
                    addon_name: None,
                    outcome: AddonOutcome::Failed(e),
                };
            }
        };

        let addon_id = record.id.clone();
        let addon_name = (!release.addon_name.is_empty()).then(|| release.addon_name.clone());
        let report = |outcome: AddonOutcome| {
            debug!("[UPDATER] {}: {}", addon_id, outcome.phase().display());
            AddonReport {
                addon_id: addon_id.clone(),
                addon_name: addon_name.clone(),
                outcome,
            }
        };

        if record.installed_version.as_deref() == Some(release.label.as_str()) {
            info!("[UPDATER] {}: up to date ({})", record.id, release.label);
            return report(AddonOutcome::UpToDate {
                version: release.label,
            });
        }

        info!(
            "[UPDATER] {}: out of date '{}' != '{}'",
            record.id,
            record.installed_version.as_deref().unwrap_or("-"),
            release.label
        );
        debug!("[UPDATER] {}: {}", record.id, AddonPhase::Installing.display());

        if let Err(e) = self.installer.install(&release, &self.addons_dir) {
            warn!("[UPDATER] {}: install failed: {}", record.id, e);
            return report(AddonOutcome::Failed(e));
        }

        let from = record.installed_version.replace(release.label.clone());
        report(AddonOutcome::Updated {
            from,
            to: release.label,
        })
    }

    /// True when a run can be skipped: not forced, run before, nothing
    /// waiting for a first install, and the host reports the same database
    /// version that the last clean run recorded.
    fn host_unchanged(&self, manifest: &Manifest, recorded: Option<&str>, remote: Option<&str>) -> bool {
        if self.force || manifest.last_run == LastRun::Never {
            return false;
        }
        if manifest.records().iter().any(|r| r.installed_version.is_none()) {
            debug!("[UPDATER] Manifest lists add-ons that were never installed");
            return false;
        }

        match (recorded, remote) {
            (Some(recorded), Some(remote)) => {
                debug!("[UPDATER] Host database {} vs recorded {}", remote, recorded);
                recorded == remote
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addons::{GameFlavor, InstallReport, VersionInfo};
    use std::cell::RefCell;

    struct FixedResolver {
        label: &'static str,
        database: Option<&'static str>,
    }

    impl VersionResolver for FixedResolver {
        fn resolve(&self, addon_id: &str, _allow: bool) -> Result<VersionInfo, AddonError> {
            if addon_id == "missing" {
                return Err(AddonError::NoCompatibleFile {
                    addon_id: addon_id.to_string(),
                    flavor: GameFlavor::Retail,
                });
            }
            Ok(VersionInfo::new(self.label, "http://x/a.zip").with_addon_name("Fixed"))
        }

        fn database_version(&self) -> Option<String> {
            self.database.map(str::to_string)
        }
    }

    #[derive(Default)]
    struct CountingInstaller {
        calls: RefCell<usize>,
        fail: bool,
    }

    impl ArchiveInstaller for CountingInstaller {
        fn install(&self, _: &VersionInfo, _: &Path) -> Result<InstallReport, AddonError> {
            *self.calls.borrow_mut() += 1;
            if self.fail {
                return Err(AddonError::CorruptArchive("bad".to_string()));
            }
            Ok(InstallReport::default())
        }
    }

    fn updater(label: &'static str, fail: bool) -> Updater<FixedResolver, CountingInstaller> {
        let installer = CountingInstaller {
            fail,
            ..CountingInstaller::default()
        };
        Updater::new(FixedResolver { label, database: None }, installer, "/nonexistent")
    }

    #[test]
    fn test_phase_is_finished() {
        assert!(!AddonPhase::Pending.is_finished());
        assert!(!AddonPhase::Resolving.is_finished());
        assert!(!AddonPhase::Installing.is_finished());
        assert!(AddonPhase::UpToDate.is_finished());
        assert!(AddonPhase::Installed.is_finished());
        assert!(AddonPhase::Failed.is_finished());
    }

    #[test]
    fn test_process_addon_installs_new_version() {
        let updater = updater("v2", false);
        let mut record = AddonRecord::new("61284", false);

        let report = updater.process_addon(&mut record);

        assert_eq!(report.outcome.phase(), AddonPhase::Installed);
        assert_eq!(record.installed_version.as_deref(), Some("v2"));
        assert_eq!(report.to_string(), "Fixed (61284): updated from nothing to v2");
        assert_eq!(*updater.installer().calls.borrow(), 1);
    }

    #[test]
    fn test_process_addon_up_to_date_skips_install() {
        let updater = updater("v2", false);
        let mut record = AddonRecord::new("61284", false).with_version("v2");

        let report = updater.process_addon(&mut record);

        assert_eq!(report.outcome.phase(), AddonPhase::UpToDate);
        assert_eq!(report.to_string(), "Fixed (61284): unchanged (v2)");
        assert_eq!(*updater.installer().calls.borrow(), 0);
    }

    #[test]
    fn test_process_addon_install_failure_keeps_version() {
        let updater = updater("v3", true);
        let mut record = AddonRecord::new("61284", false).with_version("v2");

        let report = updater.process_addon(&mut record);

        assert_eq!(report.outcome.phase(), AddonPhase::Failed);
        assert_eq!(record.installed_version.as_deref(), Some("v2"));
        assert!(report.to_string().starts_with("Fixed (61284): error: corrupt archive"));
    }

    #[test]
    fn test_process_addon_resolve_failure() {
        let updater = updater("v3", false);
        let mut record = AddonRecord::new("missing", true);

        let report = updater.process_addon(&mut record);

        assert!(matches!(
            report.outcome,
            AddonOutcome::Failed(AddonError::NoCompatibleFile { .. })
        ));
        assert_eq!(record.installed_version, None);
        assert!(report.to_string().starts_with("missing: error:"));
        assert_eq!(*updater.installer().calls.borrow(), 0);
    }

    #[test]
    fn test_version_compare_is_exact() {
        let updater = updater("V2", false);
        let mut record = AddonRecord::new("1", false).with_version("v2");

        let report = updater.process_addon(&mut record);

        assert_eq!(report.outcome.phase(), AddonPhase::Installed);
        assert_eq!(record.installed_version.as_deref(), Some("V2"));
    }

    fn installed_manifest() -> Manifest {
        let mut manifest = Manifest::new();
        manifest.last_run = LastRun::stamp(Utc::now());
        manifest.add(AddonRecord::new("1", false).with_version("v1"));
        manifest
    }

    #[test]
    fn test_host_unchanged_needs_equal_stamps() {
        let updater = updater("v2", false);
        let manifest = installed_manifest();

        assert!(updater.host_unchanged(&manifest, Some("t1"), Some("t1")));
        assert!(!updater.host_unchanged(&manifest, Some("t1"), Some("t2")));
        assert!(!updater.host_unchanged(&manifest, None, Some("t1")));
        assert!(!updater.host_unchanged(&manifest, Some("t1"), None));
    }

    #[test]
    fn test_host_unchanged_never_skips_uninstalled_or_forced() {
        let updater = updater("v2", false);

        let mut manifest = installed_manifest();
        manifest.add(AddonRecord::new("42", false));
        assert!(!updater.host_unchanged(&manifest, Some("t1"), Some("t1")));

        let mut never_run = installed_manifest();
        never_run.last_run = LastRun::Never;
        assert!(!updater.host_unchanged(&never_run, Some("t1"), Some("t1")));

        let forced = updater.with_force(true);
        assert!(!forced.host_unchanged(&installed_manifest(), Some("t1"), Some("t1")));
    }

    #[test]
    fn test_update_manifest_stamps_even_with_failures() {
        let updater = updater("v2", true);
        let mut manifest = installed_manifest();

        let started = Utc::now();
        let report = updater.update_manifest(&mut manifest, started);

        assert!(!report.skipped);
        assert_eq!(report.failed(), 1);
        assert_eq!(manifest.last_run, LastRun::stamp(started));
        assert_eq!(manifest.records()[0].installed_version.as_deref(), Some("v1"));
    }
}
