//! Manifest storage for `wau_manifest.txt`.
//!
//! The manifest is a line-oriented text file kept inside the AddOns
//! directory:
//!
//! ```text
//! 2026-10-19T08:30:00Z
//! 61284 0 v2.1.0
//! 3358 1 -
//! ```
//!
//! The first line is the start time of the last successful run (or `-`).
//! Every following line is `<addon_id> <0|1> <version_or_dash>`, fields
//! separated by a single space. Lines end with `\n`; whatever follows the
//! last record (final newline, blank lines) is written back unchanged.
//!
//! Next to the manifest, `wau_host_stamp.txt` holds the host database
//! version seen by the last run that finished without errors.

use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat, SubsecRound, Utc};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// File name of the manifest inside the AddOns directory.
pub const MANIFEST_FILE_NAME: &str = "wau_manifest.txt";

/// File name of the host database stamp inside the AddOns directory.
pub const HOST_STAMP_FILE_NAME: &str = "wau_host_stamp.txt";

/// Sentinel for "never run" and "no version installed".
const UNSET: &str = "-";

/// Maximum manifest size (1MB).
const MAX_MANIFEST_SIZE: u64 = 1_048_576;

/// Errors that prevent a run from starting or finishing.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// No manifest file at the expected path.
    #[error("manifest not found at {}", .0.display())]
    NotFound(PathBuf),

    /// A line does not follow the manifest schema.
    #[error("malformed manifest (line {line}): {reason}")]
    Malformed { line: usize, reason: String },

    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ManifestError {
    fn malformed(line: usize, reason: impl Into<String>) -> Self {
        Self::Malformed {
            line,
            reason: reason.into(),
        }
    }
}

/// Time of the last successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LastRun {
    /// The tool has never completed a run against this manifest.
    Never,
    /// Start time of the last run. The text is kept as read so an untouched
    /// manifest is written back byte for byte.
    At {
        text: String,
        time: DateTime<FixedOffset>,
    },
}

impl LastRun {
    /// Builds a stamp for a run that started at `time`.
    #[must_use]
    pub fn stamp(time: DateTime<Utc>) -> Self {
        let time = time.trunc_subsecs(0);
        Self::At {
            text: time.to_rfc3339_opts(SecondsFormat::Secs, true),
            time: time.into(),
        }
    }

    /// Parses the first manifest line.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        if text == UNSET {
            return Some(Self::Never);
        }

        let time = DateTime::parse_from_rfc3339(text).ok().or_else(|| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc().into())
        })?;

        Some(Self::At {
            text: text.to_string(),
            time,
        })
    }

    /// Returns the textual form written to the manifest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Never => UNSET,
            Self::At { text, .. } => text,
        }
    }

    /// Returns the run time in UTC, if there was one.
    #[must_use]
    pub fn time(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Never => None,
            Self::At { time, .. } => Some(time.with_timezone(&Utc)),
        }
    }
}

/// One tracked addon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddonRecord {
    /// Project id on the addon host.
    pub id: String,
    /// Whether beta and alpha builds may be installed.
    pub allow_prerelease: bool,
    /// Label of the installed release; `None` until the first install.
    pub installed_version: Option<String>,
}

impl AddonRecord {
    /// Creates a record for an addon that has not been installed yet.
    #[must_use]
    pub fn new(id: impl Into<String>, allow_prerelease: bool) -> Self {
        let id = id.into();
        assert!(!id.is_empty(), "Addon ID must not be empty");

        Self {
            id,
            allow_prerelease,
            installed_version: None,
        }
    }

    /// Sets the installed version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.installed_version = Some(version.into());
        self
    }

    /// Parses a record line. Returns the reason on failure.
    fn parse_line(line: &str) -> Result<Self, String> {
        let fields: Vec<&str> = line.split(' ').collect();
        let [id, flag, version] = fields.as_slice() else {
            return Err(format!(
                "expected 3 fields separated by single spaces, found {}",
                fields.len()
            ));
        };
        if fields
            .iter()
            .any(|f| f.is_empty() || f.contains(char::is_whitespace))
        {
            return Err("fields must be separated by single spaces".to_string());
        }

        let allow_prerelease = match *flag {
            "0" => false,
            "1" => true,
            other => return Err(format!("pre-release flag must be 0 or 1, found '{}'", other)),
        };

        let installed_version = if *version == UNSET {
            None
        } else {
            Some((*version).to_string())
        };

        Ok(Self {
            id: (*id).to_string(),
            allow_prerelease,
            installed_version,
        })
    }

    /// Formats the record as a manifest line (without newline).
    fn to_line(&self) -> String {
        format!(
            "{} {} {}",
            self.id,
            u8::from(self.allow_prerelease),
            self.installed_version.as_deref().unwrap_or(UNSET)
        )
    }
}

/// In-memory manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    /// Last successful run.
    pub last_run: LastRun,
    /// Tracked addons in file order.
    records: Vec<AddonRecord>,
    /// Text after the last line's content, kept verbatim.
    trailer: String,
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new()
    }
}

impl Manifest {
    /// Creates an empty manifest that has never been run.
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_run: LastRun::Never,
            records: Vec::new(),
            trailer: "\n".to_string(),
        }
    }

    /// Parses manifest text.
    ///
    /// Carriage returns are rejected so that a loaded manifest is always
    /// saved back byte for byte.
    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        if let Some(pos) = content.find('\r') {
            let line = content[..pos].matches('\n').count() + 1;
            return Err(ManifestError::malformed(line, "carriage return in line ending"));
        }

        let body = content.trim_end();
        let trailer = content[body.len()..].to_string();

        let mut lines = body.split('\n');
        let first = lines.next().unwrap_or_default();
        if first.is_empty() {
            return Err(ManifestError::malformed(1, "missing timestamp line"));
        }

        let last_run = LastRun::parse(first).ok_or_else(|| {
            ManifestError::malformed(1, format!("'{}' is not a timestamp or '-'", first))
        })?;

        let mut manifest = Self {
            last_run,
            records: Vec::new(),
            trailer,
        };

        for (idx, line) in lines.enumerate() {
            let line_no = idx + 2;
            let record = AddonRecord::parse_line(line)
                .map_err(|reason| ManifestError::malformed(line_no, reason))?;

            if manifest.get(&record.id).is_some() {
                return Err(ManifestError::malformed(
                    line_no,
                    format!("duplicate add-on id '{}'", record.id),
                ));
            }
            manifest.records.push(record);
        }

        Ok(manifest)
    }

    /// Renders the manifest text.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(32 * (self.records.len() + 1));
        out.push_str(self.last_run.as_str());
        for record in &self.records {
            out.push('\n');
            out.push_str(&record.to_line());
        }
        out.push_str(&self.trailer);
        out
    }

    /// Adds a record. Returns false if the id is already tracked.
    pub fn add(&mut self, record: AddonRecord) -> bool {
        if self.get(&record.id).is_some() {
            return false;
        }
        self.records.push(record);
        true
    }

    /// Gets a record by addon id.
    #[must_use]
    pub fn get(&self, addon_id: &str) -> Option<&AddonRecord> {
        self.records.iter().find(|r| r.id == addon_id)
    }

    /// Returns the records in file order.
    #[must_use]
    pub fn records(&self) -> &[AddonRecord] {
        &self.records
    }

    /// Returns the records mutably. Ids must not be changed through this.
    pub fn records_mut(&mut self) -> &mut [AddonRecord] {
        &mut self.records
    }

    /// Number of tracked addons.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no addons are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Reads and writes the manifest file.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    /// Path to `wau_manifest.txt`.
    path: PathBuf,
}

impl ManifestStore {
    /// Creates a store for the manifest at `path`.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        assert!(!path.as_os_str().is_empty(), "path must not be empty");
        Self { path }
    }

    /// Creates a store for the manifest inside an AddOns directory.
    #[must_use]
    pub fn in_addons_dir(addons_dir: &Path) -> Self {
        Self::new(addons_dir.join(MANIFEST_FILE_NAME))
    }

    /// Returns the manifest path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads and parses the manifest.
    pub fn load(&self) -> Result<Manifest, ManifestError> {
        let metadata = match fs::metadata(&self.path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ManifestError::NotFound(self.path.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        if metadata.len() > MAX_MANIFEST_SIZE {
            return Err(ManifestError::malformed(
                0,
                format!("file exceeds {} bytes", MAX_MANIFEST_SIZE),
            ));
        }

        let content = fs::read_to_string(&self.path)?;
        let manifest = Manifest::parse(&content)?;

        info!(
            "[MANIFEST] Loaded {} add-on(s) from {}",
            manifest.len(),
            self.path.display()
        );
        Ok(manifest)
    }

    /// Writes the manifest. The file is replaced atomically.
    pub fn save(&self, manifest: &Manifest) -> Result<(), ManifestError> {
        let content = manifest.render();
        write_atomic(&self.path, &content)?;
        debug!("[MANIFEST] Saved {} bytes to {}", content.len(), self.path.display());
        Ok(())
    }

    /// Returns the host stamp path next to the manifest.
    #[must_use]
    pub fn host_stamp_path(&self) -> PathBuf {
        self.path.with_file_name(HOST_STAMP_FILE_NAME)
    }

    /// Reads the host database version recorded by the last clean run.
    pub fn load_host_stamp(&self) -> Result<Option<String>, ManifestError> {
        match fs::read_to_string(self.host_stamp_path()) {
            Ok(text) => {
                let stamp = text.trim();
                Ok((!stamp.is_empty()).then(|| stamp.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Records `stamp`, or removes the record when `None`.
    pub fn save_host_stamp(&self, stamp: Option<&str>) -> Result<(), ManifestError> {
        let path = self.host_stamp_path();
        match stamp {
            Some(stamp) => {
                write_atomic(&path, &format!("{}\n", stamp))?;
                debug!("[MANIFEST] Host stamp {} saved", stamp);
            }
            None => match fs::remove_file(&path) {
                Ok(()) => debug!("[MANIFEST] Host stamp cleared"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            },
        }
        Ok(())
    }
}

/// Writes `content` to a sibling temp file and renames it over `path`.
fn write_atomic(path: &Path, content: &str) -> io::Result<()> {
    let temp_path = path.with_extension("tmp");

    {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(content.as_bytes())?;
        file.flush()?;
        file.sync_all()?;
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }
    Ok(())
}
