//! Logging setup for wau.
//!
//! Warnings go to stderr; a full log of every run is written to
//! `~/.wau/logs/`, where files older than the retention period are removed
//! at startup.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// How long run logs are kept.
pub const DEFAULT_LOG_RETENTION_HOURS: u32 = 24;

/// Level of the run log file.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Level of stderr output.
pub const DEFAULT_CONSOLE_LEVEL: &str = "warn";

/// `[logging]` table of the config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Hours a run log is kept before startup removes it.
    #[serde(alias = "retention")]
    pub retention_hours: u32,
    /// Run log level (trace, debug, info, warn, error, off).
    pub level: String,
    /// Stderr level, same values.
    pub console_level: String,
    /// Set to false to skip the run log entirely.
    pub enabled: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            retention_hours: DEFAULT_LOG_RETENTION_HOURS,
            level: DEFAULT_LOG_LEVEL.to_string(),
            console_level: DEFAULT_CONSOLE_LEVEL.to_string(),
            enabled: true,
        }
    }
}

impl LogConfig {
    /// Maps a user-supplied level name onto a `tracing` level filter.
    ///
    /// Unknown names yield `None`.
    #[must_use]
    pub fn level_filter(name: &str) -> Option<LevelFilter> {
        let filter = match name.trim().to_ascii_lowercase().as_str() {
            "trace" => LevelFilter::TRACE,
            "debug" => LevelFilter::DEBUG,
            "info" => LevelFilter::INFO,
            "warn" | "warning" => LevelFilter::WARN,
            "error" => LevelFilter::ERROR,
            "off" | "none" | "disabled" => LevelFilter::OFF,
            _ => return None,
        };
        Some(filter)
    }

    /// Rewrites both levels in canonical lowercase form. Unknown names fall
    /// back to the defaults.
    pub fn normalize(&mut self) {
        self.level = canonical(&self.level, DEFAULT_LOG_LEVEL);
        self.console_level = canonical(&self.console_level, DEFAULT_CONSOLE_LEVEL);
    }

    /// Raises the stderr level by `verbosity` steps (`-v`, `-vv`).
    pub fn apply_verbosity(&mut self, verbosity: u8) {
        let level = match verbosity {
            0 => return,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        };
        self.console_level = level.to_string().to_ascii_lowercase();
    }

    fn file_logging_enabled(&self) -> bool {
        self.enabled && Self::level_filter(&self.level) != Some(LevelFilter::OFF)
    }
}

fn canonical(name: &str, fallback: &str) -> String {
    LogConfig::level_filter(name)
        .map_or_else(|| fallback.to_string(), |f| f.to_string().to_ascii_lowercase())
}

/// Returns `~/.wau/logs`.
#[must_use]
pub fn log_directory() -> PathBuf {
    crate::config::wau_dir().join("logs")
}

/// Returns a fresh log file path for this run.
#[must_use]
pub fn current_log_path() -> PathBuf {
    let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
    log_directory().join(format!("wau_{}.log", stamp))
}

/// Removes `*.log` files in `dir` last modified more than `retention` ago.
/// Returns how many were removed. A missing directory is not an error.
pub fn remove_expired_logs(dir: &Path, retention: Duration) -> io::Result<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let now = SystemTime::now();
    let removed = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "log"))
        .filter(|entry| {
            entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .is_some_and(|age| age > retention)
        })
        .filter(|entry| fs::remove_file(entry.path()).is_ok())
        .count();

    Ok(removed)
}

fn console_layer<S>(config: &LogConfig) -> impl Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.console_level));

    fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .with_filter(filter)
}

/// Installs stderr logging only.
pub fn init_console(config: &LogConfig) {
    tracing_subscriber::registry()
        .with(console_layer(config))
        .init();
}

/// Installs stderr logging plus, when enabled, a run log under
/// [`log_directory`]. Returns the run log path.
///
/// # Errors
/// Fails if the log directory or file cannot be created. Nothing is
/// installed in that case, so the caller can fall back to [`init_console`].
pub fn init(config: &LogConfig) -> io::Result<Option<PathBuf>> {
    if !config.file_logging_enabled() {
        init_console(config);
        return Ok(None);
    }

    let dir = log_directory();
    fs::create_dir_all(&dir)?;
    let retention = Duration::from_secs(u64::from(config.retention_hours) * 3600);
    let removed = remove_expired_logs(&dir, retention)?;

    let path = current_log_path();
    let file = File::create(&path)?;

    let file_layer = fmt::layer()
        .with_writer(file.with_max_level(tracing::Level::TRACE))
        .with_ansi(false)
        .with_target(true)
        .with_filter(EnvFilter::new(&config.level));

    tracing_subscriber::registry()
        .with(console_layer(config))
        .with(file_layer)
        .init();

    tracing::info!("wau {} started", env!("CARGO_PKG_VERSION"));
    tracing::info!("Run log: {} (level {})", path.display(), config.level);
    if removed > 0 {
        tracing::info!("Removed {} expired run log(s)", removed);
    }

    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LogConfig::default();
        assert_eq!(config.retention_hours, 24);
        assert_eq!(config.level, "info");
        assert_eq!(config.console_level, "warn");
        assert!(config.file_logging_enabled());
    }

    #[test]
    fn test_level_filter_names() {
        assert_eq!(LogConfig::level_filter("DEBUG"), Some(LevelFilter::DEBUG));
        assert_eq!(LogConfig::level_filter(" warning "), Some(LevelFilter::WARN));
        assert_eq!(LogConfig::level_filter("none"), Some(LevelFilter::OFF));
        assert_eq!(LogConfig::level_filter("loud"), None);
    }

    #[test]
    fn test_normalize() {
        let mut config = LogConfig {
            level: "WARNING".to_string(),
            console_level: "chatty".to_string(),
            ..LogConfig::default()
        };
        config.normalize();
        assert_eq!(config.level, "warn");
        assert_eq!(config.console_level, DEFAULT_CONSOLE_LEVEL);
    }

    #[test]
    fn test_apply_verbosity() {
        let mut config = LogConfig::default();
        config.apply_verbosity(0);
        assert_eq!(config.console_level, "warn");
        config.apply_verbosity(2);
        assert_eq!(config.console_level, "debug");
        config.apply_verbosity(7);
        assert_eq!(config.console_level, "trace");
    }

    #[test]
    fn test_level_off_disables_file() {
        let config = LogConfig {
            level: "off".to_string(),
            ..LogConfig::default()
        };
        assert!(!config.file_logging_enabled());
    }

    #[test]
    fn test_remove_expired_logs_keeps_recent_and_other_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("wau_recent.log"), "x").unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let removed = remove_expired_logs(dir.path(), Duration::from_secs(3600)).unwrap();

        assert_eq!(removed, 0);
        assert!(dir.path().join("wau_recent.log").exists());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn test_remove_expired_logs_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("logs");
        assert_eq!(remove_expired_logs(&missing, Duration::ZERO).unwrap(), 0);
    }

    #[test]
    fn test_log_paths_live_under_wau_dir() {
        let dir = log_directory();
        assert!(dir.ends_with(".wau/logs"));
        let file = current_log_path();
        assert!(file.starts_with(&dir));
        assert!(file.to_string_lossy().ends_with(".log"));
    }
}
