//! Add-on tracking and installation.
//!
//! # Architecture
//!
//! - **types**: Shared data structures (`VersionInfo`, `GameFlavor`, `AddonError`)
//! - **manifest**: Reading and writing `wau_manifest.txt`
//! - **host**: Blocking HTTP client for the addon host
//! - **resolver**: Picks the latest acceptable file of an addon
//! - **installer**: Downloads and extracts release archives
//!
//! # Usage
//!
//! ```no_run
//! use std::path::Path;
//! use std::time::Duration;
//! use wau::addons::{DEFAULT_API_URL, DEFAULT_USER_AGENT, GameFlavor, HostClient, HostResolver, ZipInstaller};
//! use wau::updater::Updater;
//!
//! let host = HostClient::new(DEFAULT_API_URL, DEFAULT_USER_AGENT, Duration::from_secs(30)).expect("client");
//! let resolver = HostResolver::new(host.clone(), GameFlavor::Retail);
//! let installer = ZipInstaller::new(host);
//! let updater = Updater::new(resolver, installer, Path::new("/games/wow/Interface/AddOns"));
//! let report = updater.run().expect("manifest");
//! println!("{} updated", report.updated());
//! ```

mod host;
mod installer;
mod manifest;
mod resolver;
mod types;

pub use host::{
    DEFAULT_API_URL, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT, HostAddon, HostClient, HostFile,
    HostModule, parse_host_date,
};
pub use installer::{ArchiveInstaller, ZipInstaller, install_archive};
pub use manifest::{
    AddonRecord, HOST_STAMP_FILE_NAME, LastRun, MANIFEST_FILE_NAME, Manifest, ManifestError,
    ManifestStore,
};
pub use resolver::{HostResolver, VersionResolver, select_latest};
pub use types::{AddonError, GameFlavor, InstallReport, VersionInfo, version_label};
