//! wau
//!
//! Keeps World of Warcraft addons up to date. The addons to track are listed
//! in a small text manifest inside the AddOns directory; each run asks the
//! addon host for the newest file of every listed addon and installs it when
//! its version differs from the recorded one.
//!
//! # Architecture
//!
//! - **addons**: Manifest store, host client, version resolver and archive installer
//! - **updater**: Per-addon update state machine and run driver
//! - **config**: Optional `~/.wau/config.toml`
//! - **logging**: stderr and file logging
//! - **cli**: Command-line arguments

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

pub mod addons;
pub mod cli;
pub mod config;
pub mod logging;
pub mod updater;

pub use addons::{AddonRecord, Manifest, ManifestStore};
pub use config::Config;
pub use updater::{RunReport, Updater};
