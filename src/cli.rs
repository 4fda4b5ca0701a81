//! Command-line interface.

use std::path::PathBuf;

use clap::builder::NonEmptyStringValueParser;
use clap::{ArgAction, Parser};

use crate::addons::GameFlavor;
use crate::config::Config;

/// Keeps the World of Warcraft addons listed in `wau_manifest.txt` up to date.
#[derive(Debug, Parser)]
#[command(name = "wau", version, about, long_about = None)]
pub struct Cli {
    /// Path to the World of Warcraft AddOns directory.
    pub addons_dir: PathBuf,

    /// Wait for Enter before exiting.
    #[arg(short, long)]
    pub pause: bool,

    /// Game branch to update for [default: retail].
    #[arg(short = 'g', long, value_enum)]
    pub flavor: Option<GameFlavor>,

    /// Check addons even if the host database has not changed since the last run.
    #[arg(short, long)]
    pub force: bool,

    /// Base URL of the addon host API.
    #[arg(short, long, value_name = "URL", value_parser = NonEmptyStringValueParser::new())]
    pub api_url: Option<String>,

    /// Config file [default: ~/.wau/config.toml].
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print more on stderr (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Returns the config file path to read.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// Applies command-line overrides to `config`.
    pub fn apply(&self, config: &mut Config) {
        if let Some(flavor) = self.flavor {
            config.flavor = flavor;
        }
        if let Some(ref url) = self.api_url {
            config.api_url = url.clone();
        }
        config.logging.apply_verbosity(self.verbose);
    }
}
