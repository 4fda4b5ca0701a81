//! wau - Main entry point.
//!
//! Usage: wau [OPTIONS] <ADDONS_DIR>
//!
//! Reads `<ADDONS_DIR>/wau_manifest.txt`, updates every listed addon and
//! writes the manifest back. Exits with 0 when the run completes, even if
//! some addons failed, and 1 when the manifest cannot be read or written.

use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};

use wau::addons::{HostResolver, ZipInstaller};
use wau::cli::Cli;
use wau::config::Config;
use wau::logging;
use wau::updater::{RunReport, Updater};

const NOTICE: &str = "\
wau  Copyright (C) 2021  easimer <easimer@gmail.com>
This program comes with ABSOLUTELY NO WARRANTY.
This is free software, and you are welcome to redistribute it under certain
conditions.
";

fn main() -> ExitCode {
    let cli = Cli::parse();
    println!("{}", NOTICE);

    let config_path = cli.config_path();
    let (mut config, config_error) = match Config::load(&config_path) {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    cli.apply(&mut config);

    if let Err(e) = logging::init(&config.logging) {
        logging::init_console(&config.logging);
        warn!("File logging unavailable: {}", e);
    }
    if let Some(e) = config_error {
        warn!("Ignoring config file {}: {}", config_path.display(), e);
    }

    info!("API URL: {}", config.api_url);
    info!("Add-ons path: {}", cli.addons_dir.display());
    info!("Game flavor: {}", config.flavor);

    let code = run(&cli, &config);

    if cli.pause {
        pause();
    }

    code
}

/// Builds the updater from `config` and runs it once.
fn run(cli: &Cli, config: &Config) -> ExitCode {
    let host = match config.host_client() {
        Ok(host) => host,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let updater = Updater::new(
        HostResolver::new(host.clone(), config.flavor),
        ZipInstaller::new(host),
        cli.addons_dir.clone(),
    )
    .with_force(cli.force);

    match updater.run() {
        Ok(report) => {
            print_report(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Prints one line per addon and a totals line.
fn print_report(report: &RunReport) {
    if report.skipped {
        println!("Add-ons are up to date; the host has no changes since the last run.");
        println!("Pass --force to check anyway.");
        return;
    }

    for addon in &report.addons {
        println!("{}", addon);
    }
    println!(
        "{} updated, {} unchanged, {} failed",
        report.updated(),
        report.unchanged(),
        report.failed()
    );
}

/// Waits for Enter when attached to a terminal.
fn pause() {
    if !atty::is(atty::Stream::Stdin) {
        return;
    }

    print!("Press Enter to continue...");
    let _ = io::stdout().flush();
    let mut input = String::new();
    let _ = io::stdin().read_line(&mut input);
}
