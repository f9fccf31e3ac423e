// Copyright (c) 2024 cluster-controller contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! CLI entry point: parses settings files and `-d` discovery entries,
//! validates config, initializes logging, then hands off to
//! [`super::ServerContext`].

use std::path::PathBuf;

use clap::Parser;
use tokio::runtime::Runtime;

use super::ServerContext;
use crate::config::Config;
use crate::error::{Error, ErrorKind};
use crate::log::init_log;

/// Cluster-controller messaging core daemon.
#[derive(Parser, Debug)]
#[command(name = "cluster-controllerd", version, about)]
struct Cli {
    /// One or more TOML settings files, merged in the given order: later
    /// files override fields set by earlier ones.
    #[arg(required = true)]
    settings: Vec<PathBuf>,

    /// Preload provisioned routing entries from a discovery entries JSON
    /// file, registered as sticky entries at startup.
    #[arg(short = 'd', long = "discovery-entries", value_name = "discoveryEntries.json")]
    discovery_entries: Option<PathBuf>,
}

/// Entry point of the daemon.
///
/// # Errors
///
/// Returns error (and the caller should map it to a non-zero exit code)
/// if a settings file is missing, fails to parse, or fails validation, or
/// if logging or the tokio runtime can't be initialized.
pub fn run_server() -> Result<(), Error> {
    let cli = Cli::parse();

    let mut config = load_config(&cli.settings)?;
    if let Some(discovery_entries) = cli.discovery_entries {
        config.discovery_mut().set_entries_file(discovery_entries);
    }
    config.validate()?;

    init_log(config.log())?;

    let runtime = Runtime::new()?;
    ServerContext::run_loop(config, &runtime)
}

/// Run server with a predefined config.
///
/// Useful for integration tests.
///
/// # Errors
///
/// Returns error if config fails validation or the tokio runtime can't be
/// initialized.
pub fn run_server_with_config(config: Config) -> Result<(), Error> {
    config.validate()?;
    init_log(config.log())?;
    let runtime = Runtime::new()?;
    ServerContext::run_loop(config, &runtime)
}

fn load_config(settings_files: &[PathBuf]) -> Result<Config, Error> {
    let mut merged = toml::Value::Table(toml::map::Map::new());
    for path in settings_files {
        let content = std::fs::read_to_string(path).map_err(|err| {
            Error::from_string(
                ErrorKind::ConfigError,
                format!("Failed to read settings file {path:?}: {err}"),
            )
        })?;
        let layer: toml::Value = toml::from_str(&content).map_err(|err| {
            Error::from_string(
                ErrorKind::ConfigError,
                format!("Invalid settings file {path:?}: {err}"),
            )
        })?;
        merge_toml(&mut merged, layer);
    }

    merged.try_into().map_err(|err| {
        Error::from_string(ErrorKind::ConfigError, format!("Invalid merged config: {err}"))
    })
}

/// Deep-merge `overlay` into `base`: tables merge key by key, any other
/// value in `overlay` replaces the one in `base` outright.
fn merge_toml(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(base_value) => merge_toml(base_value, overlay_value),
                    None => {
                        base_table.insert(key, overlay_value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
