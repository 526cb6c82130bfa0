//! Init and Config commands.

use std::path::Path;

use crate::config::Settings;
use crate::error::ConfigError;

/// Run init command - create configuration file.
pub fn run_init(dir: &Path, force: bool) {
    match Settings::init_config_file(dir, force) {
        Ok(path) => {
            println!("Created configuration file at: {}", path.display());
            println!("Add entries to [sources] paths to start loading styles.");
        }
        Err(ConfigError::AlreadyExists { path }) => {
            eprintln!("Configuration file already exists at: {}", path.display());
            eprintln!("Use --force to overwrite");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

/// Run config command - display current configuration.
pub fn run_config(config: &Settings) {
    println!("Current Configuration:");
    println!("{}", "=".repeat(50));
    match toml::to_string_pretty(config) {
        Ok(toml_str) => println!("{toml_str}"),
        Err(e) => eprintln!("Error displaying config: {e}"),
    }
}
