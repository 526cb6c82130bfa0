use std::path::{Path, PathBuf};

use clap::Parser;
use stylesync::capabilities;
use stylesync::cli::{Cli, Commands, commands};
use stylesync::config::{CONFIG_DIR, CONFIG_FILE, Settings};

/// Load settings from `--config` or the workspace, returning the file path
/// they belong to so migrations and the settings watcher can use it.
fn load_settings(custom: Option<&Path>) -> (Settings, PathBuf) {
    let path = match custom {
        Some(path) => path.to_path_buf(),
        None => Settings::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(CONFIG_FILE)),
    };

    match Settings::load_from(&path) {
        Ok(settings) => (settings, path),
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Commands::Init { force } = cli.command {
        let dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        commands::init::run_init(&dir, force);
        return;
    }

    let (mut config, config_path) = load_settings(cli.config.as_deref());
    stylesync::logging::init_with_config(&config.logging);

    match config.migrate_legacy_sources() {
        Ok(true) => match config.save(&config_path) {
            Ok(()) => stylesync::log_event!("config", "saved migrated settings", "{}", config_path.display()),
            Err(e) => tracing::warn!("[config] could not save migrated settings: {e}"),
        },
        Ok(false) => {}
        Err(e) => tracing::warn!("[config] legacy source migration failed: {e}"),
    }

    let result = match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Config => {
            commands::init::run_config(&config);
            Ok(())
        }
        Commands::Resolve { json } => {
            let caps = capabilities::select(config.runtime.mode);
            commands::resolve::run(&config, caps.as_ref(), json).await
        }
        Commands::Build { output, theme } => {
            let caps = capabilities::select(config.runtime.mode);
            commands::build::run(&config, caps, output, theme.map(Into::into)).await
        }
        Commands::Watch { json } => {
            let caps = capabilities::select(config.runtime.mode);
            commands::watch::run(&config, config_path, caps, json).await
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
