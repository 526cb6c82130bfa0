//! Watch command - run the engine until interrupted.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use console::style;

use crate::capabilities::Capabilities;
use crate::config::Settings;
use crate::engine::{Engine, SettingsFile};
use crate::error::SinkError;
use crate::sink::{EventSink, JsonLinesSink};
use crate::source::{CssEvent, Theme};
use crate::watcher::SettingsWatcher;

/// Human-readable event printer.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

#[async_trait]
impl EventSink for ConsoleSink {
    async fn handle(&self, event: CssEvent) -> Result<(), SinkError> {
        match &event {
            CssEvent::Add { file } => {
                let theme = match file.theme {
                    Theme::None => String::new(),
                    theme => format!(" @{}", theme.as_str()),
                };
                println!(
                    "{} {} {}",
                    style("+").green().bold(),
                    file.path,
                    style(format!("({}, {} bytes{theme})", file.file_type, file.src.len())).dim()
                );
            }
            CssEvent::Remove { path } => println!("{} {path}", style("-").red().bold()),
            CssEvent::RemoveDir { path } => {
                println!("{} {path} {}", style("-").red().bold(), style("(directory)").dim())
            }
        }
        Ok(())
    }
}

/// Run the watch command.
pub async fn run(
    config: &Settings,
    config_path: PathBuf,
    caps: Arc<dyn Capabilities>,
    json: bool,
) -> anyhow::Result<()> {
    let sink: Arc<dyn EventSink> = if json {
        Arc::new(JsonLinesSink)
    } else {
        Arc::new(ConsoleSink)
    };

    let debounce = Duration::from_millis(config.watch.debounce_ms);
    let watches = caps.watches();
    let engine = Engine::new(caps, Arc::new(SettingsFile::at(&config_path)), &config.fetch)?
        .with_debounce(debounce);
    let handle = engine.init(sink)?;

    let settings_watcher = if watches && config_path.exists() {
        match SettingsWatcher::spawn(config_path.clone(), handle.queue(), debounce) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                tracing::warn!("[watch] settings changes will not be picked up: {e}");
                None
            }
        }
    } else {
        None
    };

    if !json {
        eprintln!("Watching sources. Press Ctrl+C to stop.");
    }

    tokio::signal::ctrl_c().await?;

    if let Some(watcher) = settings_watcher {
        watcher.stop().await?;
    }
    handle.shutdown().await?;

    Ok(())
}
