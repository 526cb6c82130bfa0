//! Resolve command - classify configured sources without loading them.

use console::style;
use serde::Serialize;

use crate::capabilities::Capabilities;
use crate::config::Settings;
use crate::source::{SourceKind, classify};

/// One line of `resolve` output.
#[derive(Debug, Serialize)]
pub struct Resolution {
    pub entry: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Classify every configured entry in order, keeping failures.
pub async fn resolve_entries(config: &Settings, caps: &dyn Capabilities) -> Vec<Resolution> {
    let home = caps.home_dir();
    let mut out = Vec::new();

    for entry in config.sources.entries() {
        let resolution = match classify(entry, home.as_deref()).await {
            Ok(source) => {
                let (kind, target) = match &source.kind {
                    SourceKind::File(path) => ("file", path.display().to_string()),
                    SourceKind::Directory(path) if caps.lists_directories() => {
                        ("directory", path.display().to_string())
                    }
                    SourceKind::Directory(path) => ("skipped", path.display().to_string()),
                    SourceKind::Url(url) => ("url", url.to_string()),
                };
                Resolution {
                    entry: entry.clone(),
                    kind: Some(kind),
                    key: Some(source.key.clone()),
                    target: Some(target),
                    theme: Some(source.theme.as_str()),
                    error: None,
                }
            }
            Err(e) => Resolution {
                entry: entry.clone(),
                kind: None,
                key: None,
                target: None,
                theme: None,
                error: Some(e.to_string()),
            },
        };
        out.push(resolution);
    }

    out
}

/// Run the resolve command.
pub async fn run(config: &Settings, caps: &dyn Capabilities, json: bool) -> anyhow::Result<()> {
    let resolutions = resolve_entries(config, caps).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&resolutions)?);
        return Ok(());
    }

    if resolutions.is_empty() {
        println!("No sources configured.");
        return Ok(());
    }

    println!("Sources ({} mode):", caps.kind());
    for resolution in &resolutions {
        match (&resolution.kind, &resolution.error) {
            (Some(kind), None) => {
                let theme = resolution.theme.unwrap_or("none");
                println!(
                    "  {:<10} {} {}",
                    style(kind).green(),
                    resolution.target.as_deref().unwrap_or_default(),
                    style(format!("[{theme}]")).dim()
                );
            }
            (_, Some(error)) => {
                println!("  {:<10} {}", style("invalid").red(), resolution.entry);
                println!("             {}", style(error).dim());
            }
            (None, None) => {}
        }
    }

    Ok(())
}
