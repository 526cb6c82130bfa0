//! Build command - one pass into the in-memory registry, then render.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use crate::capabilities::Capabilities;
use crate::config::Settings;
use crate::engine::{Engine, StaticConfig};
use crate::sink::StyleRegistry;
use crate::source::Theme;

/// Run every configured source through one pass and return the registry.
pub async fn collect(config: &Settings, caps: Arc<dyn Capabilities>) -> anyhow::Result<Arc<StyleRegistry>> {
    let provider = Arc::new(StaticConfig::new(config.sources.clone()));
    let engine = Engine::new(caps, provider, &config.fetch)?;
    let registry = Arc::new(StyleRegistry::new());

    let handle = engine.init(registry.clone())?;
    handle.settled().await?;
    handle.shutdown().await?;

    Ok(registry)
}

/// Run the build command.
pub async fn run(
    config: &Settings,
    caps: Arc<dyn Capabilities>,
    output: Option<PathBuf>,
    theme: Option<Theme>,
) -> anyhow::Result<()> {
    let registry = collect(config, caps).await?;

    let css = match theme {
        Some(theme) => registry.render_for(theme),
        None => registry.render(),
    };

    match output {
        Some(path) => {
            std::fs::write(&path, &css)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("Wrote {} sources to {}", registry.len(), path.display());
        }
        None => print!("{css}"),
    }

    Ok(())
}
