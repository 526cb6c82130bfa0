//! Turns raw configuration entries into typed sources.
//!
//! Resolution order for one entry:
//! 1. strip a leading `@light ` / `@dark ` annotation
//! 2. expand a leading `~` against the home directory known right now
//! 3. http(s) URLs become [`SourceKind::Url`]
//! 4. local paths are stat'ed: file, directory, or dropped

use reqwest::Url;
use std::path::{Path, PathBuf};

use super::{SourceState, Theme};
use crate::error::ClassifyError;

const LIGHT_PREFIX: &str = "@light ";
const DARK_PREFIX: &str = "@dark ";

/// Where a source lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    File(PathBuf),
    Directory(PathBuf),
    Url(Url),
}

/// A configuration entry after classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    /// Identity used in events and state diffs.
    pub key: String,
    pub kind: SourceKind,
    pub theme: Theme,
}

/// Split off a theme annotation.
pub fn parse_annotation(entry: &str) -> (Theme, &str) {
    if let Some(rest) = entry.strip_prefix(LIGHT_PREFIX) {
        (Theme::Light, rest.trim_start())
    } else if let Some(rest) = entry.strip_prefix(DARK_PREFIX) {
        (Theme::Dark, rest.trim_start())
    } else {
        (Theme::None, entry)
    }
}

/// Parse `s` as a URL, accepting only http and https.
pub fn parse_url(s: &str) -> Option<Url> {
    Url::parse(s)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
}

/// Expand a leading `~` to `home`.
pub fn expand_home(path: &str, home: Option<&Path>) -> Result<PathBuf, ClassifyError> {
    let rest = if path == "~" {
        Some("")
    } else {
        path.strip_prefix("~/")
            .or_else(|| path.strip_prefix("~\\"))
    };

    match rest {
        None => Ok(PathBuf::from(path)),
        Some(rest) => {
            let home = home.ok_or_else(|| ClassifyError::NoHomeDir {
                entry: path.to_string(),
            })?;
            if rest.is_empty() {
                Ok(home.to_path_buf())
            } else {
                Ok(home.join(rest))
            }
        }
    }
}

/// Classify one entry. `home` is looked up by the caller for every pass.
pub async fn classify(entry: &str, home: Option<&Path>) -> Result<ResolvedSource, ClassifyError> {
    let trimmed = entry.trim();
    if trimmed.is_empty() {
        return Err(ClassifyError::Empty);
    }

    let (theme, rest) = parse_annotation(trimmed);

    if let Some(url) = parse_url(rest) {
        return Ok(ResolvedSource {
            key: trimmed.to_string(),
            kind: SourceKind::Url(url),
            theme,
        });
    }

    let expanded = expand_home(rest, home)?;
    let path = std::path::absolute(&expanded).unwrap_or(expanded);

    let metadata = match tokio::fs::metadata(&path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ClassifyError::NotFound { path });
        }
        Err(source) => return Err(ClassifyError::Stat { path, source }),
    };

    let key = match theme {
        Theme::None => path.to_string_lossy().into_owned(),
        Theme::Light | Theme::Dark => trimmed.to_string(),
    };

    let kind = if metadata.is_dir() {
        SourceKind::Directory(path)
    } else if metadata.is_file() {
        SourceKind::File(path)
    } else {
        return Err(ClassifyError::Unsupported { path });
    };

    Ok(ResolvedSource { key, kind, theme })
}

/// Resolve every entry into a fresh state, logging and dropping failures.
///
/// The first occurrence of a key wins.
pub async fn resolve_all(entries: &[String], home: Option<&Path>) -> SourceState {
    let mut state = SourceState::new();

    for entry in entries {
        match classify(entry, home).await {
            Ok(source) => {
                let key = source.key.clone();
                if !state.insert(source) {
                    crate::debug_event!("classify", "duplicate entry skipped", "{key}");
                }
            }
            Err(ClassifyError::Empty) => {}
            Err(e) => tracing::warn!("[classify] dropping source {entry:?}: {e}"),
        }
    }

    state
}
