//! Source model: what gets configured, what it resolves to, and the events
//! emitted for it.

pub mod classify;
mod file_type;

pub use classify::{ResolvedSource, SourceKind, classify, parse_url, resolve_all};
pub use file_type::{FileType, determine_file_type};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which UI theme a source is active for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Active regardless of theme
    #[default]
    None,
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::None => "none",
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    /// Whether a source tagged `self` applies while `current` is shown.
    pub fn is_active_for(self, current: Theme) -> bool {
        self == Theme::None || self == current
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One loaded style source, handed to the sink and not retained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CssFile {
    /// Identity of the entry. Theme-tagged sources use the annotated string.
    pub path: String,
    /// Key of the directory this file was discovered in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub src: String,
    pub file_type: FileType,
    pub theme: Theme,
}

/// What the sink is told.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CssEvent {
    Add { file: CssFile },
    Remove { path: String },
    /// Remove every entry whose `parent` is `path`.
    RemoveDir { path: String },
}

impl CssEvent {
    /// Identity the event refers to.
    pub fn path(&self) -> &str {
        match self {
            CssEvent::Add { file } => &file.path,
            CssEvent::Remove { path } | CssEvent::RemoveDir { path } => path,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CssEvent::Add { .. } => "add",
            CssEvent::Remove { .. } => "remove",
            CssEvent::RemoveDir { .. } => "removeDir",
        }
    }
}

/// Everything configured and reachable after one resolution.
///
/// The three maps are keyed by identity and never share a key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceState {
    pub files: BTreeMap<String, ResolvedSource>,
    pub directories: BTreeMap<String, ResolvedSource>,
    pub urls: BTreeMap<String, ResolvedSource>,
}

impl SourceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a resolved source. Returns `false` if its key is already
    /// present in any category.
    pub fn insert(&mut self, source: ResolvedSource) -> bool {
        if self.contains(&source.key) {
            return false;
        }

        let map = match source.kind {
            SourceKind::File(_) => &mut self.files,
            SourceKind::Directory(_) => &mut self.directories,
            SourceKind::Url(_) => &mut self.urls,
        };
        map.insert(source.key.clone(), source);
        true
    }

    pub fn contains(&self, key: &str) -> bool {
        self.files.contains_key(key)
            || self.directories.contains_key(key)
            || self.urls.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.files.len() + self.directories.len() + self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Local sources, i.e. everything that can be watched.
    pub fn local(&self) -> impl Iterator<Item = &ResolvedSource> {
        self.files.values().chain(self.directories.values())
    }

    /// Drop every directory entry, returning the dropped keys.
    pub fn drop_directories(&mut self) -> Vec<String> {
        std::mem::take(&mut self.directories).into_keys().collect()
    }
}
