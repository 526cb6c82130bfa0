//! Event sinks: where [`CssEvent`]s go.
//!
//! The engine never lets a sink failure escape: [`deliver`] logs it and the
//! pass carries on. Sinks may be called concurrently for different sources
//! within a pass and must serialize their own mutations.

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::io::Write;
use tokio::sync::mpsc;

use crate::error::SinkError;
use crate::source::{CssEvent, CssFile, FileType, Theme};

/// Consumer of reconciliation events.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn handle(&self, event: CssEvent) -> Result<(), SinkError>;
}

/// Hand `event` to `sink`, logging instead of propagating failures.
pub async fn deliver(sink: &dyn EventSink, event: CssEvent) {
    crate::debug_event!("sink", event.kind(), "{}", event.path());
    let path = event.path().to_string();
    if let Err(e) = sink.handle(event).await {
        tracing::error!("[sink] error handling event for {path}: {e}");
    }
}

/// Forwards events into a tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<CssEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CssEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn handle(&self, event: CssEvent) -> Result<(), SinkError> {
        self.tx.send(event).map_err(|_| SinkError::Closed)
    }
}

/// Writes one JSON object per event to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonLinesSink;

#[async_trait]
impl EventSink for JsonLinesSink {
    async fn handle(&self, event: CssEvent) -> Result<(), SinkError> {
        let line = serde_json::to_string(&event)?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{line}")?;
        stdout.flush()?;
        Ok(())
    }
}

/// One style entry held by a [`StyleRegistry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleEntry {
    pub parent: Option<String>,
    pub file_type: FileType,
    pub theme: Theme,
    pub src: String,
}

/// In-memory mirror of what a renderer would show.
///
/// Adds upsert by path, removals delete, and a directory removal cascades to
/// every entry discovered under it.
#[derive(Debug, Default)]
pub struct StyleRegistry {
    entries: Mutex<IndexMap<String, StyleEntry>>,
}

impl StyleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&self, event: CssEvent) {
        let mut entries = self.entries.lock();

        match event {
            CssEvent::Add { file } => {
                let CssFile {
                    path,
                    parent,
                    src,
                    file_type,
                    theme,
                } = file;

                match entries.get_mut(&path) {
                    Some(existing) => {
                        // Previously loaded through a directory, now listed
                        // directly: it no longer belongs to that directory.
                        if parent.is_none() {
                            existing.parent = None;
                        }
                        existing.src = src;
                        existing.file_type = file_type;
                        existing.theme = theme;
                    }
                    None => {
                        entries.insert(
                            path,
                            StyleEntry {
                                parent,
                                file_type,
                                theme,
                                src,
                            },
                        );
                    }
                }
            }
            CssEvent::Remove { path } => {
                entries.shift_remove(&path);
            }
            CssEvent::RemoveDir { path } => {
                entries.retain(|_, entry| entry.parent.as_deref() != Some(path.as_str()));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.lock().contains_key(path)
    }

    pub fn get(&self, path: &str) -> Option<StyleEntry> {
        self.entries.lock().get(path).cloned()
    }

    /// Entry paths in load order.
    pub fn paths(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }

    /// Snapshot of every entry, sorted by path.
    pub fn snapshot(&self) -> Vec<(String, StyleEntry)> {
        let mut entries: Vec<_> = self
            .entries
            .lock()
            .iter()
            .map(|(path, entry)| (path.clone(), entry.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Combine every entry into one stylesheet.
    pub fn render(&self) -> String {
        self.render_filtered(|_| true)
    }

    /// Combine the entries active for `theme`.
    pub fn render_for(&self, theme: Theme) -> String {
        self.render_filtered(|entry| entry.theme.is_active_for(theme))
    }

    fn render_filtered(&self, keep: impl Fn(&StyleEntry) -> bool) -> String {
        let entries = self.entries.lock();
        let mut out = String::new();

        for (path, entry) in entries.iter().filter(|(_, entry)| keep(entry)) {
            out.push_str(&banner(path));
            out.push('\n');
            out.push_str(&entry.src);
            if !entry.src.ends_with('\n') {
                out.push('\n');
            }
        }

        out
    }
}

/// Comment naming where a block of CSS came from. Newlines and asterisks are
/// stripped so the path cannot terminate the comment.
pub fn banner(path: &str) -> String {
    let safe: String = path.chars().filter(|c| *c != '\n' && *c != '*').collect();
    format!("/* loaded by stylesync from {safe} */")
}

#[async_trait]
impl EventSink for StyleRegistry {
    async fn handle(&self, event: CssEvent) -> Result<(), SinkError> {
        self.apply(event);
        Ok(())
    }
}
