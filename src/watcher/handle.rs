//! One OS watch subscription per tracked source.

use std::path::{Path, PathBuf};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::error::WatchError;
use crate::source::{FileType, Theme};

/// Whether a watch covers a single file or a directory tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    File,
    Directory,
}

/// Something the engine wants watched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
    /// Source identity this watch belongs to.
    pub key: String,
    pub path: PathBuf,
    pub kind: TargetKind,
    pub theme: Theme,
}

impl WatchTarget {
    /// Directory handed to the OS. Single files are watched through their
    /// parent so that editors replacing the file on save keep being seen.
    pub fn watch_root(&self) -> Result<PathBuf, WatchError> {
        match self.kind {
            TargetKind::Directory => Ok(self.path.clone()),
            TargetKind::File => match self.path.parent() {
                Some(parent) if parent.as_os_str().is_empty() => Ok(PathBuf::from(".")),
                Some(parent) => Ok(parent.to_path_buf()),
                None => Err(WatchError::NoParent {
                    path: self.path.clone(),
                }),
            },
        }
    }
}

/// Classified change for one path under a watch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FileChange {
    /// Created or modified, still present.
    Changed(PathBuf),
    /// No longer present.
    Removed(PathBuf),
    /// The watched directory itself disappeared.
    RootRemoved,
}

/// A change tagged with the watch it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchNotice {
    pub key: String,
    pub change: FileChange,
}

/// Filters raw notify events down to the paths a target cares about.
#[derive(Debug, Clone)]
struct EventFilter {
    target: WatchTarget,
    recursive: bool,
    /// Canonical form of the watched path; some backends report these.
    canonical: Option<PathBuf>,
}

impl EventFilter {
    fn new(target: WatchTarget, recursive: bool) -> Self {
        let canonical = std::fs::canonicalize(&target.path)
            .ok()
            .filter(|c| c != &target.path);
        Self {
            target,
            recursive,
            canonical,
        }
    }

    /// Map a reported path back under the configured (non-canonical) root.
    fn rebase(&self, path: &Path) -> PathBuf {
        if let Some(canonical) = &self.canonical {
            if let Ok(rest) = path.strip_prefix(canonical) {
                return if rest.as_os_str().is_empty() {
                    self.target.path.clone()
                } else {
                    self.target.path.join(rest)
                };
            }
        }
        path.to_path_buf()
    }

    fn classify(&self, event: &Event) -> Vec<FileChange> {
        if matches!(event.kind, EventKind::Access(_) | EventKind::Other) {
            return Vec::new();
        }

        event
            .paths
            .iter()
            .filter_map(|raw| self.classify_path(raw))
            .collect()
    }

    fn classify_path(&self, raw: &Path) -> Option<FileChange> {
        match self.target.kind {
            TargetKind::File => {
                // Only direct children of the parent are reported, so the
                // file name identifies the target.
                if raw.file_name() != self.target.path.file_name() {
                    return None;
                }
                let path = self.target.path.clone();
                Some(if path.is_file() {
                    FileChange::Changed(path)
                } else {
                    FileChange::Removed(path)
                })
            }
            TargetKind::Directory => {
                let path = self.rebase(raw);
                if path == self.target.path {
                    return (!path.exists()).then_some(FileChange::RootRemoved);
                }
                if !self.recursive && path.parent() != Some(self.target.path.as_path()) {
                    return None;
                }
                FileType::from_path(&path)?;
                if path.is_file() {
                    Some(FileChange::Changed(path))
                } else if !path.exists() {
                    Some(FileChange::Removed(path))
                } else {
                    None
                }
            }
        }
    }
}

/// Live watch for one target. Dropping it stops the OS subscription, but
/// [`WatchHandle::close`] should be called so the unsubscribe is explicit.
pub struct WatchHandle {
    target: WatchTarget,
    root: PathBuf,
    recursive: bool,
    watcher: Option<RecommendedWatcher>,
}

impl WatchHandle {
    /// Subscribe to `target`, forwarding classified changes to `notices`.
    pub fn open(
        target: WatchTarget,
        recursive: bool,
        notices: mpsc::UnboundedSender<WatchNotice>,
    ) -> Result<Self, WatchError> {
        let root = target.watch_root()?;
        let mode = match target.kind {
            TargetKind::Directory if recursive => RecursiveMode::Recursive,
            _ => RecursiveMode::NonRecursive,
        };

        let filter = EventFilter::new(target.clone(), recursive);
        let key = target.key.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    for change in filter.classify(&event) {
                        let notice = WatchNotice {
                            key: key.clone(),
                            change,
                        };
                        // Receiver gone means the engine is shutting down.
                        if notices.send(notice).is_err() {
                            return;
                        }
                    }
                }
                Err(e) => tracing::warn!("[watcher] event error for {key}: {e}"),
            }
        })?;

        watcher
            .watch(&root, mode)
            .map_err(|source| WatchError::Subscribe {
                path: root.clone(),
                source,
            })?;

        crate::debug_event!(
            "watcher",
            "opened",
            "{} ({:?}, {})",
            root.display(),
            target.kind,
            if recursive { "recursive" } else { "shallow" }
        );

        Ok(Self {
            target,
            root,
            recursive,
            watcher: Some(watcher),
        })
    }

    pub fn target(&self) -> &WatchTarget {
        &self.target
    }

    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    /// Unsubscribe and release the OS watch.
    pub fn close(mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            if let Err(e) = watcher.unwatch(&self.root) {
                crate::debug_event!("watcher", "unwatch failed", "{}: {e}", self.root.display());
            }
        }
        crate::debug_event!("watcher", "closed", "{}", self.target.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};
    use std::fs;
    use tempfile::TempDir;

    fn dir_target(path: &Path) -> WatchTarget {
        WatchTarget {
            key: path.to_string_lossy().into_owned(),
            path: path.to_path_buf(),
            kind: TargetKind::Directory,
            theme: Theme::None,
        }
    }

    fn event(kind: EventKind, path: PathBuf) -> Event {
        Event::new(kind).add_path(path)
    }

    #[test]
    fn test_file_target_watches_parent() {
        let target = WatchTarget {
            key: "k".to_string(),
            path: PathBuf::from("/themes/a.css"),
            kind: TargetKind::File,
            theme: Theme::Dark,
        };
        assert_eq!(target.watch_root().unwrap(), PathBuf::from("/themes"));
    }

    #[test]
    fn test_shallow_filter_ignores_nested() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().to_path_buf();
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("top.css"), "a{}").unwrap();
        fs::write(root.join("sub/nested.css"), "b{}").unwrap();

        let shallow = EventFilter::new(dir_target(&root), false);
        let modify = EventKind::Modify(ModifyKind::Any);

        assert_eq!(
            shallow.classify(&event(modify, root.join("top.css"))),
            vec![FileChange::Changed(root.join("top.css"))]
        );
        assert!(
            shallow
                .classify(&event(modify, root.join("sub/nested.css")))
                .is_empty()
        );

        let recursive = EventFilter::new(dir_target(&root), true);
        assert_eq!(
            recursive.classify(&event(modify, root.join("sub/nested.css"))),
            vec![FileChange::Changed(root.join("sub/nested.css"))]
        );
    }

    #[test]
    fn test_filter_skips_unknown_types_and_reports_removals() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().to_path_buf();
        let filter = EventFilter::new(dir_target(&root), false);

        fs::write(root.join("notes.txt"), "x").unwrap();
        assert!(
            filter
                .classify(&event(EventKind::Create(CreateKind::File), root.join("notes.txt")))
                .is_empty()
        );

        assert_eq!(
            filter.classify(&event(EventKind::Remove(RemoveKind::File), root.join("gone.css"))),
            vec![FileChange::Removed(root.join("gone.css"))]
        );
    }

    #[test]
    fn test_root_removal() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("themes");
        let filter = EventFilter::new(dir_target(&root), true);

        assert_eq!(
            filter.classify(&event(EventKind::Remove(RemoveKind::Folder), root.clone())),
            vec![FileChange::RootRemoved]
        );
    }

    #[test]
    fn test_file_target_matches_by_name() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.css");
        fs::write(&file, "a{}").unwrap();
        let target = WatchTarget {
            key: "@light ~/a.css".to_string(),
            path: file.clone(),
            kind: TargetKind::File,
            theme: Theme::Light,
        };
        let filter = EventFilter::new(target, false);
        let modify = EventKind::Modify(ModifyKind::Any);

        assert_eq!(
            filter.classify(&event(modify, file.clone())),
            vec![FileChange::Changed(file.clone())]
        );
        assert!(
            filter
                .classify(&event(modify, temp.path().join("b.css")))
                .is_empty()
        );
    }
}
