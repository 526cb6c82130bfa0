//! Keeps the set of live watches equal to the reconciled local sources.

use std::collections::BTreeMap;

use tokio::sync::mpsc;

use super::handle::{WatchHandle, WatchNotice, WatchTarget};

/// What one [`WatchManager::sync`] call changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub opened: Vec<String>,
    pub closed: Vec<String>,
    pub failed: Vec<String>,
    /// Every handle was torn down and recreated for a recursion change.
    pub recreated: bool,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        self.opened.is_empty() && self.closed.is_empty() && self.failed.is_empty() && !self.recreated
    }
}

/// Owns one [`WatchHandle`] per watched source key.
///
/// Only touched from the engine's queue consumer, so it needs no locking.
pub struct WatchManager {
    handles: BTreeMap<String, WatchHandle>,
    recursive: bool,
    notices: mpsc::UnboundedSender<WatchNotice>,
}

impl WatchManager {
    pub fn new(notices: mpsc::UnboundedSender<WatchNotice>) -> Self {
        Self {
            handles: BTreeMap::new(),
            recursive: false,
            notices,
        }
    }

    /// Bring live watches in line with `desired`.
    ///
    /// A changed recursion policy recreates every handle first, since a
    /// shallow watch cannot be upgraded in place. Keys whose watch failed
    /// earlier are simply absent and get retried here.
    pub fn sync(&mut self, desired: &BTreeMap<String, WatchTarget>, recursive: bool) -> SyncReport {
        let mut report = SyncReport::default();

        if recursive != self.recursive {
            self.recursive = recursive;
            if !self.handles.is_empty() {
                crate::log_event!(
                    "watcher",
                    "recursion changed",
                    "recreating {} watches",
                    self.handles.len()
                );
                report.recreated = true;
                for (key, handle) in std::mem::take(&mut self.handles) {
                    let target = handle.target().clone();
                    handle.close();
                    self.open(key, target, &mut report);
                }
            }
        }

        let stale: Vec<String> = self
            .handles
            .iter()
            .filter(|(key, handle)| desired.get(*key) != Some(handle.target()))
            .map(|(key, _)| key.clone())
            .collect();

        for key in stale {
            if let Some(handle) = self.handles.remove(&key) {
                handle.close();
                report.closed.push(key);
            }
        }

        for (key, target) in desired {
            if !self.handles.contains_key(key) {
                self.open(key.clone(), target.clone(), &mut report);
            }
        }

        if !report.is_noop() {
            crate::debug_event!(
                "watcher",
                "synced",
                "+{} -{} !{} ({} live)",
                report.opened.len(),
                report.closed.len(),
                report.failed.len(),
                self.handles.len()
            );
        }

        report
    }

    fn open(&mut self, key: String, target: WatchTarget, report: &mut SyncReport) {
        match WatchHandle::open(target, self.recursive, self.notices.clone()) {
            Ok(handle) => {
                self.handles.insert(key.clone(), handle);
                report.opened.push(key);
            }
            Err(e) => {
                tracing::warn!("[watcher] failed to watch {key}: {e}");
                report.failed.push(key);
            }
        }
    }

    /// Close every watch.
    pub fn stop(&mut self) {
        for (_, handle) in std::mem::take(&mut self.handles) {
            handle.close();
        }
    }

    pub fn target(&self, key: &str) -> Option<&WatchTarget> {
        self.handles.get(key).map(WatchHandle::target)
    }

    pub fn is_watching(&self, key: &str) -> bool {
        self.handles.contains_key(key)
    }

    pub fn watched_keys(&self) -> impl Iterator<Item = &str> {
        self.handles.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn is_recursive(&self) -> bool {
        self.recursive
    }
}

impl Drop for WatchManager {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Theme;
    use crate::watcher::TargetKind;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn target(path: &Path, kind: TargetKind) -> (String, WatchTarget) {
        let key = path.to_string_lossy().into_owned();
        (
            key.clone(),
            WatchTarget {
                key,
                path: path.to_path_buf(),
                kind,
                theme: Theme::None,
            },
        )
    }

    #[test]
    fn test_sync_opens_and_closes() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.css");
        fs::write(&file, "a{}").unwrap();
        let dir = temp.path().join("themes");
        fs::create_dir(&dir).unwrap();

        let (tx, _rx) = mpsc::unbounded_channel();
        let mut manager = WatchManager::new(tx);

        let desired: BTreeMap<_, _> = [
            target(&file, TargetKind::File),
            target(&dir, TargetKind::Directory),
        ]
        .into_iter()
        .collect();

        let report = manager.sync(&desired, false);
        assert_eq!(report.opened.len(), 2);
        assert_eq!(manager.len(), 2);

        // Same state again is a no-op
        assert!(manager.sync(&desired, false).is_noop());

        let only_dir: BTreeMap<_, _> = [target(&dir, TargetKind::Directory)].into_iter().collect();
        let report = manager.sync(&only_dir, false);
        assert_eq!(report.closed, vec![file.to_string_lossy().into_owned()]);
        assert_eq!(manager.len(), 1);

        // Back to the original set restores the original handles
        manager.sync(&desired, false);
        let keys: Vec<&str> = manager.watched_keys().collect();
        let expected: Vec<&str> = desired.keys().map(String::as_str).collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn test_recursion_change_recreates_all() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("themes");
        fs::create_dir(&dir).unwrap();

        let (tx, _rx) = mpsc::unbounded_channel();
        let mut manager = WatchManager::new(tx);
        let desired: BTreeMap<_, _> = [target(&dir, TargetKind::Directory)].into_iter().collect();

        manager.sync(&desired, false);
        let report = manager.sync(&desired, true);
        assert!(report.recreated);
        assert!(manager.is_recursive());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_failed_watch_is_retried() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("later");

        let (tx, _rx) = mpsc::unbounded_channel();
        let mut manager = WatchManager::new(tx);
        let desired: BTreeMap<_, _> = [target(&dir, TargetKind::Directory)].into_iter().collect();

        let report = manager.sync(&desired, false);
        assert_eq!(report.failed.len(), 1);
        assert!(manager.is_empty());

        fs::create_dir(&dir).unwrap();
        let report = manager.sync(&desired, false);
        assert_eq!(report.opened.len(), 1);
        assert!(manager.is_watching(&dir.to_string_lossy()));
    }
}
