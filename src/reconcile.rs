//! State reconciliation: diff resolved sources against the previous pass and
//! turn the difference into sink events.
//!
//! A pass runs in four steps:
//! 1. resolve the configured entries into a fresh [`SourceState`]
//! 2. [`plan_pass`] diffs it against the previous state
//! 3. removals are emitted in order, then every load is issued concurrently
//! 4. the new state is committed once all loads have settled
//!
//! Directories are rescanned on every pass they are present in. Keeping
//! individual files current between passes is the watcher's job.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use reqwest::Url;
use tokio::task::JoinSet;

use crate::capabilities::Capabilities;
use crate::config::SourcesConfig;
use crate::lister;
use crate::loader::{ContentLoader, LoadedSource};
use crate::sass::SassCompiler;
use crate::sink::{EventSink, deliver};
use crate::source::{CssEvent, CssFile, FileType, ResolvedSource, SourceKind, SourceState, Theme, resolve_all};
use crate::watcher::{TargetKind, WatchTarget};

/// Added and removed keys of one category.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct KeyDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

/// Set difference between two keyed maps, in key order.
pub fn diff_keys<V>(before: &BTreeMap<String, V>, after: &BTreeMap<String, V>) -> KeyDiff {
    KeyDiff {
        added: after
            .keys()
            .filter(|key| !before.contains_key(*key))
            .cloned()
            .collect(),
        removed: before
            .keys()
            .filter(|key| !after.contains_key(*key))
            .cloned()
            .collect(),
    }
}

/// Everything one pass has to do, computed without side effects.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Emit `Remove` for each.
    pub removed_files: Vec<String>,
    /// Emit `RemoveDir` for each.
    pub removed_directories: Vec<String>,
    /// Emit `Remove` for each.
    pub removed_urls: Vec<String>,
    /// Retained files whose resolved path changed, removed before reloading.
    pub relocated_files: Vec<String>,
    /// Retained directories to clear with `RemoveDir` before rescanning.
    pub reset_directories: Vec<String>,
    pub load_files: Vec<String>,
    pub load_urls: Vec<String>,
    /// Every directory present in the new state.
    pub scan_directories: Vec<String>,
}

impl ReconcilePlan {
    /// Removal events in emission order.
    pub fn removal_events(&self) -> Vec<CssEvent> {
        let remove = |path: &String| CssEvent::Remove { path: path.clone() };
        let remove_dir = |path: &String| CssEvent::RemoveDir { path: path.clone() };

        self.removed_files
            .iter()
            .map(remove)
            .chain(self.removed_directories.iter().map(remove_dir))
            .chain(self.removed_urls.iter().map(remove))
            .chain(self.relocated_files.iter().map(remove))
            .chain(self.reset_directories.iter().map(remove_dir))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.removed_files.is_empty()
            && self.removed_directories.is_empty()
            && self.removed_urls.is_empty()
            && self.relocated_files.is_empty()
            && self.reset_directories.is_empty()
            && self.load_files.is_empty()
            && self.load_urls.is_empty()
            && self.scan_directories.is_empty()
    }
}

/// Retained keys whose resolved target differs between the two maps.
fn relocated<V: PartialEq>(
    before: &BTreeMap<String, V>,
    after: &BTreeMap<String, V>,
) -> Vec<String> {
    after
        .iter()
        .filter(|(key, source)| before.get(*key).is_some_and(|old| old != *source))
        .map(|(key, _)| key.clone())
        .collect()
}

/// Diff `next` against `previous`.
///
/// Without a previous state everything is added and nothing removed.
/// `recursion_changed` makes every retained directory reset first, so files
/// that a shallower scan no longer finds do not linger in the sink. A
/// retained key that now resolves elsewhere (a theme-tagged `~/` entry after
/// the home directory moved) is removed and loaded again.
pub fn plan_pass(
    previous: Option<&SourceState>,
    next: &SourceState,
    recursion_changed: bool,
) -> ReconcilePlan {
    let scan_directories: Vec<String> = next.directories.keys().cloned().collect();

    let Some(previous) = previous else {
        return ReconcilePlan {
            load_files: next.files.keys().cloned().collect(),
            load_urls: next.urls.keys().cloned().collect(),
            scan_directories,
            ..ReconcilePlan::default()
        };
    };

    let files = diff_keys(&previous.files, &next.files);
    let directories = diff_keys(&previous.directories, &next.directories);
    let urls = diff_keys(&previous.urls, &next.urls);

    let reset_directories = if recursion_changed {
        next.directories
            .keys()
            .filter(|key| previous.directories.contains_key(*key))
            .cloned()
            .collect()
    } else {
        relocated(&previous.directories, &next.directories)
    };

    let relocated_files = relocated(&previous.files, &next.files);

    let mut load_files = files.added;
    load_files.extend(relocated_files.iter().cloned());

    ReconcilePlan {
        removed_files: files.removed,
        removed_directories: directories.removed,
        removed_urls: urls.removed,
        relocated_files,
        reset_directories,
        load_files,
        load_urls: urls.added,
        scan_directories,
    }
}

/// The load → compile → emit path shared by passes and watch events.
#[derive(Clone)]
pub struct Pipeline {
    loader: Arc<ContentLoader>,
    sass: Option<Arc<dyn SassCompiler>>,
    sink: Arc<dyn EventSink>,
}

impl Pipeline {
    pub fn new(
        loader: Arc<ContentLoader>,
        sass: Option<Arc<dyn SassCompiler>>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self { loader, sass, sink }
    }

    pub async fn emit(&self, event: CssEvent) {
        deliver(self.sink.as_ref(), event).await;
    }

    /// Load a local file and emit `Add` for it. Failures are logged.
    pub async fn load_file(&self, path: &Path, identity: String, parent: Option<String>, theme: Theme) {
        let loaded = match self.loader.load_file(path).await {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::warn!("[reconcile] failed to load file {identity}: {e}");
                return;
            }
        };

        let LoadedSource { src, file_type } = loaded;
        let src = if file_type == FileType::Sass {
            let Some(sass) = &self.sass else {
                tracing::warn!("[reconcile] refusing to load {identity}: Sass needs native capabilities");
                return;
            };
            match sass.compile_file(path).await {
                Ok(css) => css,
                Err(e) => {
                    tracing::error!("[reconcile] failed to compile Sass for {identity}: {e}");
                    return;
                }
            }
        } else {
            src
        };

        self.emit(CssEvent::Add {
            file: CssFile {
                path: identity,
                parent,
                src,
                file_type,
                theme,
            },
        })
        .await;
    }

    /// Fetch a URL and emit `Add` for it. Failures are logged.
    pub async fn load_url(&self, url: &Url, identity: String, theme: Theme) {
        let loaded = match self.loader.load_url(url).await {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::warn!("[reconcile] failed to load URL {identity}: {e}");
                return;
            }
        };

        let LoadedSource { src, file_type } = loaded;
        let src = if file_type == FileType::Sass {
            let Some(sass) = &self.sass else {
                tracing::warn!("[reconcile] refusing to load {identity}: Sass needs native capabilities");
                return;
            };
            match sass.compile_source(src, url.path()).await {
                Ok(css) => css,
                Err(e) => {
                    tracing::error!("[reconcile] failed to compile Sass for {identity}: {e}");
                    return;
                }
            }
        } else {
            src
        };

        self.emit(CssEvent::Add {
            file: CssFile {
                path: identity,
                parent: None,
                src,
                file_type,
                theme,
            },
        })
        .await;
    }

    /// Enumerate a directory and load every style file in it.
    pub async fn scan_directory(&self, dir: &Path, key: String, theme: Theme, recursive: bool) {
        let files = match lister::list_files_async(dir.to_path_buf(), recursive).await {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!("[reconcile] failed to load directory {key}: {e}");
                return;
            }
        };

        crate::debug_event!("reconcile", "scanned", "{key}: {} files", files.len());

        let mut loads = JoinSet::new();
        for file in files {
            let pipeline = self.clone();
            let key = key.clone();
            loads.spawn(async move {
                let identity = file.to_string_lossy().into_owned();
                pipeline.load_file(&file, identity, Some(key), theme).await;
            });
        }
        drain(loads).await;
    }
}

async fn drain(mut tasks: JoinSet<()>) {
    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            tracing::error!("[reconcile] load task failed: {e}");
        }
    }
}

/// Summary of one pass, for logging and tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PassSummary {
    pub removed: usize,
    pub loaded_files: usize,
    pub loaded_urls: usize,
    pub scanned_directories: usize,
    pub first_pass: bool,
}

/// Drives passes and holds the last committed [`SourceState`].
pub struct Reconciler {
    capabilities: Arc<dyn Capabilities>,
    pipeline: Pipeline,
    state: Option<SourceState>,
    recursive: Option<bool>,
}

impl Reconciler {
    pub fn new(capabilities: Arc<dyn Capabilities>, pipeline: Pipeline) -> Self {
        Self {
            capabilities,
            pipeline,
            state: None,
            recursive: None,
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Last committed state, `None` before the first pass.
    pub fn state(&self) -> Option<&SourceState> {
        self.state.as_ref()
    }

    /// Resolve `config` and emit the difference to the sink.
    pub async fn run_pass(&mut self, config: &SourcesConfig) -> PassSummary {
        let home = self.capabilities.home_dir();
        let mut next = resolve_all(config.entries(), home.as_deref()).await;

        if !self.capabilities.lists_directories() {
            for key in next.drop_directories() {
                tracing::warn!(
                    "[reconcile] skipping directory {key}: {} mode loads single files and URLs only",
                    self.capabilities.kind()
                );
            }
        }

        let recursive = config.recurse_directory;
        let recursion_changed = self.recursive.is_some_and(|previous| previous != recursive);
        let plan = plan_pass(self.state.as_ref(), &next, recursion_changed);

        let summary = PassSummary {
            removed: plan.removal_events().len(),
            loaded_files: plan.load_files.len(),
            loaded_urls: plan.load_urls.len(),
            scanned_directories: plan.scan_directories.len(),
            first_pass: self.state.is_none(),
        };

        for event in plan.removal_events() {
            crate::log_event!("reconcile", event.kind(), "{}", event.path());
            self.pipeline.emit(event).await;
        }

        let mut loads = JoinSet::new();

        for key in &plan.load_files {
            if let Some(source) = next.files.get(key) {
                let pipeline = self.pipeline.clone();
                let source = source.clone();
                loads.spawn(async move {
                    if let SourceKind::File(path) = &source.kind {
                        pipeline.load_file(path, source.key.clone(), None, source.theme).await;
                    }
                });
            }
        }

        for key in &plan.load_urls {
            if let Some(source) = next.urls.get(key) {
                let pipeline = self.pipeline.clone();
                let source = source.clone();
                loads.spawn(async move {
                    if let SourceKind::Url(url) = &source.kind {
                        pipeline.load_url(url, source.key.clone(), source.theme).await;
                    }
                });
            }
        }

        for key in &plan.scan_directories {
            if let Some(source) = next.directories.get(key) {
                let pipeline = self.pipeline.clone();
                let source = source.clone();
                loads.spawn(async move {
                    if let SourceKind::Directory(dir) = &source.kind {
                        pipeline
                            .scan_directory(dir, source.key.clone(), source.theme, recursive)
                            .await;
                    }
                });
            }
        }

        drain(loads).await;

        self.state = Some(next);
        self.recursive = Some(recursive);
        summary
    }

    /// Watch targets for the committed state: every file and directory.
    pub fn watch_targets(&self) -> BTreeMap<String, WatchTarget> {
        let Some(state) = &self.state else {
            return BTreeMap::new();
        };

        state.local().filter_map(watch_target).map(|t| (t.key.clone(), t)).collect()
    }
}

fn watch_target(source: &ResolvedSource) -> Option<WatchTarget> {
    let (path, kind) = match &source.kind {
        SourceKind::File(path) => (path, TargetKind::File),
        SourceKind::Directory(path) => (path, TargetKind::Directory),
        SourceKind::Url(_) => return None,
    };

    Some(WatchTarget {
        key: source.key.clone(),
        path: path.clone(),
        kind,
        theme: source.theme,
    })
}
