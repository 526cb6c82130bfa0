//! The reconciliation engine: one queue consumer owning the reconciler, the
//! watch manager, and the change debouncer.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::capabilities::Capabilities;
use crate::config::{FetchConfig, Settings, SourcesConfig};
use crate::error::{ConfigError, EngineError};
use crate::loader::ContentLoader;
use crate::queue::{ReconcileQueue, Trigger, TriggerReason};
use crate::reconcile::{Pipeline, Reconciler};
use crate::sink::EventSink;
use crate::source::CssEvent;
use crate::watcher::{Debouncer, FileChange, TargetKind, WatchManager, WatchNotice, wait_until};

/// Where the engine reads its sources from at the start of every pass.
pub trait ConfigProvider: Send + Sync {
    fn sources(&self) -> Result<SourcesConfig, ConfigError>;
}

/// Reads `[sources]` from the settings file on every call.
///
/// Legacy `css_path` settings are migrated in memory only. Persisting the
/// migration happens once at startup.
#[derive(Debug, Clone, Default)]
pub struct SettingsFile {
    path: Option<PathBuf>,
}

impl SettingsFile {
    /// Use the workspace settings file found from the current directory.
    pub fn discover() -> Self {
        Self { path: None }
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }
}

impl ConfigProvider for SettingsFile {
    fn sources(&self) -> Result<SourcesConfig, ConfigError> {
        let mut settings = match &self.path {
            Some(path) => Settings::load_from(path)?,
            None => Settings::load()?,
        };

        if let Err(e) = settings.migrate_legacy_sources() {
            tracing::warn!("[config] legacy source migration failed: {e}");
        }

        Ok(settings.sources)
    }
}

/// Sources held in memory and replaced with [`StaticConfig::set`].
#[derive(Debug, Default)]
pub struct StaticConfig(RwLock<SourcesConfig>);

impl StaticConfig {
    pub fn new(sources: SourcesConfig) -> Self {
        Self(RwLock::new(sources))
    }

    pub fn set(&self, sources: SourcesConfig) {
        *self.0.write() = sources;
    }
}

impl ConfigProvider for StaticConfig {
    fn sources(&self) -> Result<SourcesConfig, ConfigError> {
        Ok(self.0.read().clone())
    }
}

/// Wiring for one engine instance. [`Engine::init`] may be called once.
pub struct Engine {
    capabilities: Arc<dyn Capabilities>,
    config: Arc<dyn ConfigProvider>,
    loader: Arc<ContentLoader>,
    debounce: Duration,
    initialized: AtomicBool,
}

impl Engine {
    pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(150);

    pub fn new(
        capabilities: Arc<dyn Capabilities>,
        config: Arc<dyn ConfigProvider>,
        fetch: &FetchConfig,
    ) -> Result<Self, EngineError> {
        let loader = ContentLoader::new(fetch, capabilities.sends_user_agent())?;

        Ok(Self {
            capabilities,
            config,
            loader: Arc::new(loader),
            debounce: Self::DEFAULT_DEBOUNCE,
            initialized: AtomicBool::new(false),
        })
    }

    /// Quiet period before a watched file change is reloaded.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn capabilities(&self) -> &Arc<dyn Capabilities> {
        &self.capabilities
    }

    pub fn loader(&self) -> &ContentLoader {
        &self.loader
    }

    /// Start the queue consumer and queue the initial pass.
    ///
    /// Must be called inside a tokio runtime. A second call fails with
    /// [`EngineError::AlreadyInitialized`].
    pub fn init(&self, sink: Arc<dyn EventSink>) -> Result<EngineHandle, EngineError> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Err(EngineError::AlreadyInitialized);
        }

        let (queue, triggers) = ReconcileQueue::channel();
        let (notice_tx, notices) = mpsc::unbounded_channel();
        let passes = Arc::new(AtomicUsize::new(0));

        let pipeline = Pipeline::new(self.loader.clone(), self.capabilities.sass(), sink);
        let watches = self
            .capabilities
            .watches()
            .then(|| WatchManager::new(notice_tx));

        let worker = Worker {
            config: self.config.clone(),
            reconciler: Reconciler::new(self.capabilities.clone(), pipeline),
            watches,
            triggers,
            notices,
            debouncer: Debouncer::new(self.debounce),
            passes: passes.clone(),
        };

        crate::log_event!(
            "engine",
            "started",
            "{} mode, debounce {:?}",
            self.capabilities.kind(),
            self.debounce
        );

        let task = tokio::spawn(worker.run());
        queue.trigger(TriggerReason::Initial)?;

        Ok(EngineHandle {
            queue,
            passes,
            task,
        })
    }
}

/// Control surface of a running engine.
pub struct EngineHandle {
    queue: ReconcileQueue,
    passes: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl EngineHandle {
    /// Producer handle for other trigger sources (e.g. a settings watcher).
    pub fn queue(&self) -> ReconcileQueue {
        self.queue.clone()
    }

    pub fn trigger(&self, reason: TriggerReason) -> Result<(), EngineError> {
        self.queue.trigger(reason)
    }

    /// Queue a pass for a saved configuration.
    pub fn config_saved(&self) -> Result<(), EngineError> {
        self.queue.trigger(TriggerReason::ConfigSaved)
    }

    /// Wait until every pass queued so far has completed.
    pub async fn settled(&self) -> Result<(), EngineError> {
        self.queue.settled().await
    }

    /// Passes completed so far. Passes skipped for unreadable config are
    /// not counted.
    pub fn passes_completed(&self) -> usize {
        self.passes.load(Ordering::SeqCst)
    }

    /// Finish queued work, close every watch and stop the consumer.
    pub async fn shutdown(self) -> Result<(), EngineError> {
        self.queue.shutdown().await?;
        self.task.await?;
        Ok(())
    }
}

/// Pending reload: watch key plus the changed path.
type PendingChange = (String, PathBuf);

struct Worker {
    config: Arc<dyn ConfigProvider>,
    reconciler: Reconciler,
    watches: Option<WatchManager>,
    triggers: mpsc::UnboundedReceiver<Trigger>,
    notices: mpsc::UnboundedReceiver<WatchNotice>,
    debouncer: Debouncer<PendingChange>,
    passes: Arc<AtomicUsize>,
}

impl Worker {
    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                trigger = self.triggers.recv() => match trigger {
                    Some(Trigger::Reconcile { reason }) => self.reconcile(reason).await,
                    Some(Trigger::Barrier(done)) => {
                        let _ = done.send(());
                    }
                    Some(Trigger::Shutdown(done)) => {
                        self.stop();
                        let _ = done.send(());
                        return;
                    }
                    None => break,
                },
                Some(notice) = self.notices.recv() => self.on_notice(notice).await,
                _ = wait_until(self.debouncer.next_deadline()) => self.flush_ready().await,
            }
        }

        self.stop();
    }

    async fn reconcile(&mut self, reason: TriggerReason) {
        let sources = match self.config.sources() {
            Ok(sources) => sources,
            Err(e) => {
                tracing::error!(
                    "[engine] skipping {reason} pass, keeping last committed sources: {e}"
                );
                return;
            }
        };

        let summary = self.reconciler.run_pass(&sources).await;

        if let Some(watches) = &mut self.watches {
            let targets = self.reconciler.watch_targets();
            watches.sync(&targets, sources.recurse_directory);
            self.debouncer.retain(|(key, _)| watches.is_watching(key));
        }

        let completed = self.passes.fetch_add(1, Ordering::SeqCst) + 1;
        crate::log_event!(
            "engine",
            "pass complete",
            "#{completed} ({reason}): {} removed, {} files, {} urls, {} directories",
            summary.removed,
            summary.loaded_files,
            summary.loaded_urls,
            summary.scanned_directories
        );
    }

    async fn on_notice(&mut self, notice: WatchNotice) {
        // Notices can still be in flight for a handle closed by the last pass.
        let watching = self
            .watches
            .as_ref()
            .is_some_and(|watches| watches.is_watching(&notice.key));
        if !watching {
            return;
        }

        match notice.change {
            FileChange::Changed(path) | FileChange::Removed(path) => {
                self.debouncer.record((notice.key, path));
            }
            FileChange::RootRemoved => {
                let key = notice.key;
                self.debouncer.retain(|(pending, _)| pending != &key);
                crate::log_event!("engine", "directory removed", "{key}");
                self.reconciler
                    .pipeline()
                    .emit(CssEvent::RemoveDir { path: key })
                    .await;
            }
        }
    }

    /// Reload or remove every change that has been quiet long enough.
    async fn flush_ready(&mut self) {
        for (key, path) in self.debouncer.take_ready() {
            let Some(target) = self.watches.as_ref().and_then(|w| w.target(&key)).cloned() else {
                continue;
            };

            let (identity, parent) = match target.kind {
                TargetKind::File => (target.key.clone(), None),
                TargetKind::Directory => (path.to_string_lossy().into_owned(), Some(target.key.clone())),
            };

            let pipeline = self.reconciler.pipeline();
            if path.is_file() {
                crate::debug_event!("engine", "reloading", "{identity}");
                pipeline.load_file(&path, identity, parent, target.theme).await;
            } else {
                crate::log_event!("engine", "removed", "{identity}");
                pipeline.emit(CssEvent::Remove { path: identity }).await;
            }
        }
    }

    fn stop(&mut self) {
        if let Some(watches) = &mut self.watches {
            watches.stop();
        }
        crate::log_event!("engine", "stopped");
    }
}
