//! Queues a pass whenever the settings file is saved.

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};

use super::debouncer::{Debouncer, wait_until};
use super::handle::{FileChange, TargetKind, WatchHandle, WatchTarget};
use crate::error::WatchError;
use crate::queue::{ReconcileQueue, TriggerReason};
use crate::source::Theme;

/// Background task watching one settings file.
pub struct SettingsWatcher {
    path: PathBuf,
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl SettingsWatcher {
    /// Watch `path` and send [`TriggerReason::ConfigSaved`] to `queue` once
    /// each burst of writes has been quiet for `debounce`.
    pub fn spawn(
        path: PathBuf,
        queue: ReconcileQueue,
        debounce: Duration,
    ) -> Result<Self, WatchError> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let target = WatchTarget {
            key: path.to_string_lossy().into_owned(),
            path: path.clone(),
            kind: TargetKind::File,
            theme: Theme::None,
        };
        let handle = WatchHandle::open(target, false, tx)?;
        let (stop, mut stopped) = oneshot::channel();

        crate::log_event!("settings", "watching", "{}", path.display());

        let task = tokio::spawn(async move {
            let mut debouncer = Debouncer::new(debounce);

            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    notice = rx.recv() => match notice {
                        Some(notice) => {
                            if matches!(notice.change, FileChange::Changed(_)) {
                                debouncer.record(notice.key);
                            }
                        }
                        None => break,
                    },
                    _ = wait_until(debouncer.next_deadline()) => {
                        for key in debouncer.take_ready() {
                            crate::log_event!("settings", "saved", "{key}");
                            if queue.trigger(TriggerReason::ConfigSaved).is_err() {
                                handle.close();
                                return;
                            }
                        }
                    }
                }
            }

            handle.close();
        });

        Ok(Self { path, stop, task })
    }

    /// Stop watching and wait for the task to close its handle.
    pub async fn stop(self) -> Result<(), JoinError> {
        // The task may already have exited on a closed queue.
        let _ = self.stop.send(());
        self.task.await?;
        crate::log_event!("settings", "stopped", "{}", self.path.display());
        Ok(())
    }
}
