//! Serialization of reconciliation passes.
//!
//! Every trigger goes through one unbounded channel drained by a single
//! consumer task, so a pass never starts before the previous one (loads and
//! watcher churn included) has finished.

use std::fmt;

use tokio::sync::{mpsc, oneshot};

use crate::error::EngineError;

/// Why a pass was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    Initial,
    ConfigSaved,
    Manual,
}

impl fmt::Display for TriggerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerReason::Initial => f.write_str("initial"),
            TriggerReason::ConfigSaved => f.write_str("config saved"),
            TriggerReason::Manual => f.write_str("manual"),
        }
    }
}

/// Work items understood by the queue consumer.
#[derive(Debug)]
pub enum Trigger {
    /// Run one reconciliation pass.
    Reconcile { reason: TriggerReason },
    /// Resolve once everything queued before it has been processed.
    Barrier(oneshot::Sender<()>),
    /// Stop the consumer after everything queued before it.
    Shutdown(oneshot::Sender<()>),
}

/// Producer side of the queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ReconcileQueue {
    tx: mpsc::UnboundedSender<Trigger>,
}

impl ReconcileQueue {
    /// Create a queue and the receiver its single consumer drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Trigger>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Append a pass to the queue.
    pub fn trigger(&self, reason: TriggerReason) -> Result<(), EngineError> {
        crate::debug_event!("queue", "trigger", "{reason}");
        self.send(Trigger::Reconcile { reason })
    }

    /// Wait until every trigger queued before this call has been processed.
    pub async fn settled(&self) -> Result<(), EngineError> {
        let (done, wait) = oneshot::channel();
        self.send(Trigger::Barrier(done))?;
        wait.await.map_err(|_| EngineError::QueueClosed)
    }

    /// Drain what is already queued, then stop the consumer.
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        let (done, wait) = oneshot::channel();
        self.send(Trigger::Shutdown(done))?;
        wait.await.map_err(|_| EngineError::QueueClosed)
    }

    fn send(&self, trigger: Trigger) -> Result<(), EngineError> {
        self.tx.send(trigger).map_err(|_| EngineError::QueueClosed)
    }
}
