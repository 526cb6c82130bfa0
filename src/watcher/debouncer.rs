//! Coalescing of change notifications.
//!
//! A single save usually produces several modify events. Each key is held
//! until it has been quiet for the configured duration, so one save yields
//! one reload.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Debounces change notifications by key.
#[derive(Debug)]
pub struct Debouncer<K> {
    /// Pending changes: key -> last change timestamp.
    pending: HashMap<K, Instant>,
    /// How long a key must be stable before it is released.
    duration: Duration,
}

impl<K: Eq + Hash + Clone> Debouncer<K> {
    pub fn new(duration: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            duration,
        }
    }

    /// Record a change, resetting the timer for this key.
    pub fn record(&mut self, key: K) {
        self.pending.insert(key, Instant::now());
    }

    /// Keep only pending keys matching `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&K) -> bool) {
        self.pending.retain(|key, _| keep(key));
    }

    /// Take every key that has been stable for the debounce duration.
    pub fn take_ready(&mut self) -> Vec<K> {
        let now = Instant::now();
        let mut ready = Vec::new();

        self.pending.retain(|key, last_change| {
            if now.duration_since(*last_change) >= self.duration {
                ready.push(key.clone());
                false
            } else {
                true
            }
        });

        ready
    }

    /// Earliest instant at which some pending key becomes ready.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().map(|last| *last + self.duration)
    }
}

/// Sleep until `deadline`, or forever when there is none.
pub async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending::<()>().await,
    }
}
