//! Filesystem watching for reconciled sources.
//!
//! # Architecture
//!
//! ```text
//! WatchManager (owned by the engine's queue consumer)
//!   - one WatchHandle per file / directory key
//!   - recursion policy fixed at handle creation
//!         |
//!    WatchHandle -> notify watcher -> EventFilter
//!         |
//!    WatchNotice channel -> Debouncer -> reload / Remove
//! ```
//!
//! [`SettingsWatcher`] uses the same handles to turn saves of the settings
//! file into queued passes.

mod debouncer;
mod handle;
mod manager;
mod settings;

pub use crate::error::WatchError;
pub use debouncer::{Debouncer, wait_until};
pub use handle::{FileChange, TargetKind, WatchHandle, WatchNotice, WatchTarget};
pub use manager::{SyncReport, WatchManager};
pub use settings::SettingsWatcher;
