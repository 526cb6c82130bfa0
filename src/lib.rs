//! Declarative stylesheet loading.
//!
//! An ordered list of sources (files, directories and http(s) URLs, each
//! optionally tagged `@light ` / `@dark `) is resolved, loaded, watched and
//! kept in sync with an [`EventSink`](sink::EventSink) through a minimal
//! stream of add / remove / remove-directory events.

pub mod logging;

pub mod capabilities;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod lister;
pub mod loader;
pub mod queue;
pub mod reconcile;
pub mod sass;
pub mod sink;
pub mod source;
pub mod watcher;

pub use capabilities::{Capabilities, NativeCapabilities, SandboxedCapabilities};
pub use config::{Settings, SourcesConfig};
pub use engine::{ConfigProvider, Engine, EngineHandle, SettingsFile, StaticConfig};
pub use error::{EngineError, LoadError, SinkError};
pub use queue::{ReconcileQueue, TriggerReason};
pub use sink::{ChannelSink, EventSink, JsonLinesSink, StyleRegistry};
pub use source::{CssEvent, CssFile, FileType, Theme};
