//! Native vs sandboxed capability sets.
//!
//! The engine is handed one [`Capabilities`] value at construction and never
//! branches on the environment again. Native capabilities add directory
//! scanning, Sass compilation, filesystem watching and a User-Agent header.
//! The sandboxed set supports URLs and single explicit files only; the sink
//! sees identical event shapes either way.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::RuntimeMode;
use crate::sass::{GrassCompiler, SassCompiler};
use crate::watcher::WatchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityKind {
    Native,
    Sandboxed,
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityKind::Native => f.write_str("native"),
            CapabilityKind::Sandboxed => f.write_str("sandboxed"),
        }
    }
}

/// What the current environment lets the engine do.
pub trait Capabilities: Send + Sync {
    fn kind(&self) -> CapabilityKind;

    /// Home directory for `~` expansion, looked up on every call.
    fn home_dir(&self) -> Option<PathBuf>;

    /// Sass compiler, if compilation is available.
    fn sass(&self) -> Option<Arc<dyn SassCompiler>>;

    /// Whether directory sources can be enumerated.
    fn lists_directories(&self) -> bool;

    /// Whether filesystem watches can be opened.
    fn watches(&self) -> bool;

    /// Whether fetches may carry a custom User-Agent.
    fn sends_user_agent(&self) -> bool;
}

/// Full filesystem access.
pub struct NativeCapabilities {
    sass: Arc<dyn SassCompiler>,
    home_override: Option<PathBuf>,
}

impl NativeCapabilities {
    pub fn new() -> Self {
        Self {
            sass: Arc::new(GrassCompiler::new()),
            home_override: None,
        }
    }

    /// Native capabilities, provided the platform watcher can be created.
    pub fn probe() -> Result<Self, WatchError> {
        notify::recommended_watcher(|_: notify::Result<notify::Event>| {})?;
        Ok(Self::new())
    }

    /// Pin the home directory instead of reading it from the environment.
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home_override = Some(home.into());
        self
    }

    pub fn with_compiler(mut self, compiler: Arc<dyn SassCompiler>) -> Self {
        self.sass = compiler;
        self
    }
}

impl Default for NativeCapabilities {
    fn default() -> Self {
        Self::new()
    }
}

impl Capabilities for NativeCapabilities {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Native
    }

    fn home_dir(&self) -> Option<PathBuf> {
        self.home_override.clone().or_else(dirs::home_dir)
    }

    fn sass(&self) -> Option<Arc<dyn SassCompiler>> {
        Some(self.sass.clone())
    }

    fn lists_directories(&self) -> bool {
        true
    }

    fn watches(&self) -> bool {
        true
    }

    fn sends_user_agent(&self) -> bool {
        true
    }
}

/// URLs and single files only.
#[derive(Debug, Default, Clone, Copy)]
pub struct SandboxedCapabilities;

impl Capabilities for SandboxedCapabilities {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Sandboxed
    }

    fn home_dir(&self) -> Option<PathBuf> {
        None
    }

    fn sass(&self) -> Option<Arc<dyn SassCompiler>> {
        None
    }

    fn lists_directories(&self) -> bool {
        false
    }

    fn watches(&self) -> bool {
        false
    }

    fn sends_user_agent(&self) -> bool {
        false
    }
}

/// Pick the capability set for `mode`, probing native support first.
pub fn select(mode: RuntimeMode) -> Arc<dyn Capabilities> {
    if mode == RuntimeMode::Sandboxed {
        return Arc::new(SandboxedCapabilities);
    }

    match NativeCapabilities::probe() {
        Ok(native) => Arc::new(native),
        Err(e) => {
            if mode == RuntimeMode::Native {
                tracing::error!(
                    "[capabilities] native support unavailable, falling back to sandboxed: {e}"
                );
            } else {
                tracing::warn!("[capabilities] using sandboxed mode: {e}");
            }
            Arc::new(SandboxedCapabilities)
        }
    }
}
