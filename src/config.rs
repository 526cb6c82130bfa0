//! Layered settings for stylesync.
//!
//! Sources, lowest precedence first:
//! - Default values
//! - TOML configuration file (`.stylesync/settings.toml`)
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `STYLESYNC_` and use double
//! underscores to separate nested levels:
//! - `STYLESYNC_SOURCES__RECURSE_DIRECTORY=true` sets `sources.recurse_directory`
//! - `STYLESYNC_RUNTIME__MODE=sandboxed` sets `runtime.mode`
//! - `STYLESYNC_WATCH__DEBOUNCE_MS=300` sets `watch.debounce_ms`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::lister;

/// Directory holding the settings file, searched upward from the cwd.
pub const CONFIG_DIR: &str = ".stylesync";
/// Settings file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "settings.toml";
/// Environment variable prefix.
pub const ENV_PREFIX: &str = "STYLESYNC_";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Configured style sources
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Capability selection
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Remote fetch behavior
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Live reload behavior
    #[serde(default)]
    pub watch: WatchConfig,

    /// Log levels
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct SourcesConfig {
    /// Ordered source entries: files, directories or http(s) URLs, each
    /// optionally prefixed with `@light ` / `@dark ` and using `~` for home.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paths: Option<Vec<String>>,

    /// Descend into subdirectories of directory sources
    #[serde(default)]
    pub recurse_directory: bool,

    /// Legacy single-source setting, migrated into `paths`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css_path: Option<String>,

    /// Legacy file-name regex applied to `css_path`, migrated into `paths`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_selector: Option<String>,
}

impl SourcesConfig {
    /// Source entries, empty when unset.
    pub fn entries(&self) -> &[String] {
        self.paths.as_deref().unwrap_or_default()
    }

    /// Convenience constructor used by embedders and tests.
    pub fn new<I, S>(paths: I, recurse_directory: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: Some(paths.into_iter().map(Into::into).collect()),
            recurse_directory,
            css_path: None,
            file_selector: None,
        }
    }
}

/// Which capability set to run with.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    /// Probe native capabilities, fall back to sandboxed
    #[default]
    Auto,
    /// Require native capabilities, still falling back with an error log
    Native,
    /// URLs and single files only
    Sandboxed,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub mode: RuntimeMode,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct FetchConfig {
    /// Override the User-Agent sent in native mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Request timeout; no timeout when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    /// How long a changed file must be quiet before it is reloaded
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Default level for every module
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module overrides, e.g. `"stylesync::watcher" = "debug"`
    #[serde(default)]
    pub modules: BTreeMap<String, String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_debounce_ms() -> u64 {
    150
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            sources: SourcesConfig::default(),
            runtime: RuntimeConfig::default(),
            fetch: FetchConfig::default(),
            watch: WatchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: BTreeMap::new(),
        }
    }
}

fn env_provider() -> Env {
    Env::prefixed(ENV_PREFIX).map(|key| key.as_str().to_lowercase().replace("__", ".").into())
}

impl Settings {
    /// Load from the workspace settings file (if any) plus environment.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(CONFIG_FILE));
        Self::load_from(config_path)
    }

    /// Load from a specific file plus environment.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(env_provider())
            .extract()
            .map_err(|e| ConfigError::Load(Box::new(e)))
    }

    /// Find `.stylesync/settings.toml` from the current directory upward.
    pub fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .map(|ancestor| ancestor.join(CONFIG_DIR))
            .find(|dir| dir.is_dir())
            .map(|dir| dir.join(CONFIG_FILE))
    }

    /// Save current configuration to file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Write a default settings file under `dir`.
    pub fn init_config_file(dir: &Path, force: bool) -> Result<PathBuf, ConfigError> {
        let config_path = dir.join(CONFIG_DIR).join(CONFIG_FILE);

        if !force && config_path.exists() {
            return Err(ConfigError::AlreadyExists { path: config_path });
        }

        let settings = Settings {
            sources: SourcesConfig::new(Vec::<String>::new(), false),
            ..Settings::default()
        };
        settings.save(&config_path)?;

        Ok(config_path)
    }

    /// Rewrite legacy `css_path` / `file_selector` settings into `paths`.
    ///
    /// Returns `true` when the settings changed and should be saved. Nothing
    /// happens once `paths` is present.
    pub fn migrate_legacy_sources(&mut self) -> Result<bool, ConfigError> {
        if self.sources.paths.is_some() {
            return Ok(false);
        }

        let Some(css_path) = self
            .sources
            .css_path
            .clone()
            .filter(|p| !p.trim().is_empty())
        else {
            return Ok(false);
        };

        let mut paths = vec![css_path.clone()];

        if let Some(selector) = self
            .sources
            .file_selector
            .as_deref()
            .filter(|s| !s.trim().is_empty())
        {
            let dir = PathBuf::from(&css_path);
            if dir.is_dir() {
                let pattern = Regex::new(selector).map_err(|source| ConfigError::InvalidSelector {
                    pattern: selector.to_string(),
                    source,
                })?;
                let files = lister::list_files(&dir, self.sources.recurse_directory).map_err(
                    |source| ConfigError::Listing {
                        path: dir.clone(),
                        source,
                    },
                )?;

                // The directory itself would ignore the selector, so only
                // the matching files are kept.
                paths = files
                    .into_iter()
                    .filter(|file| {
                        file.file_name()
                            .and_then(|name| name.to_str())
                            .is_some_and(|name| pattern.is_match(name))
                    })
                    .map(|file| file.to_string_lossy().into_owned())
                    .collect();
            }
        }

        crate::debug_event!("config", "migrated legacy sources", "{paths:?}");

        self.sources.paths = Some(paths);
        self.sources.css_path = None;
        self.sources.file_selector = None;
        Ok(true)
    }
}
