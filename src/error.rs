//! Error types, one enum per failure domain.
//!
//! None of these are fatal to the engine: every variant degrades to "this
//! one source is temporarily unavailable". The only error surfaced to callers
//! as a hard failure is [`EngineError::AlreadyInitialized`].

use std::path::PathBuf;
use thiserror::Error;

/// A configured source string that could not be resolved.
#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("empty source entry")]
    Empty,

    #[error("cannot expand '~' in {entry}: home directory is unavailable")]
    NoHomeDir { entry: String },

    #[error("path does not exist: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("path is neither a file nor a directory: {}", path.display())]
    Unsupported { path: PathBuf },

    #[error("cannot stat {}: {source}", path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Directory enumeration failures.
#[derive(Error, Debug)]
pub enum ListError {
    #[error("not a directory: {}", path.display())]
    NotADirectory { path: PathBuf },

    #[error("listing task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Failures reading a file or fetching a URL.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("unrecognized file type: {}", path.display())]
    UnknownFileType { path: PathBuf },

    #[error("not a regular file: {}", path.display())]
    NotAFile { path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("request to {url} failed: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} responded with {status}")]
    Status { url: String, status: String },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Sass compilation failures.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("failed to compile {origin}: {message}")]
    Syntax { origin: String, message: String },

    #[error("compiler task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Failures raised by an event sink.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("sink channel closed")]
    Closed,

    #[error("failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("event rejected: {reason}")]
    Rejected { reason: String },
}

/// Settings loading, saving and migration failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load settings: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid file selector '{pattern}': {source}")]
    InvalidSelector {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("configuration file already exists: {}. Use --force to overwrite", path.display())]
    AlreadyExists { path: PathBuf },

    #[error("failed to list {}: {source}", path.display())]
    Listing {
        path: PathBuf,
        #[source]
        source: ListError,
    },
}

/// Engine lifecycle errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("engine already initialized")]
    AlreadyInitialized,

    #[error("reconcile queue closed")]
    QueueClosed,

    #[error("engine task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Failures opening or closing filesystem watches.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("failed to create watcher: {0}")]
    Backend(#[from] notify::Error),

    #[error("cannot watch {}: {source}", path.display())]
    Subscribe {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("watch target has no parent directory: {}", path.display())]
    NoParent { path: PathBuf },
}
