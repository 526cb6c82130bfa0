//! Reading local style files and fetching remote ones.

use reqwest::Url;
use std::path::Path;
use std::time::Duration;

use crate::config::FetchConfig;
use crate::error::LoadError;
use crate::source::{FileType, determine_file_type};

/// User-Agent sent by native builds unless overridden in `[fetch]`.
pub const DEFAULT_USER_AGENT: &str = concat!("stylesync/", env!("CARGO_PKG_VERSION"));

/// Raw content plus detected type, before any compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedSource {
    pub src: String,
    pub file_type: FileType,
}

/// Loads file and URL content.
#[derive(Debug, Clone)]
pub struct ContentLoader {
    client: reqwest::Client,
    user_agent: Option<String>,
}

impl ContentLoader {
    /// Build a loader. `send_user_agent` is false for sandboxed mode, whose
    /// fetch path rejects a custom header.
    pub fn new(fetch: &FetchConfig, send_user_agent: bool) -> Result<Self, LoadError> {
        let user_agent = send_user_agent.then(|| {
            fetch
                .user_agent
                .clone()
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string())
        });

        let mut builder = reqwest::Client::builder();
        if let Some(agent) = &user_agent {
            builder = builder.user_agent(agent.as_str());
        }
        if let Some(secs) = fetch.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        let client = builder.build().map_err(LoadError::Client)?;
        Ok(Self { client, user_agent })
    }

    /// The User-Agent attached to requests, if any.
    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    /// Read a local file. Unknown extensions are rejected: unlike URLs, local
    /// files must declare their type.
    pub async fn load_file(&self, path: &Path) -> Result<LoadedSource, LoadError> {
        let file_type = FileType::from_path(path).ok_or_else(|| LoadError::UnknownFileType {
            path: path.to_path_buf(),
        })?;

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|source| LoadError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        if !metadata.is_file() {
            return Err(LoadError::NotAFile {
                path: path.to_path_buf(),
            });
        }

        let src = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| LoadError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(LoadedSource { src, file_type })
    }

    /// Fetch a URL. Any non-2xx status is an error carrying the status text.
    pub async fn load_url(&self, url: &Url) -> Result<LoadedSource, LoadError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| LoadError::Fetch {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Status {
                url: url.to_string(),
                status: status
                    .canonical_reason()
                    .map(str::to_string)
                    .unwrap_or_else(|| status.as_str().to_string()),
            });
        }

        let src = response.text().await.map_err(|source| LoadError::Fetch {
            url: url.to_string(),
            source,
        })?;

        Ok(LoadedSource {
            src,
            file_type: url_file_type(url),
        })
    }
}

/// URLs often lack an extension, so anything unrecognized is plain CSS.
pub fn url_file_type(url: &Url) -> FileType {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(determine_file_type)
        .unwrap_or(FileType::Css)
}
