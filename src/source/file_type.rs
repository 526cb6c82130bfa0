//! Extension-based file type detection.
//!
//! This is the only gate deciding whether a local path is tracked at all:
//! anything without a recognized extension is ignored.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Kind of style source, decided purely by file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// Plain `.css`
    Css,
    /// `.sass` / `.scss`, compiled before delivery
    Sass,
    /// `.user.css` user stylesheet
    Usercss,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Css => "css",
            FileType::Sass => "sass",
            FileType::Usercss => "usercss",
        }
    }

    /// Detect from the last component of `path`.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.file_name()
            .and_then(|name| name.to_str())
            .and_then(determine_file_type)
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a file name to its type. Matching is case-sensitive.
pub fn determine_file_type(file_name: &str) -> Option<FileType> {
    if file_name.ends_with(".sass") || file_name.ends_with(".scss") {
        Some(FileType::Sass)
    } else if file_name.ends_with(".user.css") {
        Some(FileType::Usercss)
    } else if file_name.ends_with(".css") {
        Some(FileType::Css)
    } else {
        None
    }
}
