//! Directory enumeration filtered to recognized style files.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::ListError;
use crate::source::FileType;

/// List style files under `dir`, sorted.
///
/// Shallow mode returns direct children only; recursive mode has no depth
/// limit. Symlinks are followed and `walkdir` breaks cycles. Entries that
/// cannot be read are skipped with a warning.
pub fn list_files(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>, ListError> {
    if !dir.is_dir() {
        return Err(ListError::NotADirectory {
            path: dir.to_path_buf(),
        });
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files = Vec::new();

    for entry in WalkDir::new(dir)
        .follow_links(true)
        .min_depth(1)
        .max_depth(max_depth)
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.loop_ancestor().is_some() => {
                crate::debug_event!("lister", "symlink loop skipped", "{e}");
                continue;
            }
            Err(e) => {
                tracing::warn!("[lister] skipping unreadable entry under {}: {e}", dir.display());
                continue;
            }
        };

        if entry.file_type().is_file() && FileType::from_path(entry.path()).is_some() {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

/// [`list_files`] on the blocking pool.
pub async fn list_files_async(dir: PathBuf, recursive: bool) -> Result<Vec<PathBuf>, ListError> {
    tokio::task::spawn_blocking(move || list_files(&dir, recursive)).await?
}
