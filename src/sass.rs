//! Sass/SCSS compilation.
//!
//! Compilation is only offered by native capabilities. Failures stay local
//! to the file being compiled: the caller logs and skips it, and the next
//! pass or change event tries again.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::CompileError;

/// Compiles preprocessor sources into expanded CSS.
#[async_trait]
pub trait SassCompiler: Send + Sync {
    /// Compile a file on disk. Relative `@use`/`@import` resolve against it.
    async fn compile_file(&self, path: &Path) -> Result<String, CompileError>;

    /// Compile source text fetched from `origin` (imports are not resolved).
    async fn compile_source(&self, src: String, origin: &str) -> Result<String, CompileError>;
}

/// [`SassCompiler`] backed by `grass`, run on the blocking pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct GrassCompiler;

impl GrassCompiler {
    pub fn new() -> Self {
        Self
    }

    fn syntax_for(origin: &str) -> grass::InputSyntax {
        if origin.ends_with(".sass") {
            grass::InputSyntax::Sass
        } else {
            grass::InputSyntax::Scss
        }
    }
}

#[async_trait]
impl SassCompiler for GrassCompiler {
    async fn compile_file(&self, path: &Path) -> Result<String, CompileError> {
        let path: PathBuf = path.to_path_buf();

        tokio::task::spawn_blocking(move || {
            let options = grass::Options::default().style(grass::OutputStyle::Expanded);
            grass::from_path(&path, &options).map_err(|e| CompileError::Syntax {
                origin: path.display().to_string(),
                message: e.to_string(),
            })
        })
        .await?
    }

    async fn compile_source(&self, src: String, origin: &str) -> Result<String, CompileError> {
        let origin = origin.to_string();

        tokio::task::spawn_blocking(move || {
            let options = grass::Options::default()
                .style(grass::OutputStyle::Expanded)
                .input_syntax(Self::syntax_for(&origin));
            grass::from_string(src, &options).map_err(|e| CompileError::Syntax {
                origin,
                message: e.to_string(),
            })
        })
        .await?
    }
}
