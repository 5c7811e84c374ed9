//! View errors.

use std::io;
use thiserror::Error;

use crate::collab::RenderError;
use crate::diagnostic::Diagnostics;

/// Errors returned by the compile pipeline, the cache and the engine.
#[derive(Debug, Error)]
pub enum ViewError {
    #[error("no template registered at '{path}'")]
    UnknownSource { path: String },

    #[error("failed to translate '{path}':\n{diagnostics}")]
    TranslationFailure {
        path: String,
        diagnostics: Diagnostics,
    },

    #[error("generated code for '{path}' does not compile:\n{diagnostics}")]
    CodeCompilationFailure {
        path: String,
        diagnostics: Diagnostics,
        generated_code: String,
    },

    #[error("failed to read '{path}': {source}")]
    SourceRead {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to load module for '{path}': {message}")]
    ModuleLoad { path: String, message: String },

    #[error("failed to render '{path}': {source}")]
    Render {
        path: String,
        #[source]
        source: RenderError,
    },

    #[error("compile task for '{path}' did not complete: {message}")]
    Worker { path: String, message: String },
}

impl ViewError {
    /// Logical path the error is about.
    pub fn path(&self) -> &str {
        match self {
            ViewError::UnknownSource { path }
            | ViewError::TranslationFailure { path, .. }
            | ViewError::CodeCompilationFailure { path, .. }
            | ViewError::SourceRead { path, .. }
            | ViewError::ModuleLoad { path, .. }
            | ViewError::Render { path, .. }
            | ViewError::Worker { path, .. } => path,
        }
    }

    /// Diagnostics carried by translation and compilation failures.
    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            ViewError::TranslationFailure { diagnostics, .. }
            | ViewError::CodeCompilationFailure { diagnostics, .. } => Some(diagnostics),
            _ => None,
        }
    }

    /// Short machine-readable kind, used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ViewError::UnknownSource { .. } => "unknown_source",
            ViewError::TranslationFailure { .. } => "translation",
            ViewError::CodeCompilationFailure { .. } => "compilation",
            ViewError::SourceRead { .. } => "source_read",
            ViewError::ModuleLoad { .. } => "module_load",
            ViewError::Render { .. } => "render",
            ViewError::Worker { .. } => "worker",
        }
    }
}

/// Result alias for view operations.
pub type Result<T> = std::result::Result<T, ViewError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::{codes, Diagnostic};

    #[test]
    fn test_display_includes_diagnostics() {
        let err = ViewError::TranslationFailure {
            path: "/a.hbs".into(),
            diagnostics: Diagnostic::error(codes::SYNTAX, "unclosed").at(2, Some(1)).into(),
        };
        assert_eq!(
            err.to_string(),
            "failed to translate '/a.hbs':\nerror[STC0001] 2:1: unclosed"
        );
        assert_eq!(err.path(), "/a.hbs");
        assert_eq!(err.kind(), "translation");
        assert!(err.diagnostics().is_some());
    }

    #[test]
    fn test_unknown_source() {
        let err = ViewError::UnknownSource { path: "/nope".into() };
        assert_eq!(err.to_string(), "no template registered at '/nope'");
        assert!(err.diagnostics().is_none());
    }
}
