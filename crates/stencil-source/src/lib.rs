//! Template sources for Stencil.
//!
//! Templates come from two places: files under a configured root (watched
//! for changes) and in-memory bodies from configuration. Both are exposed
//! through [`SourceDescriptor`] and looked up by logical path in the
//! [`SourceRegistry`].

pub mod descriptor;
pub mod directive;
pub mod provider;
pub mod registry;
pub mod watcher;

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub use descriptor::{SourceContent, SourceDescriptor, SourceKind, SourceOrigin};
pub use directive::{compose, Directive, DirectiveError};
pub use provider::{ChangeCallback, DiskFileProvider, FileProvider, Subscription};
pub use registry::SourceRegistry;
pub use watcher::{ChangeKind, ChangeWatcher};

/// Source errors.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read template '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Fs(#[from] stencil_common_fs::FsError),

    #[error("failed to watch '{path}': {source}")]
    Watch {
        path: String,
        #[source]
        source: notify::Error,
    },

    #[error("{} is not under template root {}", file.display(), root.display())]
    OutsideRoot { file: PathBuf, root: PathBuf },
}

/// Result alias for source operations.
pub type Result<T> = std::result::Result<T, SourceError>;
