//! Source descriptors: where a template's raw content comes from.

use std::fmt;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::provider::{FileProvider, Subscription};
use crate::SourceError;

/// Origin of a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// In-memory string, never changes.
    Virtual,
    /// File on disk, may be watched.
    Physical,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Virtual => f.pad("virtual"),
            SourceKind::Physical => f.pad("physical"),
        }
    }
}

/// Origin-specific state of a descriptor.
pub enum SourceOrigin {
    Virtual {
        content: Arc<str>,
    },
    Physical {
        file: PathBuf,
        provider: Arc<dyn FileProvider>,
        subscription: Option<Subscription>,
    },
}

/// Raw template content handed to the translator.
pub enum SourceContent {
    /// Physical sources are read as a byte stream.
    Stream(Box<dyn Read + Send>),
    /// Virtual sources hand over their stored string.
    Text(Arc<str>),
}

impl SourceContent {
    /// Drain the content into raw bytes.
    pub fn into_bytes(self) -> io::Result<Vec<u8>> {
        match self {
            SourceContent::Stream(mut reader) => {
                let mut bytes = Vec::new();
                reader.read_to_end(&mut bytes)?;
                Ok(bytes)
            }
            SourceContent::Text(text) => Ok(text.as_bytes().to_vec()),
        }
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, SourceContent::Stream(_))
    }
}

impl fmt::Debug for SourceContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceContent::Stream(_) => f.write_str("SourceContent::Stream(..)"),
            SourceContent::Text(text) => f.debug_tuple("SourceContent::Text").field(text).finish(),
        }
    }
}

/// Uniform handle to a named template's raw content.
///
/// The origin kind is fixed at construction. Descriptors live for the
/// lifetime of the registry and outlive individual cache entries.
pub struct SourceDescriptor {
    path: String,
    origin: SourceOrigin,
}

impl SourceDescriptor {
    /// In-memory template. `path` must already be a logical path.
    pub fn inline(path: impl Into<String>, content: impl Into<Arc<str>>) -> Self {
        Self {
            path: path.into(),
            origin: SourceOrigin::Virtual {
                content: content.into(),
            },
        }
    }

    /// File-backed template, optionally with an armed change subscription.
    pub fn physical(
        path: impl Into<String>,
        file: impl Into<PathBuf>,
        provider: Arc<dyn FileProvider>,
        subscription: Option<Subscription>,
    ) -> Self {
        Self {
            path: path.into(),
            origin: SourceOrigin::Physical {
                file: file.into(),
                provider,
                subscription,
            },
        }
    }

    /// Logical path.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> SourceKind {
        match self.origin {
            SourceOrigin::Virtual { .. } => SourceKind::Virtual,
            SourceOrigin::Physical { .. } => SourceKind::Physical,
        }
    }

    pub fn origin(&self) -> &SourceOrigin {
        &self.origin
    }

    /// Whether this origin can report changes at all.
    pub fn is_watchable(&self) -> bool {
        self.kind() == SourceKind::Physical
    }

    /// Whether a change subscription is currently armed.
    pub fn is_watched(&self) -> bool {
        matches!(
            self.origin,
            SourceOrigin::Physical {
                subscription: Some(_),
                ..
            }
        )
    }

    /// Backing file of a physical descriptor.
    pub fn file(&self) -> Option<&Path> {
        match &self.origin {
            SourceOrigin::Physical { file, .. } => Some(file),
            SourceOrigin::Virtual { .. } => None,
        }
    }

    /// Open the raw content.
    pub fn open(&self) -> Result<SourceContent, SourceError> {
        match &self.origin {
            SourceOrigin::Virtual { content } => Ok(SourceContent::Text(Arc::clone(content))),
            SourceOrigin::Physical { file, provider, .. } => provider
                .open(file)
                .map(SourceContent::Stream)
                .map_err(|source| SourceError::Read {
                    path: self.path.clone(),
                    source,
                }),
        }
    }
}

impl fmt::Debug for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("SourceDescriptor");
        s.field("path", &self.path).field("kind", &self.kind());
        if let Some(file) = self.file() {
            s.field("file", &file).field("watched", &self.is_watched());
        }
        s.finish()
    }
}
