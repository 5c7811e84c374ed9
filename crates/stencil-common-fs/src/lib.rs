//! File system utilities for Stencil.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod path;

/// File system errors.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid wildcard '{pattern}': {message}")]
    Pattern { pattern: String, message: String },
}

/// Result alias for file system operations.
pub type Result<T> = std::result::Result<T, FsError>;

/// Decode UTF-8 text, dropping a leading byte order mark.
pub fn decode_utf8(mut bytes: Vec<u8>) -> std::result::Result<String, std::string::FromUtf8Error> {
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        bytes.drain(..3);
    }
    String::from_utf8(bytes)
}

/// Recursively list files under `root` whose file name matches `pattern`.
///
/// The wildcard is applied to the file name only, so `*.hbs` matches at any
/// depth. Results are sorted. A missing root yields an empty list.
pub fn find_matching(root: impl AsRef<Path>, pattern: &str) -> Result<Vec<PathBuf>> {
    let root = root.as_ref();
    let matcher = glob::Pattern::new(pattern).map_err(|e| FsError::Pattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;

    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            let source = e
                .into_io_error()
                .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "filesystem loop"));
            FsError::Read { path, source }
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let matches = entry
            .file_name()
            .to_str()
            .map(|name| matcher.matches(name))
            .unwrap_or(false);

        if matches {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}
