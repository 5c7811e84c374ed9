//! Path manipulation utilities.
//!
//! Templates are addressed by *logical paths*: forward-slash separated,
//! rooted at `/`, independent of the host platform.

use std::path::{Component, Path, PathBuf};

/// Separator used in logical paths.
pub const LOGICAL_SEPARATOR: char = '/';

/// Normalize a path by resolving `.` and `..` without hitting the filesystem.
pub fn normalize(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::Prefix(p) => components.push(Component::Prefix(p)),
            Component::RootDir => {
                components.clear();
                components.push(Component::RootDir);
            }
            Component::CurDir => {}
            Component::ParentDir => match components.last() {
                Some(Component::Normal(_)) => {
                    components.pop();
                }
                Some(Component::ParentDir) | None => components.push(Component::ParentDir),
                // Never pop past a prefix or root.
                Some(_) => {}
            },
            Component::Normal(c) => components.push(Component::Normal(c)),
        }
    }

    if components.is_empty() {
        PathBuf::from(".")
    } else {
        components.iter().collect()
    }
}

/// Convert a path to a Unix-style string (forward slashes).
pub fn to_unix_string(path: impl AsRef<Path>) -> String {
    path.as_ref()
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Canonical logical form of a template name.
///
/// Both `/` and `\` are accepted as separators, empty and `.` segments are
/// dropped and `..` pops a segment (never above the root). The result always
/// starts with a single `/`.
pub fn normalize_logical(name: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in name.split(|c: char| c == '/' || c == '\\') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    let mut logical = String::with_capacity(name.len() + 1);
    for segment in segments {
        logical.push(LOGICAL_SEPARATOR);
        logical.push_str(segment);
    }
    if logical.is_empty() {
        logical.push(LOGICAL_SEPARATOR);
    }
    logical
}

/// Logical path of `file` relative to `root`, or `None` if `file` is not
/// under `root`.
pub fn logical_path(root: impl AsRef<Path>, file: impl AsRef<Path>) -> Option<String> {
    let root = normalize(root);
    let file = normalize(file);
    let relative = file.strip_prefix(&root).ok()?;

    if relative.as_os_str().is_empty() {
        return None;
    }

    Some(normalize_logical(&to_unix_string(relative)))
}
