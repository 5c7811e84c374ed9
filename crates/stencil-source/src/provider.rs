//! Access to physical template files.

use parking_lot::Mutex;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tracing::debug;

use crate::watcher::ChangeWatcher;
use crate::SourceError;

pub use crate::watcher::{ChangeCallback, Subscription};

/// Filesystem seam used by the registry and by physical descriptors.
pub trait FileProvider: Send + Sync {
    /// Recursively list files under `root` whose file name matches `pattern`.
    fn list(&self, root: &Path, pattern: &str) -> Result<Vec<PathBuf>, SourceError>;

    /// Open `file` for reading. Every call observes the current file state.
    fn open(&self, file: &Path) -> io::Result<Box<dyn Read + Send>>;

    /// Call `callback` with `logical` whenever `file` (under `root`) is
    /// created, modified or deleted, until the subscription is dropped.
    fn watch(
        &self,
        root: &Path,
        file: &Path,
        logical: &str,
        callback: ChangeCallback,
    ) -> Result<Subscription, SourceError>;
}

/// [`FileProvider`] over the local disk.
///
/// One recursive watcher is started per root, on first use, and shut down
/// when its last subscription is dropped.
#[derive(Default)]
pub struct DiskFileProvider {
    watchers: Mutex<Vec<Weak<ChangeWatcher>>>,
}

impl DiskFileProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn watcher_for(&self, root: &Path, file: &Path) -> Result<Arc<ChangeWatcher>, SourceError> {
        let mut watchers = self.watchers.lock();
        watchers.retain(|w| w.strong_count() > 0);

        if let Some(existing) = watchers
            .iter()
            .filter_map(Weak::upgrade)
            .find(|w| w.covers(file))
        {
            return Ok(existing);
        }

        let watcher = Arc::new(ChangeWatcher::new(root).map_err(|source| SourceError::Watch {
            path: root.display().to_string(),
            source,
        })?);
        debug!(root = %root.display(), "started template watcher");
        watchers.push(Arc::downgrade(&watcher));
        Ok(watcher)
    }
}

impl FileProvider for DiskFileProvider {
    fn list(&self, root: &Path, pattern: &str) -> Result<Vec<PathBuf>, SourceError> {
        Ok(stencil_common_fs::find_matching(root, pattern)?)
    }

    fn open(&self, file: &Path) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(file)?))
    }

    fn watch(
        &self,
        root: &Path,
        file: &Path,
        logical: &str,
        callback: ChangeCallback,
    ) -> Result<Subscription, SourceError> {
        let watcher = self.watcher_for(root, file)?;
        watcher
            .subscribe(file, logical, callback)
            .ok_or_else(|| SourceError::OutsideRoot {
                file: file.to_path_buf(),
                root: root.to_path_buf(),
            })
    }
}

impl std::fmt::Debug for DiskFileProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let live = self
            .watchers
            .lock()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count();
        f.debug_struct("DiskFileProvider")
            .field("watchers", &live)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn noop() -> ChangeCallback {
        Arc::new(|_: &str| {})
    }

    #[test]
    fn test_list_and_open() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a")).unwrap();
        fs::write(dir.path().join("a/b.hbs"), "b").unwrap();
        fs::write(dir.path().join("c.txt"), "c").unwrap();

        let provider = DiskFileProvider::new();
        let files = provider.list(dir.path(), "*.hbs").unwrap();
        assert_eq!(files, vec![dir.path().join("a").join("b.hbs")]);

        let mut text = String::new();
        provider.open(&files[0]).unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "b");
    }

    #[test]
    fn test_watchers_are_shared_per_root_and_dropped_with_subscriptions() {
        let dir = tempdir().unwrap();
        let provider = DiskFileProvider::new();

        let first = provider
            .watch(dir.path(), &dir.path().join("x.hbs"), "/x.hbs", noop())
            .unwrap();
        let second = provider
            .watch(dir.path(), &dir.path().join("y.hbs"), "/y.hbs", noop())
            .unwrap();
        assert_eq!(format!("{:?}", provider), "DiskFileProvider { watchers: 1 }");

        drop(first);
        drop(second);
        assert_eq!(format!("{:?}", provider), "DiskFileProvider { watchers: 0 }");
    }

    #[test]
    fn test_watch_missing_root_fails() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("absent");
        let err = DiskFileProvider::new()
            .watch(&root, &root.join("x.hbs"), "/x.hbs", noop())
            .unwrap_err();
        assert!(matches!(err, SourceError::Watch { .. }));
    }
}
