//! Filesystem change dispatch for physical templates.
//!
//! One `notify` watcher covers the template root recursively. Individual
//! files subscribe with a callback; events are routed to the callbacks
//! registered for the paths they touch.

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Callback invoked with the logical path of a changed template.
pub type ChangeCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// What happened to a watched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

impl ChangeKind {
    fn classify(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(ChangeKind::Created),
            EventKind::Modify(ModifyKind::Metadata(_)) => None,
            EventKind::Modify(_) => Some(ChangeKind::Modified),
            EventKind::Remove(_) => Some(ChangeKind::Removed),
            _ => None,
        }
    }
}

struct Subscriber {
    id: u64,
    logical: String,
    callback: ChangeCallback,
}

#[derive(Default)]
struct Subscribers {
    by_file: RwLock<HashMap<PathBuf, Vec<Subscriber>>>,
    next_id: AtomicU64,
}

impl Subscribers {
    fn dispatch(&self, event: &Event) {
        let Some(kind) = ChangeKind::classify(&event.kind) else {
            trace!(kind = ?event.kind, "ignoring event");
            return;
        };

        // Collect first so callbacks never run under the lock.
        let targets: Vec<(String, ChangeCallback)> = {
            let by_file = self.by_file.read();
            event
                .paths
                .iter()
                .filter_map(|path| by_file.get(path))
                .flatten()
                .map(|s| (s.logical.clone(), Arc::clone(&s.callback)))
                .collect()
        };

        for (logical, callback) in targets {
            debug!(path = %logical, ?kind, "template changed");
            callback(&logical);
        }
    }
}

/// Recursive watcher over one template root.
pub struct ChangeWatcher {
    _watcher: RecommendedWatcher,
    subscribers: Arc<Subscribers>,
    root: PathBuf,
    canonical_root: PathBuf,
}

impl ChangeWatcher {
    /// Start watching `root` recursively. The directory must exist.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, notify::Error> {
        let root = root.as_ref().to_path_buf();
        let canonical_root = root.canonicalize().map_err(notify::Error::io)?;

        let subscribers = Arc::new(Subscribers::default());
        let dispatch = Arc::clone(&subscribers);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => dispatch.dispatch(&event),
                Err(e) => warn!(error = %e, "template watcher error"),
            }
        })?;

        watcher.watch(&canonical_root, RecursiveMode::Recursive)?;
        debug!(root = %canonical_root.display(), "watching template root");

        Ok(Self {
            _watcher: watcher,
            subscribers,
            root,
            canonical_root,
        })
    }

    /// Root as it was given.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether `file` lives under the watched root.
    pub fn covers(&self, file: &Path) -> bool {
        self.key_for(file).is_some()
    }

    /// Event paths are reported relative to the canonical root, so keys are
    /// rebuilt on top of it.
    fn key_for(&self, file: &Path) -> Option<PathBuf> {
        let relative = file
            .strip_prefix(&self.root)
            .or_else(|_| file.strip_prefix(&self.canonical_root))
            .ok()?;
        Some(self.canonical_root.join(relative))
    }

    /// Register `callback` for changes to `file`, reported as `logical`.
    ///
    /// Returns `None` if `file` is not under the watched root.
    pub(crate) fn subscribe(
        self: &Arc<Self>,
        file: &Path,
        logical: &str,
        callback: ChangeCallback,
    ) -> Option<Subscription> {
        let key = self.key_for(file)?;
        let id = self.subscribers.next_id.fetch_add(1, Ordering::Relaxed);

        self.subscribers
            .by_file
            .write()
            .entry(key.clone())
            .or_default()
            .push(Subscriber {
                id,
                logical: logical.to_string(),
                callback,
            });

        Some(Subscription {
            id,
            key,
            watcher: Arc::clone(self),
        })
    }

    fn unsubscribe(&self, key: &Path, id: u64) {
        let mut by_file = self.subscribers.by_file.write();
        if let Some(list) = by_file.get_mut(key) {
            list.retain(|s| s.id != id);
            if list.is_empty() {
                by_file.remove(key);
            }
        }
    }

    /// Number of files with at least one subscriber.
    pub fn watched_files(&self) -> usize {
        self.subscribers.by_file.read().len()
    }
}

/// An armed change subscription. Dropping it unregisters the callback; the
/// underlying watcher stops once the last subscription is gone.
pub struct Subscription {
    id: u64,
    key: PathBuf,
    watcher: Arc<ChangeWatcher>,
}

impl Subscription {
    /// File this subscription listens on.
    pub fn file(&self) -> &Path {
        &self.key
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.watcher.unsubscribe(&self.key, self.id);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("file", &self.key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, MetadataKind, RemoveKind};
    use parking_lot::Mutex;
    use tempfile::TempDir;

    fn recorder() -> (ChangeCallback, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: ChangeCallback = Arc::new(move |path: &str| sink.lock().push(path.to_string()));
        (callback, seen)
    }

    fn event(kind: EventKind, path: PathBuf) -> Event {
        Event::new(kind).add_path(path)
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            ChangeKind::classify(&EventKind::Create(CreateKind::File)),
            Some(ChangeKind::Created)
        );
        assert_eq!(
            ChangeKind::classify(&EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            Some(ChangeKind::Modified)
        );
        assert_eq!(
            ChangeKind::classify(&EventKind::Remove(RemoveKind::File)),
            Some(ChangeKind::Removed)
        );
        assert_eq!(
            ChangeKind::classify(&EventKind::Modify(ModifyKind::Metadata(MetadataKind::Any))),
            None
        );
        assert_eq!(ChangeKind::classify(&EventKind::Any), None);
    }

    #[test]
    fn test_dispatch_routes_by_path_and_unsubscribes_on_drop() {
        let temp = TempDir::new().unwrap();
        let watcher = Arc::new(ChangeWatcher::new(temp.path()).unwrap());
        let (callback, seen) = recorder();

        let file = temp.path().join("a").join("b.hbs");
        let subscription = watcher.subscribe(&file, "/a/b.hbs", callback).unwrap();
        assert_eq!(watcher.watched_files(), 1);

        let key = subscription.file().to_path_buf();
        let modified = EventKind::Modify(ModifyKind::Data(DataChange::Content));

        watcher.subscribers.dispatch(&event(modified, key.clone()));
        watcher
            .subscribers
            .dispatch(&event(modified, watcher.canonical_root.join("other.hbs")));
        assert_eq!(*seen.lock(), vec!["/a/b.hbs".to_string()]);

        drop(subscription);
        assert_eq!(watcher.watched_files(), 0);

        watcher.subscribers.dispatch(&event(modified, key));
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_subscribe_outside_root_is_rejected() {
        let temp = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        let watcher = Arc::new(ChangeWatcher::new(temp.path()).unwrap());
        let (callback, _) = recorder();

        assert!(!watcher.covers(&other.path().join("x.hbs")));
        assert!(watcher
            .subscribe(&other.path().join("x.hbs"), "/x.hbs", callback)
            .is_none());
    }

    #[test]
    fn test_missing_root_fails() {
        let temp = TempDir::new().unwrap();
        assert!(ChangeWatcher::new(temp.path().join("absent")).is_err());
    }
}
