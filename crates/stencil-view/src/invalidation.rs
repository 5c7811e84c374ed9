//! Carries file change notifications into cache invalidations.
//!
//! Watch callbacks fire on the watcher's own thread, so they only push the
//! logical path onto a channel. A task on the runtime drains it, coalesces
//! bursts and calls [`ViewCache::invalidate`] for every distinct path.

use std::collections::BTreeSet;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use stencil_source::ChangeCallback;

use crate::cache::ViewCache;

/// Create the callback handed to the registry and its receiving end.
pub fn channel() -> (ChangeCallback, ChangeReceiver) {
    let (tx, rx) = mpsc::unbounded_channel::<String>();
    let callback: ChangeCallback = Arc::new(move |path: &str| {
        // Fails only once the loop has stopped.
        let _ = tx.send(path.to_string());
    });
    (callback, ChangeReceiver { rx })
}

/// Receiving end of change notifications.
#[derive(Debug)]
pub struct ChangeReceiver {
    rx: mpsc::UnboundedReceiver<String>,
}

impl ChangeReceiver {
    /// Start invalidating `cache` on the current runtime.
    ///
    /// The task holds only a weak reference, so it stops once the cache is
    /// dropped and the watcher releases its senders.
    pub fn spawn(self, cache: &Arc<ViewCache>, coalesce: Duration) -> InvalidationLoop {
        let cache = Arc::downgrade(cache);
        let handle = tokio::spawn(run(self.rx, cache, coalesce));
        InvalidationLoop { handle }
    }
}

async fn run(mut rx: mpsc::UnboundedReceiver<String>, cache: Weak<ViewCache>, coalesce: Duration) {
    while let Some(first) = rx.recv().await {
        let mut batch = BTreeSet::new();
        batch.insert(first);

        if !coalesce.is_zero() {
            tokio::time::sleep(coalesce).await;
        }
        while let Ok(path) = rx.try_recv() {
            batch.insert(path);
        }

        let Some(cache) = cache.upgrade() else {
            break;
        };

        debug!(count = batch.len(), "processing template changes");
        for path in batch {
            match cache.invalidate(&path).await {
                Ok(Some(view)) => {
                    info!(path = %path, module = %view.module_name(), "template rebuilt");
                }
                Ok(None) => {
                    debug!(path = %path, "changed template was not cached");
                }
                Err(e) => {
                    error!(path = %path, kind = e.kind(), error = %e, "template rebuild failed");
                }
            }
        }
    }
    debug!("invalidation loop stopped");
}

/// Handle to the running invalidation task. Dropping it stops the task.
#[derive(Debug)]
pub struct InvalidationLoop {
    handle: JoinHandle<()>,
}

impl InvalidationLoop {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn abort(&self) {
        self.handle.abort();
    }
}

impl Drop for InvalidationLoop {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
