//! Concurrent get-or-compile cache of compiled views.
//!
//! Entries live in one `RwLock`ed map: hits take the shared lock, inserts
//! and evictions take the exclusive lock briefly. The lock is never held
//! across an `.await` or a compile.
//!
//! Compiles are coordinated per key. Each registered path gets an async
//! compile slot; a miss takes the slot, checks the map again and only then
//! compiles, so concurrent misses on one key compile once while misses on
//! different keys run in parallel on the blocking pool.

use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn, Span};

use stencil_common_fs::path::normalize_logical;
use stencil_common_log::spans::{instrument_future, invalidate_span};

use crate::error::{Result, ViewError};
use crate::pipeline::CompilePipeline;
use crate::view::CompiledView;

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub compilations: u64,
    pub failures: u64,
    pub evictions: u64,
    pub entries: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct CacheStatsInner {
    hits: AtomicU64,
    misses: AtomicU64,
    compilations: AtomicU64,
    failures: AtomicU64,
    evictions: AtomicU64,
}

/// Cache of compiled views keyed by logical path.
pub struct ViewCache {
    pipeline: Arc<CompilePipeline>,
    entries: RwLock<HashMap<String, Arc<CompiledView>>>,
    slots: DashMap<String, Arc<Mutex<()>>>,
    stats: CacheStatsInner,
}

impl ViewCache {
    pub fn new(pipeline: Arc<CompilePipeline>) -> Self {
        Self {
            pipeline,
            entries: RwLock::new(HashMap::new()),
            slots: DashMap::new(),
            stats: CacheStatsInner::default(),
        }
    }

    pub fn pipeline(&self) -> &Arc<CompilePipeline> {
        &self.pipeline
    }

    /// Cached view for `path`, compiling it first if needed.
    pub async fn get_or_compile(&self, path: &str) -> Result<Arc<CompiledView>> {
        let key = normalize_logical(path);

        if let Some(view) = self.get(&key) {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            debug!(path = %key, "cache hit");
            return Ok(view);
        }

        let slot = self.slot(&key)?;
        let _guard = slot.lock().await;

        // Another caller may have compiled while we waited for the slot.
        if let Some(view) = self.get(&key) {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            debug!(path = %key, "cache hit after waiting for compile");
            return Ok(view);
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        debug!(path = %key, "cache miss");

        let view = self.compile(&key).await?;
        Ok(self.insert(key, view))
    }

    /// Evict `path` and recompile it.
    ///
    /// Returns `Ok(None)` when nothing was cached once any in-flight compile
    /// of `path` has finished. If the recompile fails the key stays absent
    /// and the error is returned.
    pub async fn invalidate(&self, path: &str) -> Result<Option<Arc<CompiledView>>> {
        let key = normalize_logical(path);
        let span = invalidate_span(&key);
        instrument_future(self.invalidate_key(key), span).await
    }

    async fn invalidate_key(&self, key: String) -> Result<Option<Arc<CompiledView>>> {
        let evicted = self.evict(&key);
        if evicted.is_none() && !self.pipeline.registry().contains(&key) {
            debug!(path = %key, "not registered, nothing to invalidate");
            return Ok(None);
        }

        let slot = self.slot(&key)?;
        let _guard = slot.lock().await;

        match evicted {
            Some(_) => {
                if let Some(view) = self.get(&key) {
                    debug!(path = %key, "already rebuilt by a concurrent lookup");
                    return Ok(Some(view));
                }
            }
            // A first compile may have been in flight with the old contents;
            // whatever it stored is stale now.
            None => {
                if self.evict(&key).is_none() {
                    debug!(path = %key, "not cached, nothing to invalidate");
                    return Ok(None);
                }
            }
        }

        let view = self.compile(&key).await?;
        Ok(Some(self.insert(key, view)))
    }

    /// Compile the given paths, reporting each outcome in order.
    pub async fn warm<I, S>(&self, paths: I) -> Vec<(String, Result<Arc<CompiledView>>)>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut outcomes = Vec::new();
        for path in paths {
            let key = normalize_logical(path.as_ref());
            let result = self.get_or_compile(&key).await;
            outcomes.push((key, result));
        }
        outcomes
    }

    /// Cached view without compiling.
    pub fn get(&self, path: &str) -> Option<Arc<CompiledView>> {
        self.entries.read().get(&normalize_logical(path)).cloned()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.read().contains_key(&normalize_logical(path))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Cached logical paths, sorted.
    pub fn cached_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.entries.read().keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Evict and release every entry. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.write();
        let count = entries.len();
        for (_, view) in entries.drain() {
            self.release(&view);
        }
        self.stats
            .evictions
            .fetch_add(count as u64, Ordering::Relaxed);
        count
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            compilations: self.stats.compilations.load(Ordering::Relaxed),
            failures: self.stats.failures.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
            entries: self.len() as u64,
        }
    }

    /// Compile slot for a registered key.
    fn slot(&self, key: &str) -> Result<Arc<Mutex<()>>> {
        if !self.pipeline.registry().contains(key) {
            return Err(ViewError::UnknownSource {
                path: key.to_string(),
            });
        }
        let slot = self.slots.entry(key.to_string()).or_default();
        Ok(Arc::clone(slot.value()))
    }

    /// Remove and release the entry for `key` under the exclusive lock.
    fn evict(&self, key: &str) -> Option<Arc<CompiledView>> {
        let evicted = {
            let mut entries = self.entries.write();
            let evicted = entries.remove(key);
            if let Some(old) = &evicted {
                self.release(old);
            }
            evicted
        };

        if let Some(old) = &evicted {
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(path = %key, module = %old.module_name(), "evicted");
        }
        evicted
    }

    async fn compile(&self, key: &str) -> Result<CompiledView> {
        let pipeline = Arc::clone(&self.pipeline);
        let path = key.to_string();
        let span = Span::current();

        let result = tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            pipeline.compile(&path)
        })
            .await
            .map_err(|e| ViewError::Worker {
                path: key.to_string(),
                message: e.to_string(),
            })
            .and_then(|result| result);

        match &result {
            Ok(_) => {
                self.stats.compilations.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                debug!(path = %key, kind = e.kind(), "compile failed");
            }
        }
        result
    }

    fn insert(&self, key: String, view: CompiledView) -> Arc<CompiledView> {
        let view = Arc::new(view);
        let mut entries = self.entries.write();
        if let Some(replaced) = entries.insert(key, Arc::clone(&view)) {
            self.release(&replaced);
        }
        view
    }

    fn release(&self, view: &CompiledView) {
        if let Err(e) = view.release() {
            warn!(path = %view.path(), error = %e, "failed to release compiled view");
        }
    }
}

impl Drop for ViewCache {
    fn drop(&mut self) {
        let entries = std::mem::take(self.entries.get_mut());
        for (_, view) in entries {
            self.release(&view);
        }
    }
}

impl std::fmt::Debug for ViewCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewCache")
            .field("entries", &self.cached_paths())
            .field("stats", &self.stats())
            .finish()
    }
}
