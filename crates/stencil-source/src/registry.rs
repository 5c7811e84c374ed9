//! Logical path to source descriptor lookup.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use stencil_common_config::{GenerationOptions, TemplateSourceOptions};
use stencil_common_fs::path::{logical_path, normalize_logical};

use crate::descriptor::{SourceDescriptor, SourceKind};
use crate::directive::compose;
use crate::provider::{ChangeCallback, FileProvider};
use crate::SourceError;

/// The single place templates are registered and discovered.
#[derive(Default)]
pub struct SourceRegistry {
    sources: RwLock<HashMap<String, Arc<SourceDescriptor>>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan the physical root and register the configured in-memory
    /// templates.
    ///
    /// When `on_change` is given every physical descriptor is armed with a
    /// change subscription that reports its logical path.
    pub fn populate(
        options: &TemplateSourceOptions,
        generation: &GenerationOptions,
        provider: Arc<dyn FileProvider>,
        on_change: Option<ChangeCallback>,
    ) -> Result<Self, SourceError> {
        let registry = Self::new();
        let root = &options.root;

        if root.is_dir() {
            for file in provider.list(root, &options.pattern)? {
                let Some(path) = logical_path(root, &file) else {
                    continue;
                };

                let subscription = match &on_change {
                    Some(callback) => {
                        Some(provider.watch(root, &file, &path, Arc::clone(callback))?)
                    }
                    None => None,
                };

                debug!(path = %path, file = %file.display(), "registering physical template");
                registry.register(SourceDescriptor::physical(
                    path,
                    file,
                    Arc::clone(&provider),
                    subscription,
                ));
            }
        } else {
            warn!(root = %root.display(), "template root does not exist, no physical templates registered");
        }

        for (name, template) in &options.templates {
            let path = normalize_logical(name);
            let content = compose(&template.body, template.model.as_ref(), generation);

            if let Some(replaced) = registry.register(SourceDescriptor::inline(path.clone(), content)) {
                if replaced.kind() == SourceKind::Physical {
                    warn!(path = %path, "in-memory template shadows physical file");
                }
            }
            debug!(path = %path, "registering in-memory template");
        }

        info!(
            templates = registry.len(),
            root = %root.display(),
            "template registry populated"
        );
        Ok(registry)
    }

    /// Add or replace the descriptor for its logical path, returning the
    /// replaced one.
    pub fn register(&self, descriptor: SourceDescriptor) -> Option<Arc<SourceDescriptor>> {
        let key = normalize_logical(descriptor.path());
        self.sources.write().insert(key, Arc::new(descriptor))
    }

    /// Descriptor for `path`, in any separator style.
    pub fn lookup(&self, path: &str) -> Option<Arc<SourceDescriptor>> {
        self.sources.read().get(&normalize_logical(path)).cloned()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.sources.read().contains_key(&normalize_logical(path))
    }

    /// Registered logical paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.sources.read().keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.sources.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.read().is_empty()
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("paths", &self.paths())
            .finish()
    }
}
