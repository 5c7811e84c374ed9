//! Compiled view descriptors.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::collab::{ExecutableModule, ReleaseError, RenderError};

/// One successfully compiled template.
///
/// Owned by the cache entry that holds it; callers get `Arc` clones. The
/// module's resources are released exactly once, when the entry is evicted,
/// replaced or the cache is dropped.
pub struct CompiledView {
    path: String,
    namespace: String,
    type_name: String,
    module: Arc<dyn ExecutableModule>,
    released: AtomicBool,
}

impl CompiledView {
    pub fn new(
        path: impl Into<String>,
        namespace: impl Into<String>,
        module: Arc<dyn ExecutableModule>,
    ) -> Self {
        let namespace = namespace.into();
        let type_name = format!("{}.{}", namespace, module.name());
        Self {
            path: path.into(),
            namespace,
            type_name,
            module,
            released: AtomicBool::new(false),
        }
    }

    /// Logical path of the source template.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Generation namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Fully qualified view type, `<namespace>.<module>`.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Synthetic module name.
    pub fn module_name(&self) -> &str {
        self.module.name()
    }

    pub fn module(&self) -> &Arc<dyn ExecutableModule> {
        &self.module
    }

    pub fn render(&self, model: &serde_json::Value) -> Result<String, RenderError> {
        self.module.render(model)
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Release the module. Later calls are no-ops.
    pub(crate) fn release(&self) -> Result<(), ReleaseError> {
        if self.released.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.module.release()
    }
}

impl fmt::Debug for CompiledView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledView")
            .field("path", &self.path)
            .field("type_name", &self.type_name)
            .field("released", &self.is_released())
            .finish()
    }
}
