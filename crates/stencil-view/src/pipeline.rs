//! Drives one template through translation, compilation and loading.

use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use stencil_common_config::GenerationOptions;
use stencil_common_fs::path::normalize_logical;
use stencil_common_log::spans::{compile_span, Timer};
use stencil_source::{SourceError, SourceRegistry};

use crate::collab::{CodeCompiler, ModuleLoader, Translator};
use crate::error::{Result, ViewError};
use crate::view::CompiledView;

/// Prefix of synthetic module names.
pub const MODULE_PREFIX: &str = "View_";

/// Fresh synthetic module name. Every compile gets its own, so repeated
/// compiles of one path never collide.
pub fn synthetic_module_name() -> String {
    format!("{}{}", MODULE_PREFIX, Uuid::new_v4().simple())
}

/// The compile pipeline.
pub struct CompilePipeline {
    registry: Arc<SourceRegistry>,
    translator: Arc<dyn Translator>,
    compiler: Arc<dyn CodeCompiler>,
    loader: Arc<dyn ModuleLoader>,
    namespace: String,
}

impl CompilePipeline {
    pub fn new(
        registry: Arc<SourceRegistry>,
        translator: Arc<dyn Translator>,
        compiler: Arc<dyn CodeCompiler>,
        loader: Arc<dyn ModuleLoader>,
        generation: &GenerationOptions,
    ) -> Self {
        Self {
            registry,
            translator,
            compiler,
            loader,
            namespace: generation.namespace.clone(),
        }
    }

    pub fn registry(&self) -> &Arc<SourceRegistry> {
        &self.registry
    }

    /// Compile the template registered at `path`.
    ///
    /// Blocking: reads the source and runs every collaborator inline.
    pub fn compile(&self, path: &str) -> Result<CompiledView> {
        let path = normalize_logical(path);
        let descriptor = self
            .registry
            .lookup(&path)
            .ok_or_else(|| ViewError::UnknownSource { path: path.clone() })?;

        let module_name = synthetic_module_name();
        let span = compile_span(&path, &module_name);
        let _enter = span.enter();
        let timer = Timer::start("compile");

        let content = descriptor.open().map_err(|e| match e {
            SourceError::Read { source, .. } => ViewError::SourceRead {
                path: path.clone(),
                source,
            },
            other => ViewError::SourceRead {
                path: path.clone(),
                source: std::io::Error::new(std::io::ErrorKind::Other, other.to_string()),
            },
        })?;

        let code = self
            .translator
            .translate(content, &module_name)
            .map_err(|diagnostics| ViewError::TranslationFailure {
                path: path.clone(),
                diagnostics,
            })?;

        let image = self
            .compiler
            .compile(&code, &module_name)
            .map_err(|e| ViewError::CodeCompilationFailure {
                path: path.clone(),
                diagnostics: e.diagnostics,
                generated_code: e.generated_code,
            })?;

        let module = self
            .loader
            .load(image)
            .map_err(|e| ViewError::ModuleLoad {
                path: path.clone(),
                message: e.to_string(),
            })?;

        let view = CompiledView::new(path, self.namespace.clone(), module);
        let elapsed_ms = timer.finish();
        debug!(
            path = %view.path(),
            type_name = %view.type_name(),
            elapsed_ms = %elapsed_ms,
            "template compiled"
        );
        Ok(view)
    }
}

impl std::fmt::Debug for CompilePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilePipeline")
            .field("namespace", &self.namespace)
            .field("templates", &self.registry.len())
            .finish()
    }
}
