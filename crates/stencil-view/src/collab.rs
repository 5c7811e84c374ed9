//! Collaborator contracts of the compile pipeline.
//!
//! A template goes through three collaborators in order:
//!
//! 1. [`Translator`]: template markup to [`GeneratedCode`].
//! 2. [`CodeCompiler`]: generated code to a [`ModuleImage`].
//! 3. [`ModuleLoader`]: image to a live [`ExecutableModule`].
//!
//! The reference implementations live in [`crate::handlebars`].

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use stencil_source::SourceContent;

use crate::diagnostic::Diagnostics;

/// Code emitted by a translator for one template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCode {
    /// Synthetic module the code declares.
    pub module_name: String,
    /// Code text.
    pub text: String,
}

impl GeneratedCode {
    pub fn new(module_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            text: text.into(),
        }
    }
}

impl fmt::Display for GeneratedCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// In-memory compiled module, ready for loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleImage {
    pub module_name: String,
    pub bytes: Vec<u8>,
}

/// Unsuccessful code compilation.
#[derive(Debug, Clone, Error)]
#[error("compilation of {module_name} failed with {} error(s)", diagnostics.error_count())]
pub struct CompilationError {
    pub module_name: String,
    /// Every diagnostic the compiler produced, warnings included.
    pub diagnostics: Diagnostics,
    /// The code text that failed to compile.
    pub generated_code: String,
}

/// Module loading failure.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("malformed module image {module}: {message}")]
    Malformed { module: String, message: String },

    #[error("module {module} could not be initialized: {message}")]
    Init { module: String, message: String },
}

/// Rendering failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("module {0} has been released")]
    Released(String),

    #[error("render failed: {0}")]
    Template(String),
}

/// Failure to release a module's resources.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to release module {module}: {message}")]
pub struct ReleaseError {
    pub module: String,
    pub message: String,
}

/// Turns template markup into generated code.
pub trait Translator: Send + Sync {
    /// Translate `content`, declaring the module `source_name`.
    fn translate(&self, content: SourceContent, source_name: &str)
        -> Result<GeneratedCode, Diagnostics>;
}

/// Compiles generated code into a loadable image.
pub trait CodeCompiler: Send + Sync {
    fn compile(&self, code: &GeneratedCode, module_name: &str)
        -> Result<ModuleImage, CompilationError>;
}

/// Loads an image into the running process.
pub trait ModuleLoader: Send + Sync {
    fn load(&self, image: ModuleImage) -> Result<Arc<dyn ExecutableModule>, LoadError>;
}

/// A loaded, executable view module.
pub trait ExecutableModule: Send + Sync {
    /// Synthetic module name.
    fn name(&self) -> &str;

    /// Type the view inherits.
    fn base_type(&self) -> &str;

    /// Namespaces imported by the view.
    fn imports(&self) -> &[String];

    /// Render the view against `model`.
    fn render(&self, model: &serde_json::Value) -> Result<String, RenderError>;

    /// Release disposable resources. Rendering fails afterwards.
    fn release(&self) -> Result<(), ReleaseError>;

    fn is_released(&self) -> bool;
}

impl fmt::Debug for dyn ExecutableModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutableModule")
            .field("name", &self.name())
            .field("base_type", &self.base_type())
            .field("released", &self.is_released())
            .finish()
    }
}
