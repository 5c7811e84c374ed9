//! Compiled view cache for Stencil.
//!
//! Templates registered in a [`SourceRegistry`](stencil_source::SourceRegistry)
//! are compiled on demand by the [`CompilePipeline`] and kept in the
//! [`ViewCache`] until their source changes. [`ViewEngine`] wires everything
//! up from a `StencilConfig`.

pub mod cache;
pub mod collab;
pub mod diagnostic;
pub mod engine;
pub mod error;
pub mod handlebars;
pub mod invalidation;
pub mod pipeline;
pub mod view;

pub use cache::{CacheStats, ViewCache};
pub use collab::{
    CodeCompiler, CompilationError, ExecutableModule, GeneratedCode, LoadError, ModuleImage,
    ModuleLoader, ReleaseError, RenderError, Translator,
};
pub use diagnostic::{codes, Diagnostic, Diagnostics, Severity};
pub use engine::{EngineBuilder, EngineError, ViewEngine};
pub use error::{Result, ViewError};
pub use handlebars::{HandlebarsCompiler, HandlebarsLoader, HandlebarsTranslator, ModuleHost};
pub use invalidation::{ChangeReceiver, InvalidationLoop};
pub use pipeline::CompilePipeline;
pub use view::CompiledView;
