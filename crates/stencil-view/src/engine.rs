//! Assembles sources, collaborators, cache and invalidation from one
//! configuration.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use stencil_common_config::StencilConfig;
use stencil_source::{DiskFileProvider, FileProvider, SourceError, SourceRegistry};

use crate::cache::ViewCache;
use crate::collab::{CodeCompiler, ModuleLoader, Translator};
use crate::error::{Result, ViewError};
use crate::handlebars::{HandlebarsCompiler, HandlebarsLoader, HandlebarsTranslator};
use crate::invalidation::{self, InvalidationLoop};
use crate::pipeline::CompilePipeline;
use crate::view::CompiledView;

/// Engine construction errors.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to register templates: {0}")]
    Sources(#[from] SourceError),

    #[error("file watching needs a running tokio runtime")]
    NoRuntime,
}

/// Builder for [`ViewEngine`] with replaceable collaborators.
pub struct EngineBuilder {
    config: StencilConfig,
    provider: Option<Arc<dyn FileProvider>>,
    translator: Option<Arc<dyn Translator>>,
    compiler: Option<Arc<dyn CodeCompiler>>,
    loader: Option<Arc<dyn ModuleLoader>>,
}

impl EngineBuilder {
    pub fn provider(mut self, provider: Arc<dyn FileProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    pub fn compiler(mut self, compiler: Arc<dyn CodeCompiler>) -> Self {
        self.compiler = Some(compiler);
        self
    }

    pub fn loader(mut self, loader: Arc<dyn ModuleLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Populate the registry and start watching.
    ///
    /// With watching enabled this must run inside a tokio runtime.
    pub fn build(self) -> std::result::Result<ViewEngine, EngineError> {
        let config = self.config;
        let watch = config.watch.enabled;
        if watch && tokio::runtime::Handle::try_current().is_err() {
            return Err(EngineError::NoRuntime);
        }

        let (callback, receiver) = if watch {
            let (callback, receiver) = invalidation::channel();
            (Some(callback), Some(receiver))
        } else {
            (None, None)
        };

        let provider = self
            .provider
            .unwrap_or_else(|| Arc::new(DiskFileProvider::new()));
        let registry = SourceRegistry::populate(
            &config.sources,
            &config.generation,
            provider,
            callback,
        )?;

        let translator = self
            .translator
            .unwrap_or_else(|| Arc::new(HandlebarsTranslator::new(config.generation.clone())));
        let compiler = self
            .compiler
            .unwrap_or_else(|| Arc::new(HandlebarsCompiler::new(&config.compiler)));
        let loader = self
            .loader
            .unwrap_or_else(|| Arc::new(HandlebarsLoader::new()));

        let pipeline = CompilePipeline::new(
            Arc::new(registry),
            translator,
            compiler,
            loader,
            &config.generation,
        );
        let cache = Arc::new(ViewCache::new(Arc::new(pipeline)));

        let invalidation = receiver.map(|receiver| {
            receiver.spawn(&cache, Duration::from_millis(config.watch.coalesce_ms))
        });

        info!(
            templates = cache.pipeline().registry().len(),
            watching = invalidation.is_some(),
            "view engine ready"
        );

        Ok(ViewEngine {
            config,
            cache,
            invalidation,
        })
    }
}

/// Compiles and renders templates described by a [`StencilConfig`].
pub struct ViewEngine {
    config: StencilConfig,
    cache: Arc<ViewCache>,
    invalidation: Option<InvalidationLoop>,
}

impl ViewEngine {
    /// Engine with the disk provider and the Handlebars collaborators.
    pub fn new(config: StencilConfig) -> std::result::Result<Self, EngineError> {
        Self::builder(config).build()
    }

    pub fn builder(config: StencilConfig) -> EngineBuilder {
        EngineBuilder {
            config,
            provider: None,
            translator: None,
            compiler: None,
            loader: None,
        }
    }

    pub fn config(&self) -> &StencilConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ViewCache> {
        &self.cache
    }

    pub fn registry(&self) -> &Arc<SourceRegistry> {
        self.cache.pipeline().registry()
    }

    /// Registered logical paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        self.registry().paths()
    }

    pub fn is_watching(&self) -> bool {
        self.invalidation
            .as_ref()
            .map(|l| !l.is_finished())
            .unwrap_or(false)
    }

    /// Compiled view for `path`.
    pub async fn view(&self, path: &str) -> Result<Arc<CompiledView>> {
        self.cache.get_or_compile(path).await
    }

    /// Compile `path` if needed and render it against `model`.
    pub async fn render(&self, path: &str, model: &serde_json::Value) -> Result<String> {
        let view = self.cache.get_or_compile(path).await?;
        view.render(model).map_err(|source| ViewError::Render {
            path: view.path().to_string(),
            source,
        })
    }

    /// Compile every registered template.
    pub async fn check_all(&self) -> Vec<(String, Result<Arc<CompiledView>>)> {
        self.cache.warm(self.paths()).await
    }
}

impl std::fmt::Debug for ViewEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewEngine")
            .field("cache", &self.cache)
            .field("watching", &self.is_watching())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stencil_common_config::InlineTemplate;
    use tempfile::TempDir;

    fn config(root: &std::path::Path, watch: bool) -> StencilConfig {
        let mut config = StencilConfig::default();
        config.sources.root = root.to_path_buf();
        config.watch.enabled = watch;
        config
            .sources
            .templates
            .insert("hello.hbs".into(), InlineTemplate::new("Hello {{name}}!"));
        config
    }

    #[test]
    fn test_watching_requires_runtime() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            ViewEngine::new(config(temp.path(), true)),
            Err(EngineError::NoRuntime)
        ));
        assert!(ViewEngine::new(config(temp.path(), false)).is_ok());
    }

    #[tokio::test]
    async fn test_render_inline_and_physical() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("page.hbs"), "<h1>{{title}}</h1>").unwrap();

        let engine = ViewEngine::new(config(temp.path(), true)).unwrap();
        assert!(engine.is_watching());
        assert_eq!(engine.paths(), vec!["/hello.hbs", "/page.hbs"]);

        assert_eq!(
            engine.render("/hello.hbs", &json!({"name": "Ann"})).await.unwrap(),
            "Hello Ann!"
        );
        assert_eq!(
            engine.render("page.hbs", &json!({"title": "Hi"})).await.unwrap(),
            "<h1>Hi</h1>"
        );

        let outcomes = engine.check_all().await;
        assert!(outcomes.iter().all(|(_, r)| r.is_ok()));
        assert_eq!(engine.cache().stats().compilations, 2);
    }

    #[tokio::test]
    async fn test_render_unknown() {
        let temp = TempDir::new().unwrap();
        let engine = ViewEngine::new(config(temp.path(), false)).unwrap();
        assert!(matches!(
            engine.render("/nope.hbs", &json!({})).await,
            Err(ViewError::UnknownSource { .. })
        ));
    }
}
