//! Common fixtures and collaborator doubles for cache tests.

#![allow(dead_code)]

use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use stencil_common_config::{CompilerOptions, GenerationOptions, TemplateSourceOptions};
use stencil_source::{DiskFileProvider, SourceContent, SourceRegistry};
use stencil_view::{
    CodeCompiler, CompilationError, CompilePipeline, Diagnostics, GeneratedCode,
    HandlebarsCompiler, HandlebarsLoader, HandlebarsTranslator, ModuleHost, ModuleImage,
    Translator, ViewCache,
};
use tempfile::{tempdir, TempDir};

/// Translator that counts calls and can stall after reading its input.
pub struct CountingTranslator {
    inner: HandlebarsTranslator,
    calls: AtomicUsize,
    delay: Duration,
}

impl CountingTranslator {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: HandlebarsTranslator::new(GenerationOptions::default()),
            calls: AtomicUsize::new(0),
            delay,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Translator for CountingTranslator {
    fn translate(
        &self,
        content: SourceContent,
        source_name: &str,
    ) -> Result<GeneratedCode, Diagnostics> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.delay.is_zero() {
            return self.inner.translate(content, source_name);
        }

        // Read first, then stall, so a file edited during the stall is not
        // seen by this compile.
        let content = match content {
            SourceContent::Stream(reader) => {
                let bytes = SourceContent::Stream(reader)
                    .into_bytes()
                    .expect("Failed to read template");
                SourceContent::Stream(Box::new(Cursor::new(bytes)))
            }
            text => text,
        };
        std::thread::sleep(self.delay);
        self.inner.translate(content, source_name)
    }
}

/// Compiler that counts calls before delegating.
pub struct CountingCompiler {
    inner: HandlebarsCompiler,
    calls: AtomicUsize,
}

impl CountingCompiler {
    pub fn new() -> Self {
        Self {
            inner: HandlebarsCompiler::new(&CompilerOptions::default()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CodeCompiler for CountingCompiler {
    fn compile(
        &self,
        code: &GeneratedCode,
        module_name: &str,
    ) -> Result<ModuleImage, CompilationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.compile(code, module_name)
    }
}

/// A template tree on disk with a cache over it.
pub struct TestContext {
    pub temp_dir: TempDir,
    pub cache: Arc<ViewCache>,
    pub translator: Arc<CountingTranslator>,
    pub compiler: Arc<CountingCompiler>,
    pub host: Arc<ModuleHost>,
}

impl TestContext {
    pub fn new(files: &[(&str, &str)]) -> Self {
        Self::with_delay(files, Duration::ZERO)
    }

    pub fn with_delay(files: &[(&str, &str)], delay: Duration) -> Self {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        for (relative, contents) in files {
            write_file(temp_dir.path(), relative, contents);
        }

        let options = TemplateSourceOptions {
            root: temp_dir.path().to_path_buf(),
            pattern: "*.tmpl".to_string(),
            ..Default::default()
        };
        let generation = GenerationOptions::default();
        let registry = SourceRegistry::populate(
            &options,
            &generation,
            Arc::new(DiskFileProvider::new()),
            None,
        )
        .expect("Failed to populate registry");

        let translator = Arc::new(CountingTranslator::new(delay));
        let compiler = Arc::new(CountingCompiler::new());
        let host = Arc::new(ModuleHost::new());
        let pipeline = CompilePipeline::new(
            Arc::new(registry),
            translator.clone(),
            compiler.clone(),
            Arc::new(HandlebarsLoader::with_host(host.clone())),
            &generation,
        );

        Self {
            temp_dir,
            cache: Arc::new(ViewCache::new(Arc::new(pipeline))),
            translator,
            compiler,
            host,
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Overwrite a template file.
    pub fn write(&self, relative: &str, contents: &str) {
        write_file(self.path(), relative, contents);
    }

    /// Number of pipeline runs that reached the translator.
    pub fn compiles(&self) -> usize {
        self.translator.calls()
    }
}

pub fn write_file(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().expect("file has a parent")).expect("Failed to create dir");
    fs::write(path, contents).expect("Failed to write template");
}
