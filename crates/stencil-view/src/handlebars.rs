//! Reference collaborators backed by Handlebars.
//!
//! Template markup is an optional block of `@inherits` / `@using` lines
//! followed by a Handlebars body. The translator turns it into a small
//! line-oriented module:
//!
//! ```text
//! #module View_0f3c...
//! #namespace Stencil.Generated
//! #inherits Stencil.ViewBase<Order>
//! #import Shop.Models
//! #origin text
//! ---
//! Order {{id}}
//! ```
//!
//! The compiler checks the header and resolves imports, the loader turns
//! the result into a Handlebars registry.

use dashmap::DashMap;
use handlebars::Handlebars;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, trace};

use stencil_common_config::{CompilerOptions, GenerationOptions};
use stencil_source::{Directive, DirectiveError, SourceContent};

use crate::collab::{
    CodeCompiler, CompilationError, ExecutableModule, GeneratedCode, LoadError, ModuleImage,
    ModuleLoader, ReleaseError, RenderError, Translator,
};
use crate::diagnostic::{codes, Diagnostic, Diagnostics};

const MODULE: &str = "module";
const NAMESPACE: &str = "namespace";
const INHERITS: &str = "inherits";
const IMPORT: &str = "import";
const ORIGIN: &str = "origin";
const SEPARATOR: &str = "---";

/// Content origin recorded in generated code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentOrigin {
    Stream,
    Text,
}

impl ContentOrigin {
    fn as_str(&self) -> &'static str {
        match self {
            ContentOrigin::Stream => "stream",
            ContentOrigin::Text => "text",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "stream" => Some(ContentOrigin::Stream),
            "text" => Some(ContentOrigin::Text),
            _ => None,
        }
    }
}

/// Everything the loader needs to build a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleManifest {
    pub module: String,
    pub namespace: String,
    pub inherits: String,
    #[serde(default)]
    pub imports: Vec<String>,
    pub origin: ContentOrigin,
    pub body: String,
}

/// Check a Handlebars body, shifting reported lines by `line_offset`.
fn validate_body(body: &str, line_offset: usize) -> Result<(), Diagnostic> {
    handlebars::Template::compile(body).map(|_| ()).map_err(|e| {
        let diagnostic = Diagnostic::error(codes::SYNTAX, e.reason().to_string());
        match e.pos() {
            Some((line, column)) => diagnostic.at(line + line_offset, Some(column)),
            None => diagnostic,
        }
    })
}

/// Leading directive block of a template.
#[derive(Debug, Default)]
struct Markup<'a> {
    inherits: Option<String>,
    imports: Vec<String>,
    body: &'a str,
    /// Lines before the body.
    body_line_offset: usize,
}

fn parse_markup(text: &str) -> Result<Markup<'_>, Diagnostics> {
    let mut markup = Markup::default();
    let mut diagnostics = Diagnostics::new();
    let mut seen = HashSet::new();

    let mut offset = 0;
    let mut line_no = 0;
    // Blank lines belong to the directive block only if a directive follows.
    let mut pending: Option<(usize, usize)> = None;
    let mut body_start = None;

    for line in text.split_inclusive('\n') {
        line_no += 1;
        let start = offset;
        offset += line.len();

        if line.trim().is_empty() {
            pending.get_or_insert((start, line_no - 1));
            continue;
        }

        let parsed = match Directive::parse(line) {
            Some(parsed) => parsed,
            None => {
                body_start = Some(pending.unwrap_or((start, line_no - 1)));
                break;
            }
        };
        pending = None;

        match parsed {
            Ok(Directive::Inherits(ty)) => {
                if markup.inherits.is_some() {
                    diagnostics.push(
                        Diagnostic::error(
                            codes::DUPLICATE_INHERITS,
                            "'@inherits' may only appear once",
                        )
                        .at(line_no, Some(1)),
                    );
                } else {
                    markup.inherits = Some(ty);
                }
            }
            Ok(Directive::Using(ns)) => {
                if seen.insert(ns.clone()) {
                    markup.imports.push(ns);
                }
            }
            Err(e @ DirectiveError::Unknown(_)) => {
                diagnostics
                    .push(Diagnostic::error(codes::UNKNOWN_DIRECTIVE, e.to_string()).at(line_no, Some(1)));
            }
            Err(e) => {
                diagnostics
                    .push(Diagnostic::error(codes::BAD_DIRECTIVE, e.to_string()).at(line_no, Some(1)));
            }
        }
    }

    if !diagnostics.is_empty() {
        return Err(diagnostics);
    }

    let (start, lines_before) = body_start.or(pending).unwrap_or((text.len(), line_no));
    markup.body = &text[start..];
    markup.body_line_offset = lines_before;
    Ok(markup)
}

/// Translates directive-prefixed Handlebars templates.
#[derive(Debug, Clone)]
pub struct HandlebarsTranslator {
    generation: GenerationOptions,
}

impl HandlebarsTranslator {
    pub fn new(generation: GenerationOptions) -> Self {
        Self { generation }
    }
}

impl Translator for HandlebarsTranslator {
    fn translate(
        &self,
        content: SourceContent,
        source_name: &str,
    ) -> Result<GeneratedCode, Diagnostics> {
        let origin = if content.is_stream() {
            ContentOrigin::Stream
        } else {
            ContentOrigin::Text
        };

        let bytes = content.into_bytes().map_err(|e| {
            Diagnostics::from(Diagnostic::error(codes::READ, format!("failed to read template: {}", e)))
        })?;
        let text = stencil_common_fs::decode_utf8(bytes).map_err(|e| {
            Diagnostics::from(Diagnostic::error(codes::ENCODING, format!("template is not valid UTF-8: {}", e)))
        })?;

        let markup = parse_markup(&text)?;
        validate_body(markup.body, markup.body_line_offset).map_err(Diagnostics::from)?;

        let inherits = markup
            .inherits
            .as_deref()
            .unwrap_or(&self.generation.base_type);

        let mut code = String::with_capacity(markup.body.len() + 128);
        code.push_str(&format!("#{} {}\n", MODULE, source_name));
        code.push_str(&format!("#{} {}\n", NAMESPACE, self.generation.namespace));
        code.push_str(&format!("#{} {}\n", INHERITS, inherits));
        for import in &markup.imports {
            code.push_str(&format!("#{} {}\n", IMPORT, import));
        }
        code.push_str(&format!("#{} {}\n", ORIGIN, origin.as_str()));
        code.push_str(SEPARATOR);
        code.push('\n');
        code.push_str(markup.body);

        trace!(module = %source_name, imports = markup.imports.len(), "translated template");
        Ok(GeneratedCode::new(source_name, code))
    }
}

/// Checks generated code and resolves its imports.
#[derive(Debug, Clone)]
pub struct HandlebarsCompiler {
    references: HashSet<String>,
}

impl HandlebarsCompiler {
    pub fn new(options: &CompilerOptions) -> Self {
        Self {
            references: options.references.iter().cloned().collect(),
        }
    }

    fn parse(&self, text: &str, module_name: &str) -> Result<ModuleManifest, Diagnostics> {
        let mut diagnostics = Diagnostics::new();
        let mut module = None;
        let mut namespace = None;
        let mut inherits = None;
        let mut imports = Vec::new();
        let mut origin = ContentOrigin::Text;

        let mut offset = 0;
        let mut line_no = 0;
        let mut body_start = None;

        for line in text.split_inclusive('\n') {
            line_no += 1;
            offset += line.len();
            let line = line.trim_end_matches(|c| c == '\r' || c == '\n');

            if line == SEPARATOR {
                body_start = Some(offset);
                break;
            }

            let header = line.strip_prefix('#').and_then(|rest| {
                let (key, value) = rest.split_once(' ').unwrap_or((rest, ""));
                Some((key, value.trim())).filter(|(_, v)| !v.is_empty())
            });

            match header {
                Some((MODULE, value)) => module = Some((value.to_string(), line_no)),
                Some((NAMESPACE, value)) => namespace = Some(value.to_string()),
                Some((INHERITS, value)) => inherits = Some(value.to_string()),
                Some((IMPORT, value)) => imports.push((value.to_string(), line_no)),
                Some((ORIGIN, value)) => match ContentOrigin::parse(value) {
                    Some(o) => origin = o,
                    None => diagnostics.push(
                        Diagnostic::error(codes::BAD_HEADER, format!("unknown origin '{}'", value))
                            .at(line_no, Some(1)),
                    ),
                },
                _ => diagnostics.push(
                    Diagnostic::error(codes::BAD_HEADER, format!("unrecognized header line '{}'", line))
                        .at(line_no, Some(1)),
                ),
            }
        }

        let Some(body_start) = body_start else {
            diagnostics.push(Diagnostic::error(
                codes::BAD_HEADER,
                format!("missing '{}' separator", SEPARATOR),
            ));
            return Err(diagnostics);
        };

        match &module {
            None => diagnostics.push(Diagnostic::error(codes::BAD_HEADER, "missing #module header")),
            Some((declared, line)) if declared != module_name => diagnostics.push(
                Diagnostic::error(
                    codes::MODULE_MISMATCH,
                    format!("code declares module '{}' but '{}' was requested", declared, module_name),
                )
                .at(*line, Some(1)),
            ),
            Some(_) => {}
        }

        let namespace = namespace.unwrap_or_default();
        for (import, line) in &imports {
            if !self.references.contains(import) && *import != namespace {
                diagnostics.push(
                    Diagnostic::error(
                        codes::UNRESOLVED_IMPORT,
                        format!("the namespace '{}' could not be found", import),
                    )
                    .at(*line, Some(1)),
                );
            }
        }

        let body = &text[body_start..];
        if let Err(diagnostic) = validate_body(body, line_no) {
            diagnostics.push(diagnostic);
        }

        if diagnostics.has_errors() {
            return Err(diagnostics);
        }

        Ok(ModuleManifest {
            module: module_name.to_string(),
            namespace,
            inherits: inherits.unwrap_or_default(),
            imports: imports.into_iter().map(|(i, _)| i).collect(),
            origin,
            body: body.to_string(),
        })
    }
}

impl CodeCompiler for HandlebarsCompiler {
    fn compile(
        &self,
        code: &GeneratedCode,
        module_name: &str,
    ) -> Result<ModuleImage, CompilationError> {
        let failed = |diagnostics: Diagnostics| CompilationError {
            module_name: module_name.to_string(),
            diagnostics,
            generated_code: code.text.clone(),
        };

        let manifest = self.parse(&code.text, module_name).map_err(failed)?;
        let bytes = serde_json::to_vec(&manifest).map_err(|e| {
            failed(Diagnostic::error(codes::BAD_HEADER, format!("failed to encode module: {}", e)).into())
        })?;

        Ok(ModuleImage {
            module_name: module_name.to_string(),
            bytes,
        })
    }
}

/// Record of a module loaded into the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedModule {
    pub namespace: String,
    pub base_type: String,
}

/// Process-wide table of loaded modules. Append-only: modules are never
/// unloaded individually.
#[derive(Debug, Default)]
pub struct ModuleHost {
    modules: DashMap<String, HostedModule>,
}

static GLOBAL_HOST: Lazy<Arc<ModuleHost>> = Lazy::new(|| Arc::new(ModuleHost::default()));

impl ModuleHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// The host shared by every default loader.
    pub fn global() -> Arc<ModuleHost> {
        Arc::clone(&GLOBAL_HOST)
    }

    fn record(&self, name: &str, module: HostedModule) {
        self.modules.insert(name.to_string(), module);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<HostedModule> {
        self.modules.get(name).map(|m| m.value().clone())
    }

    /// Number of modules loaded over the host's lifetime.
    pub fn loaded_count(&self) -> usize {
        self.modules.len()
    }
}

/// Builds [`HandlebarsModule`]s from compiled images.
#[derive(Debug, Clone)]
pub struct HandlebarsLoader {
    host: Arc<ModuleHost>,
}

impl HandlebarsLoader {
    /// Loader recording into the process-wide host.
    pub fn new() -> Self {
        Self::with_host(ModuleHost::global())
    }

    pub fn with_host(host: Arc<ModuleHost>) -> Self {
        Self { host }
    }

    pub fn host(&self) -> &Arc<ModuleHost> {
        &self.host
    }
}

impl Default for HandlebarsLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleLoader for HandlebarsLoader {
    fn load(&self, image: ModuleImage) -> Result<Arc<dyn ExecutableModule>, LoadError> {
        let manifest: ModuleManifest =
            serde_json::from_slice(&image.bytes).map_err(|e| LoadError::Malformed {
                module: image.module_name.clone(),
                message: e.to_string(),
            })?;

        if manifest.module != image.module_name {
            return Err(LoadError::Malformed {
                module: image.module_name,
                message: format!("image contains module '{}'", manifest.module),
            });
        }

        let mut registry = Handlebars::new();
        registry.set_strict_mode(false);
        registry.register_escape_fn(handlebars::no_escape);
        registry
            .register_template_string(&manifest.module, &manifest.body)
            .map_err(|e| LoadError::Init {
                module: manifest.module.clone(),
                message: e.to_string(),
            })?;

        self.host.record(
            &manifest.module,
            HostedModule {
                namespace: manifest.namespace.clone(),
                base_type: manifest.inherits.clone(),
            },
        );
        debug!(module = %manifest.module, loaded = self.host.loaded_count(), "module loaded");

        Ok(Arc::new(HandlebarsModule {
            name: manifest.module,
            base_type: manifest.inherits,
            imports: manifest.imports,
            registry: RwLock::new(Some(registry)),
        }))
    }
}

/// A loaded view whose disposable resource is its Handlebars registry.
pub struct HandlebarsModule {
    name: String,
    base_type: String,
    imports: Vec<String>,
    registry: RwLock<Option<Handlebars<'static>>>,
}

impl ExecutableModule for HandlebarsModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn base_type(&self) -> &str {
        &self.base_type
    }

    fn imports(&self) -> &[String] {
        &self.imports
    }

    fn render(&self, model: &serde_json::Value) -> Result<String, RenderError> {
        let registry = self.registry.read();
        let registry = registry
            .as_ref()
            .ok_or_else(|| RenderError::Released(self.name.clone()))?;
        registry
            .render(&self.name, model)
            .map_err(|e| RenderError::Template(e.to_string()))
    }

    fn release(&self) -> Result<(), ReleaseError> {
        if self.registry.write().take().is_some() {
            trace!(module = %self.name, "module released");
        }
        Ok(())
    }

    fn is_released(&self) -> bool {
        self.registry.read().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;
    use test_case::test_case;

    fn generation() -> GenerationOptions {
        GenerationOptions {
            namespace: "App.Views".into(),
            base_type: "App.ViewBase".into(),
            imports: vec![],
        }
    }

    fn compiler() -> HandlebarsCompiler {
        HandlebarsCompiler::new(&CompilerOptions {
            references: vec!["App".into(), "App.Html".into()],
        })
    }

    fn text(s: &str) -> SourceContent {
        SourceContent::Text(Arc::from(s))
    }

    fn translate(s: &str) -> Result<GeneratedCode, Diagnostics> {
        HandlebarsTranslator::new(generation()).translate(text(s), "View_test")
    }

    #[test]
    fn test_translate_emits_header() {
        let code = translate("@inherits App.ViewBase<Order>\n@using App.Html\n@using App.Html\nOrder {{id}}")
            .unwrap();
        assert_eq!(code.module_name, "View_test");
        assert_eq!(
            code.text,
            "#module View_test\n#namespace App.Views\n#inherits App.ViewBase<Order>\n#import App.Html\n#origin text\n---\nOrder {{id}}"
        );
    }

    #[test]
    fn test_translate_defaults_and_stream_origin() {
        let content = SourceContent::Stream(Box::new(Cursor::new(b"Hi {{name}}".to_vec())));
        let code = HandlebarsTranslator::new(generation())
            .translate(content, "View_x")
            .unwrap();
        assert!(code.text.contains("#inherits App.ViewBase\n"));
        assert!(code.text.contains("#origin stream\n"));
        assert!(code.text.ends_with("---\nHi {{name}}"));
    }

    #[test]
    fn test_translate_keeps_leading_blank_lines_without_directives() {
        let code = translate("\n\n{{x}}").unwrap();
        assert!(code.text.ends_with("---\n\n\n{{x}}"));
    }

    #[test]
    fn test_translate_blank_lines_inside_directive_block() {
        let code = translate("@using App\n\n@using App.Html\n{{x}}").unwrap();
        assert!(code.text.contains("#import App\n#import App.Html\n"));
        assert!(code.text.ends_with("---\n{{x}}"));
    }

    #[test_case("@layout main\n{{x}}", codes::UNKNOWN_DIRECTIVE ; "unknown directive")]
    #[test_case("@inherits A\n@inherits B\n{{x}}", codes::DUPLICATE_INHERITS ; "inherits twice")]
    #[test_case("@using\n{{x}}", codes::BAD_DIRECTIVE ; "using without namespace")]
    #[test_case("{{#if x}}open", codes::SYNTAX ; "unclosed block")]
    fn test_translate_rejects(markup: &str, code: &str) {
        let diagnostics = translate(markup).unwrap_err();
        assert!(diagnostics.has_errors());
        assert!(diagnostics.find(code).is_some(), "{}", diagnostics);
    }

    #[test]
    fn test_syntax_error_line_is_relative_to_template() {
        let diagnostics = translate("@using App\n@using App.Html\nfine\n{{#if x}}").unwrap_err();
        let syntax = diagnostics.find(codes::SYNTAX).unwrap();
        if let Some(line) = syntax.line {
            assert!(line >= 3, "{}", syntax);
        }
    }

    #[test]
    fn test_translate_rejects_invalid_utf8() {
        let content = SourceContent::Stream(Box::new(Cursor::new(vec![0xff, 0xfe])));
        let diagnostics = HandlebarsTranslator::new(generation())
            .translate(content, "View_x")
            .unwrap_err();
        assert!(diagnostics.find(codes::ENCODING).is_some());
    }

    #[test]
    fn test_compile_resolves_imports() {
        let code = translate("@using App.Html\n@using App.Views\nx").unwrap();
        let image = compiler().compile(&code, "View_test").unwrap();

        let manifest: ModuleManifest = serde_json::from_slice(&image.bytes).unwrap();
        assert_eq!(manifest.module, "View_test");
        assert_eq!(manifest.namespace, "App.Views");
        assert_eq!(manifest.imports, vec!["App.Html", "App.Views"]);
        assert_eq!(manifest.origin, ContentOrigin::Text);
        assert_eq!(manifest.body, "x");
    }

    #[test]
    fn test_compile_reports_unresolved_import() {
        let code = translate("@using Missing.Stuff\nx").unwrap();
        let err = compiler().compile(&code, "View_test").unwrap_err();

        let diagnostic = err.diagnostics.find(codes::UNRESOLVED_IMPORT).unwrap();
        assert_eq!(diagnostic.line, Some(4));
        assert!(diagnostic.message.contains("Missing.Stuff"));
        assert_eq!(err.generated_code, code.text);
    }

    #[test_case("#module View_test\n#namespace N\n#inherits B\nbody" ; "missing separator")]
    #[test_case("#namespace N\n---\nbody" ; "missing module")]
    #[test_case("#module View_other\n---\nbody" ; "module mismatch")]
    #[test_case("#module View_test\n#frobnicate yes\n---\nbody" ; "unknown header")]
    #[test_case("#module View_test\n---\n{{#each}}" ; "bad body")]
    fn test_compile_rejects(text: &str) {
        let code = GeneratedCode::new("View_test", text);
        let err = compiler().compile(&code, "View_test").unwrap_err();
        assert!(err.diagnostics.has_errors());
        assert_eq!(err.generated_code, text);
    }

    #[test]
    fn test_load_render_release() {
        let host = Arc::new(ModuleHost::new());
        let loader = HandlebarsLoader::with_host(Arc::clone(&host));

        let code = translate("@using App.Html\n<p>{{name}} & co</p>").unwrap();
        let image = compiler().compile(&code, "View_test").unwrap();
        let module = loader.load(image).unwrap();

        assert_eq!(module.name(), "View_test");
        assert_eq!(module.base_type(), "App.ViewBase");
        assert_eq!(module.imports().to_vec(), vec!["App.Html".to_string()]);
        assert!(host.contains("View_test"));
        assert_eq!(host.loaded_count(), 1);

        assert_eq!(
            module.render(&json!({"name": "Ann"})).unwrap(),
            "<p>Ann & co</p>"
        );

        module.release().unwrap();
        module.release().unwrap();
        assert!(module.is_released());
        assert_eq!(
            module.render(&json!({})),
            Err(RenderError::Released("View_test".into()))
        );
        // The host never forgets a module.
        assert!(host.contains("View_test"));
    }

    #[test]
    fn test_load_rejects_garbage() {
        let loader = HandlebarsLoader::with_host(Arc::new(ModuleHost::new()));
        let err = loader
            .load(ModuleImage {
                module_name: "View_x".into(),
                bytes: b"not json".to_vec(),
            })
            .err()
            .unwrap();
        assert!(matches!(err, LoadError::Malformed { .. }));
    }
}
