//! Configuration types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Root configuration, read once from `stencil.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StencilConfig {
    /// Directives woven into generated views.
    pub generation: GenerationOptions,
    /// Where templates come from.
    pub sources: TemplateSourceOptions,
    /// Reference code compiler settings.
    pub compiler: CompilerOptions,
    /// File watching.
    pub watch: WatchOptions,
    /// Logging.
    pub log: LogSettings,
}

/// Generation options shared by every compiled view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationOptions {
    /// Namespace generated view types are registered under.
    pub namespace: String,
    /// Base type every view inherits.
    pub base_type: String,
    /// Namespaces imported into every virtual template.
    pub imports: Vec<String>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            namespace: "Stencil.Generated".to_string(),
            base_type: "Stencil.ViewBase".to_string(),
            imports: Vec::new(),
        }
    }
}

/// Template source options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateSourceOptions {
    /// Physical template root, scanned recursively.
    pub root: PathBuf,
    /// Filename wildcard, matched against the file name only.
    pub pattern: String,
    /// In-memory templates keyed by name.
    pub templates: BTreeMap<String, InlineTemplate>,
}

impl Default for TemplateSourceOptions {
    fn default() -> Self {
        Self {
            root: PathBuf::from("views"),
            pattern: "*.hbs".to_string(),
            templates: BTreeMap::new(),
        }
    }
}

/// An in-memory template body with an optional declared model type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineTemplate {
    /// Raw template body.
    pub body: String,
    /// Type the view's base type is parameterized with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelType>,
}

impl InlineTemplate {
    /// Template without a declared model.
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            model: None,
        }
    }

    /// Attach a declared model type.
    pub fn with_model(mut self, model: ModelType) -> Self {
        self.model = Some(model);
        self
    }
}

/// Reference compiler options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    /// Namespaces an `@using` may resolve to.
    pub references: Vec<String>,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            references: vec!["Stencil".to_string(), "Stencil.Html".to_string()],
        }
    }
}

/// File watching options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchOptions {
    /// Arm change subscriptions on physical templates.
    pub enabled: bool,
    /// Window used to coalesce bursts of change events (ms).
    pub coalesce_ms: u64,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            coalesce_ms: 50,
        }
    }
}

/// Logging options, mapped onto `stencil-common-log` by the binary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Minimum level (`trace` .. `error`).
    pub level: Option<String>,
    /// Output format (`pretty`, `compact`, `json`).
    pub format: Option<String>,
    /// Optional log file.
    pub file: Option<PathBuf>,
}

/// A qualified type name such as `Shop.Models.Order`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModelType {
    namespace: Option<String>,
    name: String,
}

impl ModelType {
    /// Namespace part, `None` for an unqualified name.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Unqualified type name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Model type parse failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid type name '{0}'")]
pub struct InvalidTypeName(pub String);

impl FromStr for ModelType {
    type Err = InvalidTypeName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if !crate::loader::is_qualified_name(s) {
            return Err(InvalidTypeName(s.to_string()));
        }

        Ok(match s.rsplit_once('.') {
            Some((namespace, name)) => Self {
                namespace: Some(namespace.to_string()),
                name: name.to_string(),
            },
            None => Self {
                namespace: None,
                name: s.to_string(),
            },
        })
    }
}

impl TryFrom<String> for ModelType {
    type Error = InvalidTypeName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ModelType> for String {
    fn from(value: ModelType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}.{}", ns, self.name),
            None => f.write_str(&self.name),
        }
    }
}
