//! Configuration file loading and parsing.

use crate::types::StencilConfig;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default configuration file name.
pub const CONFIG_FILE: &str = "stencil.yaml";

static ENV_VAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}").expect("env var pattern"));

static QUALIFIED_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$").expect("name pattern")
});

/// Whether `name` is a dotted identifier like `Stencil.Html`.
pub fn is_qualified_name(name: &str) -> bool {
    QUALIFIED_NAME.is_match(name)
}

/// Config loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("failed to read config: {source}")]
    ReadError {
        #[from]
        source: std::io::Error,
    },

    #[error("invalid YAML at line {}: {message}", line.map(|l| l.to_string()).unwrap_or_else(|| "unknown".to_string()))]
    ParseError { line: Option<usize>, message: String },

    #[error("validation error: {message}")]
    ValidationError { message: String },

    #[error("environment variable not found: {var}")]
    EnvVarNotFound { var: String },
}

/// Configuration loader.
pub struct ConfigLoader {
    base_path: PathBuf,
}

impl ConfigLoader {
    /// Create a loader for the given project directory.
    pub fn new(project_dir: impl AsRef<Path>) -> Self {
        Self {
            base_path: project_dir.as_ref().to_path_buf(),
        }
    }

    /// Load `stencil.yaml` from the project directory, or defaults if absent.
    pub fn load(&self) -> Result<StencilConfig, ConfigError> {
        let config_path = self.base_path.join(CONFIG_FILE);

        if !config_path.exists() {
            let mut config = StencilConfig::default();
            self.resolve_root(&mut config, &self.base_path);
            return Ok(config);
        }

        self.load_from(&config_path)
    }

    /// Load an explicit configuration file. The file must exist.
    pub fn load_from(&self, path: impl AsRef<Path>) -> Result<StencilConfig, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let contents = std::fs::read_to_string(path)?;
        let mut config = self.parse(&contents)?;

        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(&self.base_path);
        self.resolve_root(&mut config, dir);

        Ok(config)
    }

    /// Parse and validate YAML text, expanding `${VAR}` references first.
    pub fn parse(&self, contents: &str) -> Result<StencilConfig, ConfigError> {
        let expanded = self.expand_env_vars(contents)?;

        let config: StencilConfig =
            serde_yaml::from_str(&expanded).map_err(|e| ConfigError::ParseError {
                line: e.location().map(|l| l.line()),
                message: e.to_string(),
            })?;

        self.validate(&config)?;
        Ok(config)
    }

    fn resolve_root(&self, config: &mut StencilConfig, dir: &Path) {
        if config.sources.root.is_relative() {
            config.sources.root = dir.join(&config.sources.root);
        }
    }

    /// Expand environment variables in the form `${VAR}` or `${VAR:-default}`.
    fn expand_env_vars(&self, content: &str) -> Result<String, ConfigError> {
        let mut result = content.to_string();

        for cap in ENV_VAR.captures_iter(content) {
            let full_match = &cap[0];
            let var_name = &cap[1];
            let default = cap.get(2).map(|m| m.as_str());

            let value = match std::env::var(var_name) {
                Ok(v) => v,
                Err(_) => match default {
                    Some(d) => d.to_string(),
                    None => {
                        return Err(ConfigError::EnvVarNotFound {
                            var: var_name.to_string(),
                        })
                    }
                },
            };

            result = result.replace(full_match, &value);
        }

        Ok(result)
    }

    /// Validate configuration values.
    fn validate(&self, config: &StencilConfig) -> Result<(), ConfigError> {
        let generation = &config.generation;

        if !is_qualified_name(&generation.namespace) {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "generation.namespace must be a dotted identifier, got '{}'",
                    generation.namespace
                ),
            });
        }

        if generation.base_type.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                message: "generation.base_type must not be empty".to_string(),
            });
        }

        for import in &generation.imports {
            if !is_qualified_name(import) {
                return Err(ConfigError::ValidationError {
                    message: format!("generation.imports: invalid namespace '{}'", import),
                });
            }
        }

        for reference in &config.compiler.references {
            if !is_qualified_name(reference) {
                return Err(ConfigError::ValidationError {
                    message: format!("compiler.references: invalid namespace '{}'", reference),
                });
            }
        }

        if let Err(e) = glob::Pattern::new(&config.sources.pattern) {
            return Err(ConfigError::ValidationError {
                message: format!("sources.pattern '{}': {}", config.sources.pattern, e),
            });
        }

        if config.sources.templates.keys().any(|name| name.trim().is_empty()) {
            return Err(ConfigError::ValidationError {
                message: "sources.templates: template names must not be empty".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{InlineTemplate, ModelType};
    use std::fs;
    use tempfile::tempdir;
    use test_case::test_case;

    #[test]
    fn test_load_defaults_when_no_file() {
        let dir = tempdir().unwrap();
        let loader = ConfigLoader::new(dir.path());
        let config = loader.load().unwrap();
        assert_eq!(config.generation.namespace, "Stencil.Generated");
        assert_eq!(config.sources.root, dir.path().join("views"));
    }

    #[test]
    fn test_load_config_from_yaml_file() {
        let dir = tempdir().unwrap();

        let config_content = r#"
generation:
  namespace: Shop.Views
  base_type: Shop.PageBase
  imports:
    - Shop.Html
    - Shop.Formatting
sources:
  root: templates
  pattern: "*.tmpl"
  templates:
    banner.tmpl:
      body: "<b>{{title}}</b>"
    order.tmpl:
      body: "Order {{id}}"
      model: Shop.Models.Order
compiler:
  references: [Shop.Html, Shop.Formatting, Shop.Models]
watch:
  enabled: false
"#;

        fs::write(dir.path().join(CONFIG_FILE), config_content).unwrap();

        let config = ConfigLoader::new(dir.path()).load().unwrap();

        assert_eq!(config.generation.namespace, "Shop.Views");
        assert_eq!(config.generation.base_type, "Shop.PageBase");
        assert_eq!(config.generation.imports, vec!["Shop.Html", "Shop.Formatting"]);
        assert_eq!(config.sources.root, dir.path().join("templates"));
        assert_eq!(config.sources.pattern, "*.tmpl");
        assert_eq!(
            config.sources.templates["banner.tmpl"],
            InlineTemplate::new("<b>{{title}}</b>")
        );
        let order = &config.sources.templates["order.tmpl"];
        assert_eq!(order.model, Some("Shop.Models.Order".parse::<ModelType>().unwrap()));
        assert_eq!(config.compiler.references.len(), 3);
        assert!(!config.watch.enabled);
        assert_eq!(config.watch.coalesce_ms, 50);
    }

    #[test]
    fn test_load_from_missing_file() {
        let dir = tempdir().unwrap();
        let loader = ConfigLoader::new(dir.path());
        let result = loader.load_from(dir.path().join("nope.yaml"));
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));
    }

    #[test]
    fn test_absolute_root_is_kept() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("elsewhere");
        let yaml = format!("sources:\n  root: {}\n", root.display());
        fs::write(dir.path().join(CONFIG_FILE), yaml).unwrap();

        let config = ConfigLoader::new(dir.path()).load().unwrap();
        assert_eq!(config.sources.root, root);
    }

    #[test]
    fn test_env_var_expansion() {
        std::env::set_var("STENCIL_TEST_NS", "Expanded.Views");
        let loader = ConfigLoader::new(".");
        let result = loader.expand_env_vars("namespace: ${STENCIL_TEST_NS}").unwrap();
        assert_eq!(result, "namespace: Expanded.Views");
        std::env::remove_var("STENCIL_TEST_NS");
    }

    #[test]
    fn test_env_var_default() {
        let loader = ConfigLoader::new(".");
        let result = loader
            .expand_env_vars("pattern: ${STENCIL_NONEXISTENT:-*.hbs}")
            .unwrap();
        assert_eq!(result, "pattern: *.hbs");
    }

    #[test]
    fn test_env_var_missing_error() {
        let loader = ConfigLoader::new(".");
        match loader.expand_env_vars("root: ${STENCIL_MISSING_VAR}") {
            Err(ConfigError::EnvVarNotFound { var }) => assert_eq!(var, "STENCIL_MISSING_VAR"),
            other => panic!("Expected EnvVarNotFound error, got {:?}", other),
        }
    }

    #[test_case("generation:\n  namespace: \"not a namespace\"\n", "generation.namespace" ; "bad namespace")]
    #[test_case("generation:\n  base_type: \"  \"\n", "generation.base_type" ; "empty base type")]
    #[test_case("generation:\n  imports: [\"Good\", \"bad-one\"]\n", "generation.imports" ; "bad import")]
    #[test_case("compiler:\n  references: [\"9Lives\"]\n", "compiler.references" ; "bad reference")]
    #[test_case("sources:\n  pattern: \"[\"\n", "sources.pattern" ; "bad glob")]
    fn test_validation_errors(yaml: &str, expected: &str) {
        let loader = ConfigLoader::new(".");
        match loader.parse(yaml) {
            Err(ConfigError::ValidationError { message }) => {
                assert!(message.contains(expected), "{}", message)
            }
            other => panic!("Expected ValidationError, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_model_type_is_parse_error() {
        let yaml = r#"
sources:
  templates:
    a.hbs:
      body: hi
      model: "Shop..Order"
"#;
        let loader = ConfigLoader::new(".");
        assert!(matches!(loader.parse(yaml), Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_parse_error_with_line_number() {
        let bad_yaml = r#"
generation:
  namespace: Stencil.Generated
  imports: [unclosed
"#;
        let loader = ConfigLoader::new(".");
        match loader.parse(bad_yaml) {
            Err(ConfigError::ParseError { line, .. }) => assert!(line.is_some()),
            other => panic!("Expected ParseError with line number, got {:?}", other),
        }
    }

    #[test_case("Stencil", true ; "single segment")]
    #[test_case("Stencil.Html", true ; "dotted")]
    #[test_case("_private.V2", true ; "underscore and digits")]
    #[test_case("", false ; "empty")]
    #[test_case("Stencil.", false ; "trailing dot")]
    #[test_case("Stencil..Html", false ; "empty segment")]
    #[test_case("2fast", false ; "leading digit")]
    fn test_is_qualified_name(name: &str, expected: bool) {
        assert_eq!(is_qualified_name(name), expected);
    }
}
