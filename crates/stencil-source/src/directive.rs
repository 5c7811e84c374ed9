//! Generation directives and the composer that weaves them into templates.
//!
//! A directive is one line at the top of a template:
//!
//! ```text
//! @inherits Stencil.ViewBase<Order>
//! @using Shop.Models
//! ```

use std::fmt;

use stencil_common_config::{is_qualified_name, GenerationOptions, ModelType};

/// Keyword of the inheritance directive.
pub const INHERITS: &str = "inherits";
/// Keyword of the import directive.
pub const USING: &str = "using";

/// A parsed directive line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// `@inherits <type>`
    Inherits(String),
    /// `@using <namespace>`
    Using(String),
}

/// Why a directive line was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectiveError {
    #[error("unknown directive '@{0}'")]
    Unknown(String),

    #[error("'@{0}' requires an argument")]
    MissingArgument(&'static str),

    #[error("'{0}' is not a valid namespace")]
    InvalidNamespace(String),
}

impl Directive {
    /// Parse one line.
    ///
    /// Returns `None` when the line is not shaped like a directive (`@`
    /// followed by a keyword), so callers can treat it as body text.
    pub fn parse(line: &str) -> Option<Result<Self, DirectiveError>> {
        let rest = line.trim().strip_prefix('@')?;
        let keyword_len = rest
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(rest.len());
        if keyword_len == 0 {
            return None;
        }

        let (keyword, argument) = rest.split_at(keyword_len);
        if !argument.is_empty() && !argument.starts_with(char::is_whitespace) {
            return None;
        }
        let argument = argument.trim();

        Some(match keyword {
            INHERITS if argument.is_empty() => Err(DirectiveError::MissingArgument(INHERITS)),
            INHERITS => Ok(Directive::Inherits(argument.to_string())),
            USING if argument.is_empty() => Err(DirectiveError::MissingArgument(USING)),
            USING if !is_qualified_name(argument) => {
                Err(DirectiveError::InvalidNamespace(argument.to_string()))
            }
            USING => Ok(Directive::Using(argument.to_string())),
            other => Err(DirectiveError::Unknown(other.to_string())),
        })
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::Inherits(ty) => write!(f, "@{} {}", INHERITS, ty),
            Directive::Using(ns) => write!(f, "@{} {}", USING, ns),
        }
    }
}

/// Prepend generation directives to a virtual template body.
///
/// Output order: the inheritance directive (parameterized with the declared
/// model, followed by an import of the model's namespace when it has one),
/// then one import per configured namespace, then `body` verbatim. Each
/// directive is a single `\n`-terminated line.
pub fn compose(body: &str, declared: Option<&ModelType>, generation: &GenerationOptions) -> String {
    let mut directives = Vec::with_capacity(generation.imports.len() + 2);

    match declared {
        Some(model) => {
            directives.push(Directive::Inherits(format!(
                "{}<{}>",
                generation.base_type,
                model.name()
            )));
            if let Some(ns) = model.namespace() {
                directives.push(Directive::Using(ns.to_string()));
            }
        }
        None => directives.push(Directive::Inherits(generation.base_type.clone())),
    }

    directives.extend(generation.imports.iter().cloned().map(Directive::Using));

    let mut composed = String::with_capacity(body.len() + directives.len() * 32);
    for directive in &directives {
        composed.push_str(&directive.to_string());
        composed.push('\n');
    }
    composed.push_str(body);
    composed
}
