//! CLI error handling.

use std::io;
use std::process::ExitCode;

use thiserror::Error;

use stencil_common_config::{ConfigError, EnvError};
use stencil_view::{EngineError, ViewError};

/// CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Env(#[from] EnvError),

    #[error("{0}")]
    Engine(#[from] EngineError),

    #[error("{0}")]
    View(#[from] ViewError),

    #[error("{message}")]
    Io {
        message: String,
        #[source]
        source: io::Error,
    },

    #[error("{message}")]
    Validation { message: String },

    #[error("{message}")]
    User {
        message: String,
        hint: Option<String>,
    },

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl CliError {
    /// Get the error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) | Self::Env(_) => "E001",
            Self::Io { .. } => "E002",
            Self::Engine(_) => "E003",
            Self::Validation { .. } => "E004",
            Self::View(ViewError::UnknownSource { .. }) => "E005",
            Self::View(_) => "E006",
            Self::User { .. } => "E010",
            Self::Other(_) => "E999",
        }
    }

    /// Numeric process status for this error
    pub fn status(&self) -> u8 {
        match self {
            Self::Config(_) | Self::Env(_) | Self::Engine(_) => 2,
            Self::Io { .. } => 3,
            Self::Validation { .. } => 5,
            Self::View(ViewError::UnknownSource { .. }) => 6,
            Self::View(_) => 5,
            Self::User { .. } | Self::Other(_) => 1,
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.status())
    }

    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::User { hint, .. } => hint.as_deref(),
            Self::View(ViewError::UnknownSource { .. }) => {
                Some("run `stencil list` to see registered templates")
            }
            Self::Config(ConfigError::NotFound { .. }) => {
                Some("pass --config or create stencil.yaml in the current directory")
            }
            _ => None,
        }
    }

    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn user_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::User {
            message: message.into(),
            hint: Some(hint.into()),
        }
    }
}

impl From<io::Error> for CliError {
    fn from(err: io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: err,
        }
    }
}
