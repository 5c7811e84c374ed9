//! Environment variable handling.

use std::env;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Environment variable errors.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("failed to load {file}: {source}")]
    DotenvError {
        file: String,
        #[source]
        source: dotenvy::Error,
    },
}

/// Well-known variable names.
pub mod vars {
    pub const STENCIL_CONFIG: &str = "STENCIL_CONFIG";
    pub const STENCIL_ROOT: &str = "STENCIL_ROOT";
    pub const STENCIL_ENV: &str = "STENCIL_ENV";
}

/// Environment configuration.
#[derive(Debug)]
pub struct Environment {
    _guard: (),
}

impl Environment {
    /// Initialize environment from .env files in the working directory.
    pub fn init() -> Result<Self, EnvError> {
        Self::init_in(".")
    }

    /// Load `.env`, `.env.local` and `.env.<STENCIL_ENV>` from `dir`.
    ///
    /// Missing files are skipped; a file that exists but cannot be read or
    /// parsed is an error. Variables that are already set are never
    /// overridden.
    pub fn init_in(dir: impl AsRef<Path>) -> Result<Self, EnvError> {
        let dir = dir.as_ref();
        load_optional(&dir.join(".env"))?;
        load_optional(&dir.join(".env.local"))?;

        if let Ok(name) = env::var(vars::STENCIL_ENV) {
            load_optional(&dir.join(format!(".env.{}", name)))?;
        }

        Ok(Self { _guard: () })
    }
}

fn load_optional(path: &Path) -> Result<(), EnvError> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(()),
        Err(dotenvy::Error::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(EnvError::DotenvError {
            file: path.display().to_string(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_missing_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Environment::init_in(dir.path()).is_ok());
    }

    #[test]
    fn test_loads_variables_without_overriding() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(".env"),
            "STENCIL_TEST_DOTENV_LOADED=yes\nSTENCIL_TEST_DOTENV_KEPT=from-file\n",
        )
        .unwrap();
        env::set_var("STENCIL_TEST_DOTENV_KEPT", "from-process");

        Environment::init_in(dir.path()).unwrap();

        assert_eq!(env::var("STENCIL_TEST_DOTENV_LOADED").unwrap(), "yes");
        assert_eq!(env::var("STENCIL_TEST_DOTENV_KEPT").unwrap(), "from-process");
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".env"), "this is not an assignment\n").unwrap();

        let err = Environment::init_in(dir.path()).unwrap_err();
        assert!(matches!(
            &err,
            EnvError::DotenvError { source: dotenvy::Error::LineParse(..), .. }
        ));
        assert!(err.to_string().contains(".env"));
    }
}
