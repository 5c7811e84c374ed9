//! Stencil CLI - compile and render view templates
//!
//! Main entry point for the `stencil` binary.

use std::process::ExitCode;

use clap::Parser;
use tracing::error;

mod cli;
mod commands;
mod error;

use cli::Cli;
use error::CliError;
use stencil_common_config::Environment;

/// Application exit codes
#[repr(u8)]
pub enum Exit {
    Success = 0,
    GeneralError = 1,
    ConfigError = 2,
}

impl From<Exit> for ExitCode {
    fn from(exit: Exit) -> Self {
        ExitCode::from(exit as u8)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = Environment::init() {
        eprintln!("error: {e}");
        return Exit::ConfigError.into();
    }

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => return report(&e),
    };

    if let Err(e) = stencil_common_log::init(cli.log_config(&config)) {
        eprintln!("error: {e}");
        return Exit::GeneralError.into();
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("error: failed to create Tokio runtime: {e}");
            return Exit::GeneralError.into();
        }
    };

    match runtime.block_on(cli.execute(config)) {
        Ok(()) => Exit::Success.into(),
        Err(e) => {
            error!(code = e.code(), "{e}");
            report(&e)
        }
    }
}

fn report(e: &CliError) -> ExitCode {
    eprintln!("error: {e}");
    if let Some(hint) = e.hint() {
        eprintln!("hint: {hint}");
    }
    e.exit_code()
}
