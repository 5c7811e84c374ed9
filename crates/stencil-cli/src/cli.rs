//! CLI argument definitions using clap derive macros.

use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand, ValueHint};

use stencil_common_config::{vars, ConfigLoader, StencilConfig};
use stencil_common_log::{LogConfig, LogFormat, LogLevel};

use crate::commands::{CheckCommand, ListCommand, RenderCommand, WatchCommand};
use crate::error::CliError;

/// Stencil - compile and render view templates
///
/// Templates are discovered under the configured root and compiled on
/// demand; `watch` keeps them up to date as files change.
#[derive(Debug, Parser)]
#[command(
    name = "stencil",
    author,
    version,
    about,
    long_about = None,
    propagate_version = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Increase verbosity level (-v, -vv, -vvv)
    #[arg(
        short,
        long,
        action = ArgAction::Count,
        global = true,
        help = "Increase verbosity level"
    )]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(
        short,
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Suppress non-error output"
    )]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(
        short,
        long,
        global = true,
        env = vars::STENCIL_CONFIG,
        value_hint = ValueHint::FilePath,
        help = "Path to configuration file"
    )]
    pub config: Option<PathBuf>,

    /// Template root, overriding `sources.root`
    #[arg(
        long,
        global = true,
        env = vars::STENCIL_ROOT,
        value_hint = ValueHint::DirPath,
        help = "Template root directory"
    )]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List registered templates
    #[command(visible_alias = "ls")]
    List(ListCommand),

    /// Compile templates and report diagnostics
    Check(CheckCommand),

    /// Compile and render one template
    Render(RenderCommand),

    /// Compile everything and rebuild on change until interrupted
    Watch(WatchCommand),
}

impl Cli {
    /// Load configuration from `--config` or `./stencil.yaml`.
    pub fn load_config(&self) -> Result<StencilConfig, CliError> {
        let mut config = match &self.config {
            Some(path) => {
                let project_dir = path.parent().unwrap_or_else(|| Path::new("."));
                ConfigLoader::new(project_dir).load_from(path)?
            }
            None => ConfigLoader::new(".").load()?,
        };

        if let Some(root) = &self.root {
            config.sources.root = root.clone();
        }

        Ok(config)
    }

    /// Logging setup: environment first, then the config file, then flags.
    pub fn log_config(&self, config: &StencilConfig) -> LogConfig {
        let mut log = LogConfig::from_env();

        if let Some(level) = config.log.level.as_deref().and_then(LogLevel::parse) {
            log.level = level;
        }
        if let Some(format) = &config.log.format {
            log.format = LogFormat::parse(format);
        }
        if let Some(file) = &config.log.file {
            log.file_path = Some(file.clone());
        }

        log.level = match self.verbose {
            0 if self.quiet => LogLevel::Error,
            0 => log.level,
            1 => LogLevel::Debug,
            _ => LogLevel::Trace,
        };
        log.source_location = log.source_location || self.verbose >= 2;
        log
    }

    /// Execute the selected command
    pub async fn execute(self, config: StencilConfig) -> Result<(), CliError> {
        let ctx = CommandContext {
            config,
            quiet: self.quiet,
            verbose: self.verbose,
        };

        match self.command {
            Command::List(cmd) => cmd.execute(&ctx).await,
            Command::Check(cmd) => cmd.execute(&ctx).await,
            Command::Render(cmd) => cmd.execute(&ctx).await,
            Command::Watch(cmd) => cmd.execute(&ctx).await,
        }
    }
}

/// Context passed to all commands
#[derive(Debug)]
pub struct CommandContext {
    pub config: StencilConfig,
    pub quiet: bool,
    pub verbose: u8,
}

impl CommandContext {
    /// Configuration with watching switched on or off.
    pub fn config_with_watch(&self, enabled: bool) -> StencilConfig {
        let mut config = self.config.clone();
        config.watch.enabled = enabled;
        config
    }
}
