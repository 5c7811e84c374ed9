//! Watch command implementation.

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use stencil_view::ViewEngine;

use crate::cli::CommandContext;
use crate::error::CliError;

/// Compile everything and rebuild on change until interrupted
#[derive(Debug, Parser)]
pub struct WatchCommand {
    /// Skip the initial compile of every template
    #[arg(long)]
    pub lazy: bool,
}

impl WatchCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<(), CliError> {
        let engine = ViewEngine::new(ctx.config_with_watch(true))?;

        if !self.lazy {
            let outcomes = engine.check_all().await;
            let failed = outcomes.iter().filter(|(_, r)| r.is_err()).count();
            for (path, outcome) in &outcomes {
                if let Err(e) = outcome {
                    warn!(path = %path, error = %e, "initial compile failed");
                }
            }
            info!(
                compiled = outcomes.len() - failed,
                failed,
                "initial compile finished"
            );
        }

        if !ctx.quiet {
            eprintln!(
                "watching {} templates under {} (Ctrl-C to stop)",
                engine.registry().len(),
                ctx.config.sources.root.display()
            );
        }

        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl-C")?;

        let stats = engine.cache().stats();
        info!(
            compilations = stats.compilations,
            failures = stats.failures,
            evictions = stats.evictions,
            "stopping"
        );
        Ok(())
    }
}
