//! Check command implementation.

use clap::Parser;

use stencil_view::ViewEngine;

use crate::cli::CommandContext;
use crate::error::CliError;

/// Compile templates and report diagnostics
#[derive(Debug, Parser)]
pub struct CheckCommand {
    /// Templates to check (default: all registered)
    pub paths: Vec<String>,
}

impl CheckCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<(), CliError> {
        let engine = ViewEngine::new(ctx.config_with_watch(false))?;

        let outcomes = if self.paths.is_empty() {
            engine.check_all().await
        } else {
            engine.cache().warm(&self.paths).await
        };

        let total = outcomes.len();
        let mut failed = 0;
        for (path, outcome) in &outcomes {
            match outcome {
                Ok(view) => {
                    if ctx.verbose > 0 {
                        println!("ok    {}  {} ({})", path, view.type_name(), view.module_name());
                    } else if !ctx.quiet {
                        println!("ok    {}  {}", path, view.type_name());
                    }
                }
                Err(e) => {
                    failed += 1;
                    println!("FAIL  {}", path);
                    match e.diagnostics() {
                        Some(diagnostics) => {
                            for diagnostic in diagnostics {
                                println!("      {}", diagnostic);
                            }
                        }
                        None => println!("      {}", e),
                    }
                }
            }
        }

        if failed > 0 {
            return Err(CliError::validation(format!(
                "{} of {} templates failed to compile",
                failed, total
            )));
        }

        if !ctx.quiet {
            eprintln!("{} templates compiled", total);
        }
        Ok(())
    }
}
