//! List command implementation.

use clap::Parser;

use stencil_source::SourceKind;
use stencil_view::ViewEngine;

use crate::cli::CommandContext;
use crate::error::CliError;

/// List registered templates
#[derive(Debug, Parser)]
pub struct ListCommand {
    /// Also print the backing file of physical templates
    #[arg(short, long)]
    pub long: bool,
}

impl ListCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<(), CliError> {
        let engine = ViewEngine::new(ctx.config_with_watch(false))?;
        let registry = engine.registry();

        for path in registry.paths() {
            let Some(descriptor) = registry.lookup(&path) else {
                continue;
            };
            match (self.long, descriptor.file()) {
                (true, Some(file)) => {
                    println!("{:<9} {}  {}", descriptor.kind(), path, file.display())
                }
                _ => println!("{:<9} {}", descriptor.kind(), path),
            }
        }

        if !ctx.quiet {
            let physical = registry
                .paths()
                .iter()
                .filter_map(|p| registry.lookup(p))
                .filter(|d| d.kind() == SourceKind::Physical)
                .count();
            eprintln!(
                "{} templates ({} physical, {} in-memory) under {}",
                registry.len(),
                physical,
                registry.len() - physical,
                ctx.config.sources.root.display()
            );
        }
        Ok(())
    }
}
