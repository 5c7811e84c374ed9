//! Render command implementation.

use std::io::Write;
use std::path::Path;

use clap::Parser;

use stencil_view::ViewEngine;

use crate::cli::CommandContext;
use crate::error::CliError;

/// Compile and render one template
#[derive(Debug, Parser)]
pub struct RenderCommand {
    /// Logical path of the template
    pub path: String,

    /// Model as inline JSON, or `@file` to read JSON from a file
    #[arg(short, long)]
    pub model: Option<String>,
}

impl RenderCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<(), CliError> {
        let model = match &self.model {
            Some(arg) => parse_model(arg)?,
            None => serde_json::Value::Object(Default::default()),
        };

        let engine = ViewEngine::new(ctx.config_with_watch(false))?;
        let output = engine.render(&self.path, &model).await?;

        let mut stdout = std::io::stdout().lock();
        stdout.write_all(output.as_bytes())?;
        if !output.ends_with('\n') {
            stdout.write_all(b"\n")?;
        }
        stdout.flush()?;
        Ok(())
    }
}

/// Parse `--model`: inline JSON or `@path`.
pub fn parse_model(arg: &str) -> Result<serde_json::Value, CliError> {
    let (text, source) = match arg.strip_prefix('@') {
        Some(file) => {
            let text = std::fs::read_to_string(Path::new(file))
                .map_err(|e| CliError::io(format!("failed to read model file {}", file), e))?;
            (text, file)
        }
        None => (arg.to_string(), "--model"),
    };

    serde_json::from_str(&text).map_err(|e| {
        CliError::user_with_hint(
            format!("invalid model JSON in {}: {}", source, e),
            "pass inline JSON or @path/to/model.json",
        )
    })
}
