//! Conversion of CLI arguments into pipeline configuration

use crate::cli::main_impl::Cli;
use crate::{config::PipelineConfig, engine::CommandEngine};
use anyhow::{Context, Result};
use std::time::Duration;

pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Load the JSON config (if given) and apply argument overrides
    pub(crate) fn from_cli(cli: &Cli) -> Result<PipelineConfig> {
        let mut config = match &cli.config {
            Some(path) => PipelineConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        if let Some(max) = cli.max_file_size {
            config.max_file_size_bytes = max;
        }
        if cli.no_verify {
            config.verify_image_content = false;
        }

        config.validate().context("Invalid pipeline configuration")?;
        Ok(config)
    }

    /// Build the external engine from `--engine` and `--timeout`
    pub(crate) fn engine_from_cli(cli: &Cli) -> Result<CommandEngine> {
        let engine = CommandEngine::from_command_line(&cli.engine)?;
        Ok(match cli.timeout {
            0 => engine,
            secs => engine.timeout(Duration::from_secs(secs)),
        })
    }

    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        if !cli.input.is_file() {
            anyhow::bail!("Input '{}' is not a file", cli.input.display());
        }
        if cli.output_dir.is_file() {
            anyhow::bail!(
                "Output directory '{}' is an existing file",
                cli.output_dir.display()
            );
        }
        if cli.max_file_size == Some(0) {
            anyhow::bail!("--max-file-size must be greater than zero");
        }
        Ok(())
    }
}
