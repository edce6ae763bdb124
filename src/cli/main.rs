//! Background removal pipeline CLI
//!
//! Drives one pass of the pipeline from the terminal: select a file, run the
//! external engine, save the cutout (and optionally the original).

use super::config::CliConfigBuilder;
use crate::{
    error::PipelineError,
    exporter::DirectoryDownloadHost,
    ingest::SelectedFile,
    notifier::ConsoleNotifier,
    pipeline::{BackgroundRemovalPipeline, RejectReason, RemovalReport},
    tracing_config::{init_cli_tracing, TracingFormat},
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Remove the background of an image through an external engine
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "bgremove-pipeline")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Image to process
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Engine command line; reads the image on stdin, writes the cutout to stdout
    #[arg(short, long, value_name = "COMMAND")]
    pub engine: String,

    /// Directory downloads are saved into
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// File name for the processed image [default: from config]
    #[arg(long, value_name = "NAME")]
    pub output_name: Option<String>,

    /// Also save the original image
    #[arg(long)]
    pub export_original: bool,

    /// JSON pipeline configuration file
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Engine timeout in seconds (0 = no timeout)
    #[arg(short, long, default_value_t = 120)]
    pub timeout: u64,

    /// Override the maximum accepted file size in bytes
    #[arg(long, value_name = "BYTES")]
    pub max_file_size: Option<u64>,

    /// Skip content sniffing of the input and engine output
    #[arg(long)]
    pub no_verify: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = CliLogFormat::Console)]
    pub log_format: CliLogFormat,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliLogFormat {
    Console,
    Compact,
    #[cfg(feature = "tracing-json")]
    Json,
}

impl From<CliLogFormat> for TracingFormat {
    fn from(format: CliLogFormat) -> Self {
        match format {
            CliLogFormat::Console => TracingFormat::Console,
            CliLogFormat::Compact => TracingFormat::Compact,
            #[cfg(feature = "tracing-json")]
            CliLogFormat::Json => TracingFormat::Json,
        }
    }
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_cli_tracing(cli.verbose, cli.log_format.into())
        .context("Failed to initialize tracing")?;

    run(&cli).await
}

/// Run one select/remove/export pass
pub async fn run(cli: &Cli) -> Result<()> {
    CliConfigBuilder::validate_cli(cli).context("Invalid CLI arguments")?;
    let config = CliConfigBuilder::from_cli(cli)?;
    let engine = CliConfigBuilder::engine_from_cli(cli).context("Invalid engine command")?;
    debug!(?config, engine = engine.program(), "Configuration resolved");

    let pipeline = BackgroundRemovalPipeline::builder()
        .config(config)
        .engine(Arc::new(engine))
        .notifier(Arc::new(ConsoleNotifier))
        .download_host(Arc::new(DirectoryDownloadHost::new(&cli.output_dir)))
        .build()
        .context("Failed to build pipeline")?;

    let file = SelectedFile::open(&cli.input).await?;
    let snapshot = pipeline
        .select_file(file)
        .await
        .with_context(|| format!("Cannot use '{}'", cli.input.display()))?;
    if let Some(original) = &snapshot.original {
        info!(
            "Selected {} ({}, {} bytes)",
            original.file_name, original.mime_type, original.size_bytes
        );
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("Removing background...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let start = Instant::now();
    let report = pipeline.remove_background().await;
    spinner.finish_and_clear();

    let result = match report {
        RemovalReport::Succeeded(processed) => {
            info!(
                "Background removed in {:.2}s ({} bytes)",
                start.elapsed().as_secs_f64(),
                processed.size_bytes
            );
            pipeline.export_processed(cli.output_name.as_deref());
            if cli.export_original {
                pipeline.export_original(None);
            }
            Ok(())
        },
        RemovalReport::Failed { reason } => {
            error!(%reason, "Engine failure");
            Err(PipelineError::removal_failed(reason).into())
        },
        RemovalReport::Rejected(RejectReason::NoOriginal) => {
            Err(anyhow::anyhow!("No original image was selected"))
        },
        RemovalReport::Rejected(RejectReason::AlreadyProcessing) | RemovalReport::Discarded => {
            Err(anyhow::anyhow!("Removal did not complete"))
        },
    };

    pipeline.teardown();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "bgremove-pipeline",
            "photo.jpg",
            "--engine",
            "rembg i - -",
            "-o",
            "out",
            "--export-original",
            "-vv",
        ]);
        assert_eq!(cli.input, PathBuf::from("photo.jpg"));
        assert_eq!(cli.engine, "rembg i - -");
        assert_eq!(cli.output_dir, PathBuf::from("out"));
        assert!(cli.export_original);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.timeout, 120);
        assert_eq!(cli.log_format, CliLogFormat::Console);
    }

    #[test]
    fn test_engine_is_required() {
        assert!(Cli::try_parse_from(["bgremove-pipeline", "photo.jpg"]).is_err());
    }

    #[test]
    fn test_log_format_conversion() {
        assert_eq!(TracingFormat::from(CliLogFormat::Compact), TracingFormat::Compact);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_with_cat_engine() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("photo.png");
        std::fs::write(&input, crate::test_utils::encode_test_image(4, 4, image::ImageFormat::Png))
            .unwrap();
        let out = dir.path().join("out");

        let cli = Cli::parse_from([
            "bgremove-pipeline",
            input.to_str().unwrap(),
            "--engine",
            "cat",
            "--output-dir",
            out.to_str().unwrap(),
            "--export-original",
        ]);
        run(&cli).await.unwrap();

        assert!(out.join("processed-image.png").is_file());
        assert!(out.join("original-image.png").is_file());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_reports_engine_failure() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("photo.png");
        std::fs::write(&input, crate::test_utils::encode_test_image(4, 4, image::ImageFormat::Png))
            .unwrap();

        let cli = Cli::parse_from([
            "bgremove-pipeline",
            input.to_str().unwrap(),
            "--engine",
            "false",
            "--output-dir",
            dir.path().to_str().unwrap(),
        ]);
        let err = run(&cli).await.unwrap_err();
        assert!(err.to_string().contains("Background removal failed"));
        assert!(!dir.path().join("processed-image.png").exists());
    }
}
