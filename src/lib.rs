#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # Background Removal Pipeline
//!
//! Client-side orchestration around an external background removal engine:
//! the user selects an image, the engine produces a cutout, and either image
//! can be saved. The crate owns the parts around the engine call:
//!
//! - **Ingestion**: validate a selection and read it asynchronously
//! - **State machine**: `Idle`, `Ready`, `Processing`, `Succeeded`, `Failed`
//!   with at most one removal in flight
//! - **Stale-result handling**: a removal that finishes after the user picked
//!   another image is dropped, never shown
//! - **Display references**: every held image has exactly one live
//!   `blob:bgremove/...` reference, released when the image is replaced or
//!   the pipeline is torn down
//! - **Notifications**: exactly one success or failure message per completed
//!   removal
//! - **Export**: fire-and-forget save of the original or processed image
//!
//! The engine itself is a black box behind [`RemovalEngine`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bgremove_pipeline::{
//!     BackgroundRemovalPipeline, CommandEngine, PipelineState, RemovalReport, SelectedFile,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pipeline = BackgroundRemovalPipeline::builder()
//!     .engine(Arc::new(CommandEngine::from_command_line("rembg i - -")?))
//!     .build()?;
//!
//! pipeline.select_file(SelectedFile::open("photo.jpg").await?).await?;
//! if let RemovalReport::Succeeded(processed) = pipeline.remove_background().await {
//!     println!("cutout: {} bytes", processed.size_bytes);
//!     pipeline.export_processed(None);
//! }
//! assert_ne!(pipeline.state(), PipelineState::Processing);
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `cli` (default): command-line driver and tracing subscriber setup
//! - `tracing-json`: JSON log output for the CLI
//! - `webp-support`: accept WebP input

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod exporter;
pub mod ingest;
pub mod invoker;
pub mod notifier;
pub mod pipeline;
pub mod resources;
#[cfg(test)]
pub mod test_utils;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;

pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use engine::{CommandEngine, FnEngine, RemovalEngine};
pub use error::{PipelineError, Result};
pub use exporter::{original_export_name, DirectoryDownloadHost, DownloadHost, Exporter};
pub use ingest::{ImageIngestor, IngestedImage, SelectedFile};
pub use invoker::{RemovalInvoker, RemovalOutcome, RemovalRequest};
pub use notifier::{ConsoleNotifier, NoOpNotifier, Notifier, TracingNotifier};
pub use pipeline::{BackgroundRemovalPipeline, PipelineBuilder, RejectReason, RemovalReport};
pub use resources::{ResourceManager, ResourceStats};
pub use types::{
    DisplayRef, ImagePayload, ImageView, LastError, PayloadId, PipelineSnapshot, PipelineState,
};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat};
