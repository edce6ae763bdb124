//! Client-side save of live resources
//!
//! Exporting is fire-and-forget: the [`Exporter`] resolves a live reference
//! and hands it to the host's [`DownloadHost`]. Nothing it does can change
//! pipeline state, and host failures are only logged.

use crate::{
    error::PipelineError,
    resources::ResourceManager,
    types::DisplayRef,
};
use image::ImageFormat;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Host-provided save-to-disk action
pub trait DownloadHost: Send + Sync {
    /// Save `data` (the bytes behind `display_ref`) under `filename`
    ///
    /// # Errors
    /// Host-level failures such as missing permissions.
    fn save(
        &self,
        display_ref: &DisplayRef,
        data: &[u8],
        mime_type: &str,
        filename: &str,
    ) -> anyhow::Result<()>;
}

/// Saves downloads into a directory, creating it when missing
#[derive(Debug, Clone)]
pub struct DirectoryDownloadHost {
    directory: PathBuf,
}

impl DirectoryDownloadHost {
    pub fn new<P: Into<PathBuf>>(directory: P) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl DownloadHost for DirectoryDownloadHost {
    fn save(
        &self,
        display_ref: &DisplayRef,
        data: &[u8],
        _mime_type: &str,
        filename: &str,
    ) -> anyhow::Result<()> {
        // Only the final component is honoured, like a browser download attribute
        let name = Path::new(filename)
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("'{}' is not a usable file name", filename))?;

        std::fs::create_dir_all(&self.directory).map_err(|e| {
            PipelineError::file_io_error("create download directory", &self.directory, &e)
        })?;

        let target = self.directory.join(name);
        std::fs::write(&target, data)
            .map_err(|e| PipelineError::file_io_error("write download", &target, &e))?;

        debug!(
            display_ref = %display_ref,
            path = %target.display(),
            bytes = data.len(),
            "Download written"
        );
        Ok(())
    }
}

/// Build the default export name for an original: `<stem>.<ext>`, where the
/// extension follows the MIME type (`bin` when unknown)
#[must_use]
pub fn original_export_name(stem: &str, mime_type: &str) -> String {
    let extension = ImageFormat::from_mime_type(mime_type)
        .and_then(|format| format.extensions_str().first().copied())
        .unwrap_or("bin");
    format!("{}.{}", stem, extension)
}

/// Triggers saves of live resources through a [`DownloadHost`]
#[derive(Clone)]
pub struct Exporter {
    resources: Arc<ResourceManager>,
    host: Arc<dyn DownloadHost>,
}

impl Exporter {
    pub fn new(resources: Arc<ResourceManager>, host: Arc<dyn DownloadHost>) -> Self {
        Self { resources, host }
    }

    /// Save the resource behind `display_ref` as `filename`.
    ///
    /// A reference that is no longer live is ignored with a warning.
    pub fn export_resource(&self, display_ref: &DisplayRef, filename: &str) {
        let Some((bytes, mime_type)) = self.resources.resolve(display_ref) else {
            warn!(display_ref = %display_ref, filename, "Export requested for a released reference");
            return;
        };

        match self.host.save(display_ref, &bytes, &mime_type, filename) {
            Ok(()) => info!(filename, bytes = bytes.len(), "Export handed to download host"),
            Err(e) => warn!(filename, error = %format!("{:#}", e), "Download host failed"),
        }
    }
}

impl std::fmt::Debug for Exporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exporter").finish_non_exhaustive()
    }
}
