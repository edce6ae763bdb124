//! Image ingestion
//!
//! Turns a user selection into validated bytes the pipeline can wrap. Reading
//! is asynchronous: nothing is resident until the read completes.

use crate::{
    config::PipelineConfig,
    error::{PipelineError, Result},
};
use image::ImageFormat;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, instrument};

/// MIME type reported when a path has no recognisable image extension
const UNKNOWN_MIME_TYPE: &str = "application/octet-stream";

/// A file handed over by the selection surface: name, declared type and a byte source
pub struct SelectedFile {
    name: String,
    mime_type: String,
    source: Box<dyn AsyncRead + Send + Unpin>,
}

impl SelectedFile {
    /// Wrap any async byte source
    pub fn new<N, M, R>(name: N, mime_type: M, source: R) -> Self
    where
        N: Into<String>,
        M: Into<String>,
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            source: Box::new(source),
        }
    }

    /// Selection backed by bytes already in memory
    pub fn from_bytes<N: Into<String>, M: Into<String>>(
        name: N,
        mime_type: M,
        bytes: Vec<u8>,
    ) -> Self {
        Self::new(name, mime_type, std::io::Cursor::new(bytes))
    }

    /// Open a file on disk; the declared type is guessed from its extension
    ///
    /// # Errors
    /// - File cannot be opened
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let file = tokio::fs::File::open(path_ref)
            .await
            .map_err(|e| PipelineError::file_io_error("open selected file", path_ref, &e))?;

        let mime_type = ImageFormat::from_path(path_ref)
            .map_or(UNKNOWN_MIME_TYPE, |format| format.to_mime_type());
        let name = path_ref
            .file_name()
            .map_or_else(|| path_ref.display().to_string(), |n| n.to_string_lossy().into_owned());

        Ok(Self::new(name, mime_type, file))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }
}

impl std::fmt::Debug for SelectedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectedFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .finish_non_exhaustive()
    }
}

/// Validated image bytes, not yet registered with the resource manager
#[derive(Debug, Clone)]
pub struct IngestedImage {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Arc<[u8]>,
}

/// Validates and reads user selections
#[derive(Debug, Clone)]
pub struct ImageIngestor {
    accepted_mime_prefix: String,
    max_file_size_bytes: u64,
    verify_image_content: bool,
}

impl ImageIngestor {
    #[must_use]
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            accepted_mime_prefix: config.accepted_mime_prefix.to_ascii_lowercase(),
            max_file_size_bytes: config.max_file_size_bytes,
            verify_image_content: config.verify_image_content,
        }
    }

    /// Read and validate a selection
    ///
    /// # Errors
    /// - `InvalidFile` when the declared type is not an image, the source
    ///   cannot be read, the file is empty or too large, or (with content
    ///   verification) the bytes are not a recognised image format
    #[instrument(skip(self, file), fields(file = %file.name, declared = %file.mime_type))]
    pub async fn ingest(&self, file: SelectedFile) -> Result<IngestedImage> {
        let SelectedFile {
            name,
            mime_type,
            source,
        } = file;

        let declared = mime_type.trim().to_ascii_lowercase();
        if !declared.starts_with(&self.accepted_mime_prefix) {
            return Err(PipelineError::invalid_file(
                name,
                format!("declared type '{}' is not an image", mime_type),
            ));
        }

        // One byte past the limit is enough to tell that the file is too large
        let mut limited = source.take(self.max_file_size_bytes.saturating_add(1));
        let mut buffer = Vec::new();
        if let Err(e) = limited.read_to_end(&mut buffer).await {
            return Err(PipelineError::invalid_file(
                name,
                format!("file could not be read: {}", e),
            ));
        }

        if buffer.is_empty() {
            return Err(PipelineError::invalid_file(name, "file is empty"));
        }

        if buffer.len() as u64 > self.max_file_size_bytes {
            return Err(PipelineError::invalid_file(
                name,
                format!(
                    "file exceeds the {} byte limit",
                    self.max_file_size_bytes
                ),
            ));
        }

        let mime_type = if self.verify_image_content {
            match image::guess_format(&buffer) {
                Ok(format) => format.to_mime_type().to_string(),
                Err(_) => {
                    return Err(PipelineError::invalid_file(
                        name,
                        "content is not a recognised image format",
                    ));
                },
            }
        } else {
            declared
        };

        debug!(
            bytes = buffer.len(),
            mime_type = %mime_type,
            "Selected file read"
        );

        Ok(IngestedImage {
            file_name: name,
            mime_type,
            bytes: Arc::from(buffer),
        })
    }
}
