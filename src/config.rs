//! Configuration for the background removal pipeline

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default save name for the processed cutout
pub const DEFAULT_PROCESSED_FILENAME: &str = "processed-image.png";

/// Default file stem for saving the original; the extension follows its MIME type
pub const DEFAULT_ORIGINAL_FILENAME_STEM: &str = "original-image";

/// Default upper bound for selected files (50 MiB)
pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 50 * 1024 * 1024;

/// Configuration for a pipeline instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Declared MIME types must start with this prefix to be accepted
    pub accepted_mime_prefix: String,

    /// Files larger than this are rejected as invalid
    pub max_file_size_bytes: u64,

    /// Sniff magic bytes of inputs and engine outputs (default: true)
    pub verify_image_content: bool,

    /// File name used when exporting the processed image
    pub processed_filename: String,

    /// File stem used when exporting the original image
    pub original_filename_stem: String,

    /// Message sent to the notifier when a removal succeeds
    pub success_message: String,

    /// Generic message sent to the notifier when a removal fails
    pub failure_message: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            accepted_mime_prefix: "image/".to_string(),
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            verify_image_content: true,
            processed_filename: DEFAULT_PROCESSED_FILENAME.to_string(),
            original_filename_stem: DEFAULT_ORIGINAL_FILENAME_STEM.to_string(),
            success_message: "Background removed successfully".to_string(),
            failure_message: "Failed to remove background".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bgremove_pipeline::PipelineConfig;
    ///
    /// let config = PipelineConfig::builder()
    ///     .processed_filename("cutout.png")
    ///     .max_file_size_bytes(10 * 1024 * 1024)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.processed_filename, "cutout.png");
    /// ```
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Load a configuration from a JSON document; missing keys take defaults
    ///
    /// # Errors
    /// - Malformed JSON
    /// - Values rejected by [`validate`](Self::validate)
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| PipelineError::invalid_config(format!("Malformed config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file
    ///
    /// # Errors
    /// - File cannot be read
    /// - Malformed JSON or invalid values
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let content = std::fs::read_to_string(path_ref)
            .map_err(|e| PipelineError::file_io_error("read config file", path_ref, &e))?;
        Self::from_json_str(&content)
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Empty MIME prefix
    /// - Zero maximum file size
    /// - Empty export file names, or identical names for original and processed
    /// - Empty notification messages
    pub fn validate(&self) -> Result<()> {
        if self.accepted_mime_prefix.trim().is_empty() {
            return Err(PipelineError::invalid_config(
                "accepted_mime_prefix must not be empty",
            ));
        }

        if self.max_file_size_bytes == 0 {
            return Err(PipelineError::config_value_error(
                "max_file_size_bytes",
                self.max_file_size_bytes,
                "1 or more",
            ));
        }

        if self.processed_filename.trim().is_empty() {
            return Err(PipelineError::invalid_config(
                "processed_filename must not be empty",
            ));
        }

        if self.original_filename_stem.trim().is_empty() {
            return Err(PipelineError::invalid_config(
                "original_filename_stem must not be empty",
            ));
        }

        let processed_stem = Path::new(&self.processed_filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        if processed_stem == self.original_filename_stem {
            return Err(PipelineError::invalid_config(format!(
                "original and processed exports must use distinct names (both '{}')",
                processed_stem
            )));
        }

        if self.success_message.trim().is_empty() || self.failure_message.trim().is_empty() {
            return Err(PipelineError::invalid_config(
                "notification messages must not be empty",
            ));
        }

        Ok(())
    }
}

/// Builder for `PipelineConfig`
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    #[must_use]
    pub fn accepted_mime_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.accepted_mime_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn max_file_size_bytes(mut self, bytes: u64) -> Self {
        self.config.max_file_size_bytes = bytes;
        self
    }

    #[must_use]
    pub fn verify_image_content(mut self, verify: bool) -> Self {
        self.config.verify_image_content = verify;
        self
    }

    #[must_use]
    pub fn processed_filename<S: Into<String>>(mut self, name: S) -> Self {
        self.config.processed_filename = name.into();
        self
    }

    #[must_use]
    pub fn original_filename_stem<S: Into<String>>(mut self, stem: S) -> Self {
        self.config.original_filename_stem = stem.into();
        self
    }

    #[must_use]
    pub fn success_message<S: Into<String>>(mut self, message: S) -> Self {
        self.config.success_message = message.into();
        self
    }

    #[must_use]
    pub fn failure_message<S: Into<String>>(mut self, message: S) -> Self {
        self.config.failure_message = message.into();
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    /// - Any rule checked by [`PipelineConfig::validate`]
    pub fn build(self) -> Result<PipelineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.processed_filename, "processed-image.png");
        assert_eq!(config.accepted_mime_prefix, "image/");
        assert!(config.verify_image_content);
    }

    #[test]
    fn test_builder_overrides() {
        let config = PipelineConfig::builder()
            .processed_filename("cutout.png")
            .original_filename_stem("source")
            .success_message("Done")
            .failure_message("Nope")
            .verify_image_content(false)
            .build()
            .unwrap();
        assert_eq!(config.processed_filename, "cutout.png");
        assert_eq!(config.original_filename_stem, "source");
        assert_eq!(config.success_message, "Done");
        assert!(!config.verify_image_content);
    }

    #[test]
    fn test_validation_failures() {
        assert!(PipelineConfig::builder()
            .max_file_size_bytes(0)
            .build()
            .is_err());
        assert!(PipelineConfig::builder()
            .accepted_mime_prefix("  ")
            .build()
            .is_err());
        assert!(PipelineConfig::builder()
            .processed_filename("")
            .build()
            .is_err());
        assert!(PipelineConfig::builder()
            .failure_message("")
            .build()
            .is_err());

        let err = PipelineConfig::builder()
            .processed_filename("image.png")
            .original_filename_stem("image")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("distinct"));
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config =
            PipelineConfig::from_json_str(r#"{ "processed_filename": "cutout.png" }"#).unwrap();
        assert_eq!(config.processed_filename, "cutout.png");
        assert_eq!(config.failure_message, "Failed to remove background");
    }

    #[test]
    fn test_json_rejects_invalid_values() {
        assert!(PipelineConfig::from_json_str(r#"{ "max_file_size_bytes": 0 }"#).is_err());
        assert!(PipelineConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(&path, r#"{ "success_message": "All done" }"#).unwrap();

        let config = PipelineConfig::from_json_file(&path).unwrap();
        assert_eq!(config.success_message, "All done");

        let missing = PipelineConfig::from_json_file(dir.path().join("missing.json"));
        assert!(matches!(missing, Err(PipelineError::Io(_))));
    }
}
