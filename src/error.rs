//! Error types for the background removal pipeline

use crate::types::PayloadId;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Error taxonomy for the background removal pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The selected input is not a readable image
    #[error("Invalid file '{file_name}': {reason}")]
    InvalidFile {
        /// Name of the rejected file as reported by the selection surface
        file_name: String,
        /// Why the file was rejected
        reason: String,
    },

    /// The external engine rejected the input, failed, or returned no usable data
    #[error("Background removal failed: {0}")]
    RemovalFailed(String),

    /// A completion arrived for work that has since been superseded.
    ///
    /// Internal: callers discard it silently, it is never shown to the user.
    #[error("Stale result for {operation} (ticket {ticket}, current {current})")]
    StaleResult {
        /// Which operation produced the stale completion
        operation: &'static str,
        /// Identity the operation was tagged with when it started
        ticket: u64,
        /// Identity that is current now
        current: u64,
    },

    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PipelineError {
    /// Create a new invalid file error
    pub fn invalid_file<N: Into<String>, R: Into<String>>(file_name: N, reason: R) -> Self {
        Self::InvalidFile {
            file_name: file_name.into(),
            reason: reason.into(),
        }
    }

    /// Create a new removal failure
    pub fn removal_failed<S: Into<String>>(msg: S) -> Self {
        Self::RemovalFailed(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a stale removal error for a result tagged with an outdated original
    #[must_use]
    pub fn stale_removal(tagged: PayloadId, current: Option<PayloadId>) -> Self {
        Self::StaleResult {
            operation: "background removal",
            ticket: tagged.get(),
            current: current.map_or(0, PayloadId::get),
        }
    }

    /// Create a stale selection error for a read overtaken by a newer selection
    #[must_use]
    pub fn stale_selection(ticket: u64, current: u64) -> Self {
        Self::StaleResult {
            operation: "file selection",
            ticket,
            current,
        }
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
    ) -> Self {
        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {})",
            parameter, value, valid_range
        ))
    }

    /// Whether this error is the internal stale-result marker
    #[must_use]
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleResult { .. })
    }

    /// Whether this error means the user picked something that is not an image
    #[must_use]
    pub fn is_invalid_file(&self) -> bool {
        matches!(self, Self::InvalidFile { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_error_creation() {
        let err = PipelineError::invalid_file("readme.txt", "declared type text/plain");
        assert!(err.is_invalid_file());
        assert!(!err.is_stale());

        let err = PipelineError::removal_failed("engine crashed");
        assert!(matches!(err, PipelineError::RemovalFailed(_)));
    }

    #[test]
    fn test_error_display() {
        let err = PipelineError::invalid_file("readme.txt", "not an image");
        assert_eq!(err.to_string(), "Invalid file 'readme.txt': not an image");

        let err = PipelineError::invalid_config("empty filename");
        assert_eq!(err.to_string(), "Invalid configuration: empty filename");
    }

    #[test]
    fn test_stale_errors() {
        let err = PipelineError::stale_removal(PayloadId::new(3), Some(PayloadId::new(4)));
        assert!(err.is_stale());
        let message = err.to_string();
        assert!(message.contains("background removal"));
        assert!(message.contains("ticket 3"));
        assert!(message.contains("current 4"));

        let err = PipelineError::stale_selection(1, 2);
        assert!(err.to_string().contains("file selection"));
    }

    #[test]
    fn test_io_errors_convert() {
        fn read_missing() -> Result<Vec<u8>> {
            Ok(std::fs::read("/nonexistent/bgremove/input.png")?)
        }
        let err = read_missing().unwrap_err();
        assert!(matches!(err, PipelineError::Io(ref e) if e.kind() == std::io::ErrorKind::NotFound));
        assert!(!err.is_invalid_file());
    }

    #[test]
    fn test_contextual_errors() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err =
            PipelineError::file_io_error("write download", Path::new("/tmp/out.png"), &io_error);
        let error_string = err.to_string();
        assert!(error_string.contains("write download"));
        assert!(error_string.contains("/tmp/out.png"));

        let err = PipelineError::config_value_error("max_file_size_bytes", 0, "1 or more");
        let error_string = err.to_string();
        assert!(error_string.contains("max_file_size_bytes"));
        assert!(error_string.contains("1 or more"));
    }
}
