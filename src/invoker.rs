//! Background removal invoker
//!
//! Wraps the single engine call and turns whatever the engine does into a
//! [`RemovalOutcome`] value. The invoker never touches pipeline state and
//! never notifies; the state machine reacts to the returned value.

use crate::{engine::RemovalEngine, types::PayloadId};
use futures::FutureExt;
use instant::Instant;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// MIME type assumed for engine output whose format cannot be sniffed
pub const DEFAULT_OUTPUT_MIME_TYPE: &str = "image/png";

/// Input for one engine call, tagged with the original it belongs to
#[derive(Debug, Clone)]
pub struct RemovalRequest {
    pub original_id: PayloadId,
    pub bytes: Arc<[u8]>,
}

/// What one engine call produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalOutcome {
    Success { bytes: Vec<u8>, mime_type: String },
    Failure { reason: String },
}

impl RemovalOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    fn failure<S: Into<String>>(reason: S) -> Self {
        Self::Failure {
            reason: reason.into(),
        }
    }
}

/// Drives the external engine; no retries
#[derive(Clone)]
pub struct RemovalInvoker {
    engine: Arc<dyn RemovalEngine>,
    verify_output: bool,
}

impl RemovalInvoker {
    pub fn new(engine: Arc<dyn RemovalEngine>, verify_output: bool) -> Self {
        Self {
            engine,
            verify_output,
        }
    }

    /// Run the engine once and classify the result.
    ///
    /// Errors, panics, empty output and (with verification) unrecognised
    /// output all become [`RemovalOutcome::Failure`].
    #[instrument(skip(self, request), fields(engine = %self.engine.name(), original = %request.original_id))]
    pub async fn invoke(&self, request: RemovalRequest) -> RemovalOutcome {
        let start = Instant::now();
        debug!(input_bytes = request.bytes.len(), "Calling removal engine");

        let call = self.engine.remove_background(&request.bytes);
        let result = match AssertUnwindSafe(call).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic payload".to_string());
                warn!(%detail, "Removal engine panicked");
                return RemovalOutcome::failure(format!("engine panicked: {}", detail));
            },
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        let bytes = match result {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(elapsed_ms, error = %format!("{:#}", e), "Removal engine failed");
                return RemovalOutcome::failure(format!("{:#}", e));
            },
        };

        if bytes.is_empty() {
            warn!(elapsed_ms, "Removal engine returned no data");
            return RemovalOutcome::failure("engine returned no data");
        }

        let mime_type = match image::guess_format(&bytes) {
            Ok(format) => format.to_mime_type().to_string(),
            Err(_) if self.verify_output => {
                warn!(elapsed_ms, output_bytes = bytes.len(), "Engine output is not an image");
                return RemovalOutcome::failure("engine output is not a recognised image format");
            },
            Err(_) => DEFAULT_OUTPUT_MIME_TYPE.to_string(),
        };

        info!(
            elapsed_ms,
            output_bytes = bytes.len(),
            mime_type = %mime_type,
            "Removal engine finished"
        );
        RemovalOutcome::Success { bytes, mime_type }
    }
}

impl std::fmt::Debug for RemovalInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemovalInvoker")
            .field("engine", &self.engine.name())
            .field("verify_output", &self.verify_output)
            .finish()
    }
}
