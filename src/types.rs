//! Core data model: payloads, display references, states and snapshots

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Identity of an [`ImagePayload`] within one pipeline instance.
///
/// Ids increase monotonically, so a removal tagged with an id can be checked
/// against the current original when it completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PayloadId(u64);

impl PayloadId {
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for PayloadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Session-scoped reference to image bytes held by the
/// [`ResourceManager`](crate::resources::ResourceManager).
///
/// A reference is only meaningful while it is live in the manager that
/// issued it; after release it resolves to nothing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DisplayRef(String);

impl DisplayRef {
    /// Scheme prefix shared by every reference issued by this crate
    pub const PREFIX: &'static str = "blob:bgremove/";

    pub(crate) fn generate() -> Self {
        Self(format!("{}{}", Self::PREFIX, uuid::Uuid::new_v4()))
    }

    /// The reference as a URL-like string, suitable for an `src` attribute
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DisplayRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DisplayRef {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Raw image bytes plus the display reference that points at them.
///
/// Owned exclusively by the pipeline; other components only ever see an
/// [`ImageView`].
#[derive(Debug, Clone)]
pub struct ImagePayload {
    id: PayloadId,
    file_name: String,
    mime_type: String,
    bytes: Arc<[u8]>,
    display_ref: DisplayRef,
}

impl ImagePayload {
    pub(crate) fn new(
        id: PayloadId,
        file_name: String,
        mime_type: String,
        bytes: Arc<[u8]>,
        display_ref: DisplayRef,
    ) -> Self {
        Self {
            id,
            file_name,
            mime_type,
            bytes,
            display_ref,
        }
    }

    #[must_use]
    pub fn id(&self) -> PayloadId {
        self.id
    }

    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Shared handle to the raw bytes (no copy)
    #[must_use]
    pub fn bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    #[must_use]
    pub fn display_ref(&self) -> &DisplayRef {
        &self.display_ref
    }

    /// Read-only description of this payload
    #[must_use]
    pub fn view(&self) -> ImageView {
        ImageView {
            id: self.id,
            file_name: self.file_name.clone(),
            mime_type: self.mime_type.clone(),
            size_bytes: self.bytes.len(),
            display_ref: self.display_ref.clone(),
        }
    }
}

/// Read-only view of a payload exposed to presentation code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageView {
    pub id: PayloadId,
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: usize,
    pub display_ref: DisplayRef,
}

/// Pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// No original selected yet
    #[default]
    Idle,
    /// Original present, nothing running
    Ready,
    /// A removal is in flight
    Processing,
    /// Last removal produced a processed image
    Succeeded,
    /// Last removal failed; no processed image is held
    Failed,
}

impl PipelineState {
    /// Whether a new removal may start from this state
    #[must_use]
    pub fn accepts_removal(self) -> bool {
        matches!(self, Self::Ready | Self::Succeeded | Self::Failed)
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Ready => write!(f, "ready"),
            Self::Processing => write!(f, "processing"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Diagnostic record of the most recent removal failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastError {
    /// Full failure reason (never shown verbatim to the user)
    pub reason: String,
    /// Original the failed removal was running against
    pub original_id: PayloadId,
    pub occurred_at: DateTime<Utc>,
}

/// Point-in-time copy of the pipeline for presentation code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    pub state: PipelineState,
    pub original: Option<ImageView>,
    pub processed: Option<ImageView>,
    pub last_error: Option<LastError>,
    /// Original id the in-flight removal is tagged with, if any
    pub in_flight: Option<PayloadId>,
    /// An engine call is still running, possibly for a superseded original
    pub engine_busy: bool,
}

impl PipelineSnapshot {
    /// Mirrors the enabled state of a "remove background" button
    #[must_use]
    pub fn can_remove_background(&self) -> bool {
        self.original.is_some() && self.state.accepts_removal() && !self.engine_busy
    }

    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.state == PipelineState::Processing
    }
}
