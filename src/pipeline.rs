//! Pipeline state machine
//!
//! [`BackgroundRemovalPipeline`] is the single source of truth for the
//! original image, the processed image, the current [`PipelineState`] and the
//! last error. It is the only component that talks to every other one:
//!
//! ```text
//! SelectedFile -> ImageIngestor -> (wrap) original -> RemovalInvoker -> (wrap) processed
//!                                                                      -> Notifier / Exporter
//! ```
//!
//! All mutation happens under one lock that is never held across an await.
//! Work that suspends (reading a file, calling the engine) is tagged before
//! the lock is released and checked again when it completes, so a completion
//! that belongs to a superseded original is dropped instead of applied.

use crate::{
    config::PipelineConfig,
    engine::RemovalEngine,
    error::{PipelineError, Result},
    exporter::{original_export_name, DirectoryDownloadHost, DownloadHost, Exporter},
    ingest::{ImageIngestor, SelectedFile},
    invoker::{RemovalInvoker, RemovalOutcome, RemovalRequest},
    notifier::{Notifier, TracingNotifier},
    resources::{ResourceManager, ResourceStats},
    types::{
        DisplayRef, ImagePayload, ImageView, LastError, PayloadId, PipelineSnapshot,
        PipelineState,
    },
};
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, instrument, warn};

/// Why a removal request was refused without calling the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// No original has been selected yet
    NoOriginal,
    /// A removal is already in flight
    AlreadyProcessing,
}

/// Result of one call to [`BackgroundRemovalPipeline::remove_background`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalReport {
    /// The processed image is now held; one success notification was sent
    Succeeded(ImageView),
    /// The engine failed; one failure notification was sent
    Failed { reason: String },
    /// Refused before reaching the engine; nothing changed, nothing was sent
    Rejected(RejectReason),
    /// The original changed while the engine ran; the result was dropped
    Discarded,
}

impl RemovalReport {
    #[must_use]
    pub fn is_succeeded(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }
}

#[derive(Debug, Default)]
struct PipelineCore {
    state: PipelineState,
    original: Option<ImagePayload>,
    processed: Option<ImagePayload>,
    last_error: Option<LastError>,
    /// Original id the running removal was started against
    in_flight: Option<PayloadId>,
    /// Set while an engine call runs, even after its original is superseded
    engine_busy: bool,
    next_payload_id: u64,
    /// Tickets handed out to selections when they start
    selections_started: u64,
    /// Ticket of the most recently applied selection
    selections_applied: u64,
}

impl PipelineCore {
    fn allocate_id(&mut self) -> PayloadId {
        self.next_payload_id += 1;
        PayloadId::new(self.next_payload_id)
    }

    fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            state: self.state,
            original: self.original.as_ref().map(ImagePayload::view),
            processed: self.processed.as_ref().map(ImagePayload::view),
            last_error: self.last_error.clone(),
            in_flight: self.in_flight,
            engine_busy: self.engine_busy,
        }
    }

    /// Drop `processed`, releasing its reference
    fn clear_processed(&mut self, resources: &ResourceManager) {
        if let Some(old) = self.processed.take() {
            resources.release(old.display_ref());
        }
    }

    /// Drop both payloads, releasing their references
    fn release_all(&mut self, resources: &ResourceManager) {
        self.clear_processed(resources);
        if let Some(old) = self.original.take() {
            resources.release(old.display_ref());
        }
    }
}

/// Undoes the `Processing` transition if a removal future is dropped while
/// the engine call is pending
struct InFlightGuard<'a> {
    pipeline: &'a BackgroundRemovalPipeline,
    tag: PayloadId,
    resume: PipelineState,
    armed: bool,
}

impl InFlightGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut core = self.pipeline.core();
        core.engine_busy = false;
        if core.in_flight == Some(self.tag) {
            core.in_flight = None;
            core.state = self.resume;
            warn!(original = %self.tag, state = %self.resume, "Removal abandoned before the engine answered");
        }
    }
}

struct Shared {
    core: Mutex<PipelineCore>,
    resources: Arc<ResourceManager>,
    ingestor: ImageIngestor,
    invoker: RemovalInvoker,
    notifier: Arc<dyn Notifier>,
    exporter: Exporter,
    config: PipelineConfig,
}

impl Drop for Shared {
    fn drop(&mut self) {
        let core = self
            .core
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        core.release_all(&self.resources);
    }
}

/// Builder for [`BackgroundRemovalPipeline`]
pub struct PipelineBuilder {
    config: PipelineConfig,
    engine: Option<Arc<dyn RemovalEngine>>,
    notifier: Arc<dyn Notifier>,
    download_host: Arc<dyn DownloadHost>,
    resources: Arc<ResourceManager>,
}

impl PipelineBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            engine: None,
            notifier: Arc::new(TracingNotifier),
            download_host: Arc::new(DirectoryDownloadHost::new(".")),
            resources: Arc::new(ResourceManager::new()),
        }
    }

    #[must_use]
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Engine that performs the actual background removal (required)
    #[must_use]
    pub fn engine(mut self, engine: Arc<dyn RemovalEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Notification sink (default: [`TracingNotifier`])
    #[must_use]
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Save action used by exports (default: current directory)
    #[must_use]
    pub fn download_host(mut self, host: Arc<dyn DownloadHost>) -> Self {
        self.download_host = host;
        self
    }

    /// Build the pipeline
    ///
    /// # Errors
    /// - No engine configured
    /// - Invalid configuration
    pub fn build(self) -> Result<BackgroundRemovalPipeline> {
        self.config.validate()?;
        let engine = self
            .engine
            .ok_or_else(|| PipelineError::invalid_config("a removal engine is required"))?;

        let shared = Shared {
            core: Mutex::new(PipelineCore::default()),
            ingestor: ImageIngestor::new(&self.config),
            invoker: RemovalInvoker::new(engine, self.config.verify_image_content),
            notifier: self.notifier,
            exporter: Exporter::new(Arc::clone(&self.resources), self.download_host),
            resources: self.resources,
            config: self.config,
        };

        Ok(BackgroundRemovalPipeline {
            shared: Arc::new(shared),
        })
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Background removal pipeline.
///
/// Cheap to clone; clones share the same state. References still held when
/// the last clone is dropped are released.
#[derive(Clone)]
pub struct BackgroundRemovalPipeline {
    shared: Arc<Shared>,
}

impl BackgroundRemovalPipeline {
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    fn core(&self) -> MutexGuard<'_, PipelineCore> {
        self.shared
            .core
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `file` the new original.
    ///
    /// On success any processed image is released, any in-flight removal is
    /// superseded and the pipeline is `Ready`. On error nothing changes.
    ///
    /// # Errors
    /// - `InvalidFile` if the selection is not a readable image
    /// - `StaleResult` if a selection started later has already been applied
    #[instrument(skip(self, file), fields(file = %file.name()))]
    pub async fn select_file(&self, file: SelectedFile) -> Result<PipelineSnapshot> {
        let ticket = {
            let mut core = self.core();
            core.selections_started += 1;
            core.selections_started
        };

        let ingested = match self.shared.ingestor.ingest(file).await {
            Ok(ingested) => ingested,
            Err(e) => {
                warn!(error = %e, "Selection rejected");
                return Err(e);
            },
        };

        let resources = &self.shared.resources;
        let mut core = self.core();
        if ticket <= core.selections_applied {
            debug!(
                ticket,
                applied = core.selections_applied,
                "Selection superseded before it completed; discarding"
            );
            return Err(PipelineError::stale_selection(ticket, core.selections_applied));
        }

        let id = core.allocate_id();
        let display_ref = resources.wrap(Arc::clone(&ingested.bytes), &ingested.mime_type);
        let payload = ImagePayload::new(
            id,
            ingested.file_name,
            ingested.mime_type,
            ingested.bytes,
            display_ref,
        );

        core.clear_processed(resources);
        if let Some(old) = core.original.replace(payload) {
            resources.release(old.display_ref());
        }
        if let Some(superseded) = core.in_flight.take() {
            debug!(%superseded, "New selection supersedes in-flight removal");
        }
        core.state = PipelineState::Ready;
        core.last_error = None;
        core.selections_applied = ticket;

        info!(original = %id, "Original image selected");
        Ok(core.snapshot())
    }

    /// Run background removal on the current original.
    ///
    /// Refused (no-op) without an original or while an engine call is still
    /// running, including one whose original has since been replaced. If the
    /// returned future is dropped before the engine answers, the pipeline
    /// goes back to the state it was in before the call. Exactly one notification is sent for every attempt that
    /// completes as `Succeeded` or `Failed`; none for `Rejected` or
    /// `Discarded`.
    #[instrument(skip(self))]
    pub async fn remove_background(&self) -> RemovalReport {
        let (request, resume) = {
            let mut core = self.core();
            if core.state == PipelineState::Processing || core.engine_busy {
                debug!("Removal already in flight; ignoring request");
                return RemovalReport::Rejected(RejectReason::AlreadyProcessing);
            }
            let Some(original) = core.original.as_ref() else {
                debug!("No original selected; ignoring request");
                return RemovalReport::Rejected(RejectReason::NoOriginal);
            };
            let request = RemovalRequest {
                original_id: original.id(),
                bytes: original.bytes(),
            };
            let resume = core.state;
            core.state = PipelineState::Processing;
            core.in_flight = Some(request.original_id);
            core.engine_busy = true;
            (request, resume)
        };

        let tag = request.original_id;
        let guard = InFlightGuard {
            pipeline: self,
            tag,
            resume,
            armed: true,
        };
        info!(original = %tag, "Background removal started");
        let outcome = self.shared.invoker.invoke(request).await;
        guard.disarm();

        let report = self.apply_outcome(tag, outcome);
        match &report {
            RemovalReport::Succeeded(_) => {
                self.shared
                    .notifier
                    .notify_success(&self.shared.config.success_message);
            },
            RemovalReport::Failed { .. } => {
                self.shared
                    .notifier
                    .notify_failure(&self.shared.config.failure_message);
            },
            RemovalReport::Rejected(_) | RemovalReport::Discarded => {},
        }
        report
    }

    fn apply_outcome(&self, tag: PayloadId, outcome: RemovalOutcome) -> RemovalReport {
        let resources = &self.shared.resources;
        let mut core = self.core();
        core.engine_busy = false;

        let current = core.original.as_ref().map(ImagePayload::id);
        if core.in_flight != Some(tag) || current != Some(tag) {
            let stale = PipelineError::stale_removal(tag, current);
            debug!(reason = %stale, "Discarding removal result");
            return RemovalReport::Discarded;
        }
        core.in_flight = None;

        match outcome {
            RemovalOutcome::Success { bytes, mime_type } => {
                let id = core.allocate_id();
                let bytes: Arc<[u8]> = Arc::from(bytes);
                let display_ref = resources.wrap(Arc::clone(&bytes), &mime_type);
                let payload = ImagePayload::new(
                    id,
                    self.shared.config.processed_filename.clone(),
                    mime_type,
                    bytes,
                    display_ref,
                );
                let view = payload.view();

                core.clear_processed(resources);
                core.processed = Some(payload);
                core.state = PipelineState::Succeeded;
                core.last_error = None;

                info!(original = %tag, processed = %id, "Background removal succeeded");
                RemovalReport::Succeeded(view)
            },
            RemovalOutcome::Failure { reason } => {
                core.clear_processed(resources);
                core.state = PipelineState::Failed;
                core.last_error = Some(LastError {
                    reason: reason.clone(),
                    original_id: tag,
                    occurred_at: Utc::now(),
                });

                warn!(original = %tag, %reason, "Background removal failed");
                RemovalReport::Failed { reason }
            },
        }
    }

    /// Save the processed image (default name from config)
    pub fn export_processed(&self, filename: Option<&str>) {
        let target = self.core().processed.as_ref().map(|p| p.display_ref().clone());
        match target {
            Some(display_ref) => {
                let name = filename.unwrap_or(&self.shared.config.processed_filename);
                self.shared.exporter.export_resource(&display_ref, name);
            },
            None => warn!("Export requested but no processed image is held"),
        }
    }

    /// Save the original image (default name `<stem>.<ext>` from config)
    pub fn export_original(&self, filename: Option<&str>) {
        let target = self
            .core()
            .original
            .as_ref()
            .map(|p| (p.display_ref().clone(), p.mime_type().to_string()));
        match target {
            Some((display_ref, mime_type)) => {
                let name = filename.map_or_else(
                    || original_export_name(&self.shared.config.original_filename_stem, &mime_type),
                    str::to_string,
                );
                self.shared.exporter.export_resource(&display_ref, &name);
            },
            None => warn!("Export requested but no original image is held"),
        }
    }

    /// Save a resource the pipeline currently holds.
    ///
    /// References that are neither the current original nor the current
    /// processed image are ignored.
    pub fn export_resource(&self, display_ref: &DisplayRef, filename: &str) {
        let held = {
            let core = self.core();
            let held = core
                .original
                .iter()
                .chain(core.processed.iter())
                .any(|p| p.display_ref() == display_ref);
            held
        };
        if held {
            self.shared.exporter.export_resource(display_ref, filename);
        } else {
            warn!(display_ref = %display_ref, "Export requested for a reference the pipeline does not hold");
        }
    }

    /// Release both images and return to `Idle`.
    ///
    /// Any in-flight removal or pending selection is superseded. The pipeline
    /// stays usable afterwards, though a new removal waits for an engine call
    /// that is still running to return.
    pub fn teardown(&self) {
        let mut core = self.core();
        core.release_all(&self.shared.resources);
        core.in_flight = None;
        core.selections_applied = core.selections_started;
        core.state = PipelineState::Idle;
        core.last_error = None;
        info!("Pipeline torn down");
    }

    #[must_use]
    pub fn snapshot(&self) -> PipelineSnapshot {
        self.core().snapshot()
    }

    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.core().state
    }

    /// Diagnostic details of the last failure, if the pipeline is `Failed`
    #[must_use]
    pub fn last_error(&self) -> Option<LastError> {
        self.core().last_error.clone()
    }

    /// Bytes and MIME type behind a live reference, for rendering
    #[must_use]
    pub fn resolve(&self, display_ref: &DisplayRef) -> Option<(Arc<[u8]>, String)> {
        self.shared.resources.resolve(display_ref)
    }

    #[must_use]
    pub fn resource_stats(&self) -> ResourceStats {
        self.shared.resources.stats()
    }

    /// Shared handle to the resource manager; outlives the pipeline
    #[must_use]
    pub fn resources(&self) -> Arc<ResourceManager> {
        Arc::clone(&self.shared.resources)
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.shared.config
    }
}

impl std::fmt::Debug for BackgroundRemovalPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundRemovalPipeline")
            .field("snapshot", &self.snapshot())
            .finish_non_exhaustive()
    }
}
