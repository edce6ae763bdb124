//! Display reference lifecycle
//!
//! The [`ResourceManager`] is the only place references are created and
//! destroyed. Every [`wrap`](ResourceManager::wrap) must be paired with exactly
//! one [`release`](ResourceManager::release); [`ResourceStats`] makes that
//! pairing observable.

use crate::types::DisplayRef;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

#[derive(Debug)]
struct LiveResource {
    bytes: Arc<[u8]>,
    mime_type: String,
}

#[derive(Debug, Default)]
struct Registry {
    live: HashMap<DisplayRef, LiveResource>,
    wrapped: u64,
    released: u64,
    double_releases: u64,
}

/// Wrap/release counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceStats {
    /// References created so far
    pub wrapped: u64,
    /// References released so far
    pub released: u64,
    /// References currently live
    pub live: usize,
    /// Release calls for references that were not live
    pub double_releases: u64,
}

impl ResourceStats {
    /// True when every wrap has been matched by exactly one release
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.wrapped == self.released && self.live == 0 && self.double_releases == 0
    }
}

/// Registry of live display references
#[derive(Debug, Default)]
pub struct ResourceManager {
    registry: Mutex<Registry>,
}

impl ResourceManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        // A panic while holding the lock cannot leave the map half-updated
        self.registry
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Register shared bytes under a fresh reference
    pub fn wrap(&self, bytes: Arc<[u8]>, mime_type: &str) -> DisplayRef {
        let display_ref = DisplayRef::generate();
        let size = bytes.len();
        let mut registry = self.registry();
        registry.live.insert(
            display_ref.clone(),
            LiveResource {
                bytes,
                mime_type: mime_type.to_string(),
            },
        );
        registry.wrapped += 1;
        debug!(
            %display_ref,
            size,
            mime_type,
            live = registry.live.len(),
            "Wrapped resource"
        );
        display_ref
    }

    /// Invalidate a reference.
    ///
    /// Returns `false` if the reference was not live. That is a bookkeeping
    /// bug in the caller, so it is logged and counted but never fatal.
    pub fn release(&self, display_ref: &DisplayRef) -> bool {
        let mut registry = self.registry();
        if registry.live.remove(display_ref).is_some() {
            registry.released += 1;
            debug!(%display_ref, live = registry.live.len(), "Released resource");
            true
        } else {
            registry.double_releases += 1;
            warn!(%display_ref, "Release of unknown or already released reference");
            false
        }
    }

    /// Bytes and MIME type behind a live reference
    #[must_use]
    pub fn resolve(&self, display_ref: &DisplayRef) -> Option<(Arc<[u8]>, String)> {
        self.registry()
            .live
            .get(display_ref)
            .map(|resource| (Arc::clone(&resource.bytes), resource.mime_type.clone()))
    }

    #[must_use]
    pub fn is_live(&self, display_ref: &DisplayRef) -> bool {
        self.registry().live.contains_key(display_ref)
    }

    #[must_use]
    pub fn stats(&self) -> ResourceStats {
        let registry = self.registry();
        ResourceStats {
            wrapped: registry.wrapped,
            released: registry.released,
            live: registry.live.len(),
            double_releases: registry.double_releases,
        }
    }
}
