//! User-facing notification sink
//!
//! Notifications are fire-and-forget and never feed back into pipeline
//! state. Frontends implement [`Notifier`] on top of their toast widget.

use tracing::{info, warn};

/// Receives exactly one message per completed removal attempt
pub trait Notifier: Send + Sync {
    /// The removal produced a processed image
    fn notify_success(&self, message: &str);

    /// The removal failed; `message` is the generic user-facing text
    fn notify_failure(&self, message: &str);
}

/// No-op notifier that discards all messages
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpNotifier;

impl Notifier for NoOpNotifier {
    fn notify_success(&self, _message: &str) {
        // Intentionally empty
    }

    fn notify_failure(&self, _message: &str) {
        // Intentionally empty
    }
}

/// Notifier that emits structured log events under the `bgremove::notify` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify_success(&self, message: &str) {
        info!(target: "bgremove::notify", kind = "success", "{}", message);
    }

    fn notify_failure(&self, message: &str) {
        warn!(target: "bgremove::notify", kind = "failure", "{}", message);
    }
}

/// Notifier that prints messages for a terminal user
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify_success(&self, message: &str) {
        println!("\u{2705} {}", message);
    }

    fn notify_failure(&self, message: &str) {
        eprintln!("\u{274c} {}", message);
    }
}
