//! Telemetry observers.
//!
//! A [`Telemetry`] implementation is notified around emission and each
//! handler's lifecycle. Observers are side-effect only: nothing they do
//! affects matching, execution order, or results.

use std::time::Duration;

use semroute_core::{BoxError, SemanticEvent};

use crate::listener::ListenerId;

/// Observer callbacks fired around emission and handler lifecycle.
///
/// All methods default to no-ops; implement only what you need.
pub trait Telemetry: Send + Sync {
    /// An event entered dispatch with the given candidate count.
    fn on_emit(&self, event: &SemanticEvent, candidates: usize) {
        let _ = (event, candidates);
    }

    /// A matched listener is about to run.
    fn on_handler_start(&self, id: ListenerId) {
        let _ = id;
    }

    /// A handler (and its after middleware, if any) completed successfully.
    fn on_handler_success(&self, id: ListenerId) {
        let _ = id;
    }

    /// A handler failed.
    fn on_handler_error(&self, id: ListenerId, error: &BoxError) {
        let _ = (id, error);
    }

    /// A handler exceeded its timeout; its eventual outcome is discarded.
    fn on_handler_timeout(&self, id: ListenerId, timeout: Duration) {
        let _ = (id, timeout);
    }
}

/// A [`Telemetry`] implementation that logs through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl Telemetry for TracingTelemetry {
    fn on_emit(&self, event: &SemanticEvent, candidates: usize) {
        tracing::debug!(
            event_type = event.type_discriminator().unwrap_or("<none>"),
            action = event.resolved_action().unwrap_or("<none>"),
            candidates,
            "dispatching event"
        );
    }

    fn on_handler_start(&self, id: ListenerId) {
        tracing::trace!(listener = %id, "handler starting");
    }

    fn on_handler_success(&self, id: ListenerId) {
        tracing::debug!(listener = %id, "handler succeeded");
    }

    fn on_handler_error(&self, id: ListenerId, error: &BoxError) {
        tracing::warn!(listener = %id, %error, "handler failed");
    }

    fn on_handler_timeout(&self, id: ListenerId, timeout: Duration) {
        tracing::warn!(listener = %id, ?timeout, "handler timed out; outcome discarded");
    }
}
