//! # semroute
//!
//! An in-process, synchronous-dispatch publish/subscribe registry for
//! structured semantic events.
//!
//! Listeners select events with one of three pattern kinds — an exact
//! `subject[.predicate[.object]]` path, a regular expression over the
//! event's synthesized semantic path, or an arbitrary predicate — narrowed
//! by shallow field filters, ordered by priority, and executed under a
//! timeout with per-listener error isolation and deferred auto-removal.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use semroute::{handler_fn, Entity, EventMetadata, Pattern, Registry, SemanticEvent};
//! use serde_json::json;
//!
//! let registry = Registry::default();
//! registry.on(
//!     Pattern::literal("Order.created"),
//!     handler_fn(|event| async move { Ok(json!({ "id": event.what.id })) }),
//! )?;
//!
//! let event = SemanticEvent::new(Entity::new("Order").with_id("o-1"))
//!     .with_metadata(EventMetadata::action("created"));
//! let results = registry.emit(&event).await?;
//! assert!(results[0].success);
//! ```
//!
//! # What this crate is not
//!
//! Dispatch is purely in-memory: listeners and their execution counters die
//! with the process, and there is no delivery guarantee across restarts.
//! Durable server-side subscriptions, webhook delivery, and retries with
//! backoff live in external services layered beside this core. A timed-out handler
//! is abandoned, not cancelled: it keeps running detached with its eventual
//! outcome discarded. Handlers needing true cancellation must accept a
//! cooperative signal themselves.
//!
//! Construct one [`Registry`] per tenant or request context; instances
//! share no state.

mod config;
mod listener;
mod matcher;
pub mod presets;
mod registry;
mod store;
mod telemetry;

pub use config::RegistryConfig;
pub use listener::{
    AfterHook, BeforeHook, ErrorCallback, Handler, Listener, ListenerId, ListenerOptions,
    handler_fn,
};
pub use registry::{ExecutionResult, Registry, TimeoutElapsed};
pub use telemetry::{Telemetry, TracingTelemetry};

// Re-export the core types so most users depend on this crate alone.
pub use semroute_core::{
    BoxError, BoxPredicate, DispatchError, Entity, EventError, EventMetadata, FieldFilter,
    FilterValue, Filters, LiteralParts, Location, Pattern, RegisterError, SemanticEvent,
    SemrouteError, complexity_score, field_filter_matches,
};
