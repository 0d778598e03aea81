//! Listener records and their options.
//!
//! A [`Listener`] is a (pattern, handler, options) triple with a unique
//! process-assigned id and an execution counter. Handlers and middleware are
//! type-erased `Arc<dyn Fn … -> BoxFuture>` callables, so heterogeneous
//! listeners can live in one store and be snapshotted cheaply.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use semroute_core::{BoxError, Filters, Pattern, SemanticEvent};
use serde_json::Value;
use uuid::Uuid;

/// Unique, process-assigned listener identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl ListenerId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A type-erased event handler.
///
/// Receives its own copy of the event (possibly transformed by a `before`
/// middleware) and produces a JSON result value.
pub type Handler =
    Arc<dyn Fn(SemanticEvent) -> BoxFuture<'static, Result<Value, BoxError>> + Send + Sync>;

/// Middleware run before the handler; returns the event copy the handler
/// will receive. A failure here skips the handler entirely.
pub type BeforeHook =
    Arc<dyn Fn(SemanticEvent) -> BoxFuture<'static, Result<SemanticEvent, BoxError>> + Send + Sync>;

/// Middleware run after a successful handler, receiving the delivered event
/// and the handler's result. A failure here is surfaced as a failed
/// execution result even though the handler's side effects already happened.
pub type AfterHook =
    Arc<dyn Fn(SemanticEvent, Value) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

/// Per-listener error observer, invoked for before/handler/after failures
/// and for timeouts. Side-effect only.
pub type ErrorCallback = Arc<dyn Fn(ListenerId, &BoxError) + Send + Sync>;

/// Wrap an async closure into a [`Handler`].
pub fn handler_fn<F, Fut>(f: F) -> Handler
where
    F: Fn(SemanticEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
{
    Arc::new(move |event| Box::pin(f(event)))
}

/// Registration options for one listener.
#[derive(Clone, Default)]
pub struct ListenerOptions {
    /// Shallow field filters evaluated after the pattern matches.
    pub filters: Filters,
    /// Execution priority within one dispatch pass; higher runs first,
    /// default 0.
    pub priority: i32,
    /// Automatic removal after this many successful executions.
    pub max_executions: Option<u32>,
    /// Per-listener handler timeout; the registry default applies when
    /// unset.
    pub timeout: Option<Duration>,
    /// Namespace for bulk removal via `off_group`.
    pub group: Option<String>,
    /// Middleware run before the handler.
    pub before: Option<BeforeHook>,
    /// Middleware run after a successful handler.
    pub after: Option<AfterHook>,
    /// Per-listener error observer.
    pub on_error: Option<ErrorCallback>,
    /// Remove the listener when its before middleware or handler fails.
    pub remove_on_error: bool,
    /// Remove the listener when its handler times out.
    pub remove_on_timeout: bool,
}

impl ListenerOptions {
    /// Default options: no filters, priority 0, unlimited executions,
    /// registry-default timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the field filters.
    pub fn filters(mut self, filters: Filters) -> Self {
        self.filters = filters;
        self
    }

    /// Set the priority (higher runs first).
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Remove the listener automatically after `max` successful executions.
    pub fn max_executions(mut self, max: u32) -> Self {
        self.max_executions = Some(max);
        self
    }

    /// Override the registry's default handler timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Assign the listener to a removal group.
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Set the before middleware.
    pub fn before<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(SemanticEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<SemanticEvent, BoxError>> + Send + 'static,
    {
        self.before = Some(Arc::new(move |event| Box::pin(f(event))));
        self
    }

    /// Set the after middleware.
    pub fn after<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(SemanticEvent, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.after = Some(Arc::new(move |event, result| Box::pin(f(event, result))));
        self
    }

    /// Set the error observer.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(ListenerId, &BoxError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Remove the listener on before/handler failure.
    pub fn remove_on_error(mut self) -> Self {
        self.remove_on_error = true;
        self
    }

    /// Remove the listener on handler timeout.
    pub fn remove_on_timeout(mut self) -> Self {
        self.remove_on_timeout = true;
        self
    }
}

impl fmt::Debug for ListenerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerOptions")
            .field("priority", &self.priority)
            .field("max_executions", &self.max_executions)
            .field("timeout", &self.timeout)
            .field("group", &self.group)
            .field("remove_on_error", &self.remove_on_error)
            .field("remove_on_timeout", &self.remove_on_timeout)
            .finish_non_exhaustive()
    }
}

/// A registered listener.
///
/// The pattern is normalized once at registration and never re-normalized;
/// the execution counter is written only by the dispatcher.
pub struct Listener {
    pub(crate) id: ListenerId,
    pub(crate) pattern: Pattern,
    pub(crate) handler: Handler,
    pub(crate) options: ListenerOptions,
    pub(crate) executions: AtomicU32,
}

impl Listener {
    pub(crate) fn new(pattern: Pattern, handler: Handler, options: ListenerOptions) -> Self {
        Self {
            id: ListenerId::new(),
            pattern,
            handler,
            options,
            executions: AtomicU32::new(0),
        }
    }

    /// The listener's unique id.
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// The listener's pattern.
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// The listener's registration options.
    pub fn options(&self) -> &ListenerOptions {
        &self.options
    }

    /// How many times the handler has completed successfully.
    pub fn executions(&self) -> u32 {
        self.executions.load(Ordering::Acquire)
    }

    pub(crate) fn record_execution(&self) -> u32 {
        self.executions.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Whether the listener has reached its execution budget.
    pub(crate) fn exhausted(&self) -> bool {
        self.options
            .max_executions
            .is_some_and(|max| self.executions() >= max)
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.id)
            .field("pattern", &self.pattern)
            .field("options", &self.options)
            .field("executions", &self.executions())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        assert_ne!(ListenerId::new(), ListenerId::new());
    }

    #[test]
    fn options_builder_sets_fields() {
        let opts = ListenerOptions::new()
            .priority(7)
            .max_executions(3)
            .timeout(Duration::from_millis(250))
            .group("audit")
            .remove_on_timeout();

        assert_eq!(opts.priority, 7);
        assert_eq!(opts.max_executions, Some(3));
        assert_eq!(opts.timeout, Some(Duration::from_millis(250)));
        assert_eq!(opts.group.as_deref(), Some("audit"));
        assert!(opts.remove_on_timeout);
        assert!(!opts.remove_on_error);
    }

    #[test]
    fn exhaustion_tracks_execution_count() {
        let listener = Listener::new(
            Pattern::literal("Order.created"),
            handler_fn(|_| async { Ok(Value::Null) }),
            ListenerOptions::new().max_executions(2),
        );

        assert!(!listener.exhausted());
        listener.record_execution();
        assert!(!listener.exhausted());
        listener.record_execution();
        assert!(listener.exhausted());
    }
}
