//! The registry: registration, removal, and the dispatch pass.
//!
//! A [`Registry`] owns one listener store. Registration and removal are
//! synchronous; [`Registry::emit`] runs the full dispatch pass for one
//! event:
//!
//! 1. snapshot the candidate listeners,
//! 2. evaluate the matcher over all candidates concurrently,
//! 3. sort the matches by descending priority,
//! 4. execute them sequentially (handlers may have ordering-sensitive side
//!    effects), each racing its timeout,
//! 5. apply deferred removals once the pass is complete.
//!
//! Removal is deferred so that mutating the store mid-pass can never skip
//! or duplicate an already-snapshotted listener. Construct one registry per
//! tenant or request context; instances share no state.

use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use futures::future;
use semroute_core::{
    BoxError, DispatchError, Pattern, RegisterError, SemanticEvent, complexity_score,
};
use serde_json::Value;
use thiserror::Error;

use crate::config::RegistryConfig;
use crate::listener::{Handler, Listener, ListenerId, ListenerOptions};
use crate::matcher;
use crate::store::ListenerStore;

/// Raised (through `on_error`) when a handler exceeds its timeout.
///
/// Timeouts are a distinct kind from handler errors: the corresponding
/// [`ExecutionResult`] carries `timed_out: true` and no error message.
#[derive(Debug, Clone, Error)]
#[error("handler timed out after {timeout:?}")]
pub struct TimeoutElapsed {
    /// The exceeded timeout.
    pub timeout: Duration,
}

/// The outcome of one attempted listener during one dispatch pass.
///
/// Never persisted; returned to the caller of [`Registry::emit`].
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// The listener that was attempted.
    pub listener_id: ListenerId,
    /// Whether the handler and its after middleware both succeeded.
    pub success: bool,
    /// The handler's result value, when it produced one.
    pub result: Option<Value>,
    /// The failure message, for before/handler/after errors.
    pub error: Option<String>,
    /// Whether the handler exceeded its timeout.
    pub timed_out: bool,
}

impl ExecutionResult {
    fn ok(listener_id: ListenerId, result: Value) -> Self {
        Self {
            listener_id,
            success: true,
            result: Some(result),
            error: None,
            timed_out: false,
        }
    }

    fn failed(listener_id: ListenerId, error: &BoxError) -> Self {
        Self {
            listener_id,
            success: false,
            result: None,
            error: Some(error.to_string()),
            timed_out: false,
        }
    }

    fn failed_after(listener_id: ListenerId, result: Value, error: &BoxError) -> Self {
        Self {
            listener_id,
            success: false,
            result: Some(result),
            error: Some(error.to_string()),
            timed_out: false,
        }
    }

    fn timed_out(listener_id: ListenerId) -> Self {
        Self {
            listener_id,
            success: false,
            result: None,
            error: None,
            timed_out: true,
        }
    }
}

/// An in-process publish/subscribe registry for semantic events.
pub struct Registry {
    config: RegistryConfig,
    store: RwLock<ListenerStore>,
}

impl Registry {
    /// Create a registry with the given configuration.
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            store: RwLock::new(ListenerStore::new()),
        }
    }

    /// The registry's configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register a listener.
    ///
    /// Fails synchronously on capacity limits and on regex patterns whose
    /// complexity score exceeds the configured cap. The pattern is
    /// normalized here, once; it is never re-examined at match time.
    pub fn register(
        &self,
        pattern: Pattern,
        handler: Handler,
        options: ListenerOptions,
    ) -> Result<ListenerId, RegisterError> {
        if let Pattern::Regex(regex) = &pattern {
            let score = complexity_score(regex.as_str());
            if score > self.config.max_regex_complexity {
                return Err(RegisterError::PatternTooComplex {
                    score,
                    max: self.config.max_regex_complexity,
                });
            }
        }

        let listener = Arc::new(Listener::new(pattern, handler, options));
        let id = listener.id();
        self.store_write().insert(listener, &self.config)?;
        Ok(id)
    }

    /// Register a listener with default options.
    pub fn on(&self, pattern: Pattern, handler: Handler) -> Result<ListenerId, RegisterError> {
        self.register(pattern, handler, ListenerOptions::default())
    }

    /// Unregister a listener. Returns whether it existed.
    pub fn off(&self, id: ListenerId) -> bool {
        self.store_write().remove(id)
    }

    /// Unregister every listener in `group`. Returns the removed count.
    pub fn off_group(&self, group: &str) -> usize {
        self.store_write().remove_group(group)
    }

    /// Remove all listeners without destroying the registry.
    pub fn clear(&self) {
        self.store_write().clear();
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.store_read().len()
    }

    /// Whether the registry holds no listeners.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run one dispatch pass for `event` and return one result per
    /// attempted listener, in execution order.
    ///
    /// Fails only when a predicate pattern throws during matching; handler,
    /// middleware, and timeout failures are isolated per listener and
    /// reported in the results.
    pub async fn emit(&self, event: &SemanticEvent) -> Result<Vec<ExecutionResult>, DispatchError> {
        // Snapshot: listeners registered after this point miss this wave.
        let candidates = self.store_read().candidates(event.type_discriminator());
        if let Some(telemetry) = &self.config.telemetry {
            telemetry.on_emit(event, candidates.len());
        }

        // Matching is read-only, so candidates are evaluated concurrently.
        // A failed predicate aborts the whole pass.
        let verdicts =
            future::try_join_all(candidates.iter().map(|l| matcher::matches(event, l))).await?;
        let mut matched: Vec<Arc<Listener>> = candidates
            .into_iter()
            .zip(verdicts)
            .filter_map(|(listener, hit)| hit.then_some(listener))
            .collect();
        // Stable sort: equal priorities keep registration order.
        matched.sort_by_key(|l| std::cmp::Reverse(l.options.priority));

        let mut results = Vec::with_capacity(matched.len());
        let mut deferred_removals = Vec::new();
        for listener in &matched {
            self.run_listener(event, listener, &mut results, &mut deferred_removals)
                .await;
        }

        // Apply removals only after the full pass; the snapshot above makes
        // this safe against concurrent emits.
        if !deferred_removals.is_empty() {
            let mut store = self.store_write();
            for id in deferred_removals {
                store.remove(id);
            }
        }

        Ok(results)
    }

    /// Execute one matched listener: before middleware, the handler racing
    /// its timeout, then after middleware. Failures are isolated here; this
    /// never propagates.
    async fn run_listener(
        &self,
        event: &SemanticEvent,
        listener: &Arc<Listener>,
        results: &mut Vec<ExecutionResult>,
        deferred_removals: &mut Vec<ListenerId>,
    ) {
        let options = &listener.options;
        if listener.exhausted() {
            // Raced with another pass past its budget: no result entry.
            deferred_removals.push(listener.id);
            return;
        }

        if let Some(telemetry) = &self.config.telemetry {
            telemetry.on_handler_start(listener.id);
        }

        // Before middleware transforms this listener's copy of the event;
        // the original stays untouched for the rest of the pass.
        let delivered = match &options.before {
            Some(before) => match before(event.clone()).await {
                Ok(transformed) => transformed,
                Err(error) => {
                    self.notify_error(listener, &error);
                    results.push(ExecutionResult::failed(listener.id, &error));
                    if options.remove_on_error {
                        deferred_removals.push(listener.id);
                    }
                    return;
                }
            },
            None => event.clone(),
        };

        // The handler runs as its own task so a timeout abandons it rather
        // than cancelling it: the task keeps running detached and its
        // eventual outcome is discarded.
        let handler = Arc::clone(&listener.handler);
        let input = delivered.clone();
        let task = tokio::spawn(async move { handler(input).await });
        let timeout = options.timeout.unwrap_or(self.config.default_timeout);

        match tokio::time::timeout(timeout, task).await {
            Err(_elapsed) => {
                if let Some(telemetry) = &self.config.telemetry {
                    telemetry.on_handler_timeout(listener.id, timeout);
                }
                let error: BoxError = Box::new(TimeoutElapsed { timeout });
                self.notify_error(listener, &error);
                results.push(ExecutionResult::timed_out(listener.id));
                if options.remove_on_timeout {
                    deferred_removals.push(listener.id);
                }
            }
            Ok(Err(join_error)) => {
                // The handler task panicked.
                let error: BoxError = Box::new(join_error);
                if let Some(telemetry) = &self.config.telemetry {
                    telemetry.on_handler_error(listener.id, &error);
                }
                self.notify_error(listener, &error);
                results.push(ExecutionResult::failed(listener.id, &error));
                if options.remove_on_error {
                    deferred_removals.push(listener.id);
                }
            }
            Ok(Ok(Err(error))) => {
                if let Some(telemetry) = &self.config.telemetry {
                    telemetry.on_handler_error(listener.id, &error);
                }
                self.notify_error(listener, &error);
                results.push(ExecutionResult::failed(listener.id, &error));
                if options.remove_on_error {
                    deferred_removals.push(listener.id);
                }
            }
            Ok(Ok(Ok(value))) => {
                let count = listener.record_execution();

                match &options.after {
                    Some(after) => match after(delivered, value.clone()).await {
                        Ok(()) => {
                            if let Some(telemetry) = &self.config.telemetry {
                                telemetry.on_handler_success(listener.id);
                            }
                            results.push(ExecutionResult::ok(listener.id, value));
                        }
                        Err(error) => {
                            // The handler's side effects already happened
                            // and are not rolled back; the failure is
                            // surfaced anyway.
                            self.notify_error(listener, &error);
                            results.push(ExecutionResult::failed_after(
                                listener.id,
                                value,
                                &error,
                            ));
                        }
                    },
                    None => {
                        if let Some(telemetry) = &self.config.telemetry {
                            telemetry.on_handler_success(listener.id);
                        }
                        results.push(ExecutionResult::ok(listener.id, value));
                    }
                }

                if options.max_executions.is_some_and(|max| count >= max) {
                    deferred_removals.push(listener.id);
                }
            }
        }
    }

    /// Report a per-listener failure through its `on_error` callback, or
    /// the log when it has none.
    fn notify_error(&self, listener: &Listener, error: &BoxError) {
        match &listener.options.on_error {
            Some(on_error) => on_error(listener.id, error),
            None => tracing::warn!(listener = %listener.id, %error, "listener failed"),
        }
    }

    fn store_read(&self) -> RwLockReadGuard<'_, ListenerStore> {
        self.store.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn store_write(&self) -> RwLockWriteGuard<'_, ListenerStore> {
        self.store.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.config)
            .field("listeners", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::handler_fn;
    use semroute_core::{Entity, EventMetadata};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn order_created() -> SemanticEvent {
        SemanticEvent::new(Entity::new("Order").with_id("o-1"))
            .with_metadata(EventMetadata::action("created"))
    }

    #[test]
    fn register_enforces_regex_complexity() {
        let registry = Registry::new(RegistryConfig {
            max_regex_complexity: 3,
            ..RegistryConfig::default()
        });

        let err = registry
            .on(
                Pattern::regex(r"^(Order|Invoice)\.cre.*$").unwrap(),
                handler_fn(|_| async { Ok(Value::Null) }),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            RegisterError::PatternTooComplex { score: 9, max: 3 }
        ));

        registry
            .on(
                Pattern::regex("Order").unwrap(),
                handler_fn(|_| async { Ok(Value::Null) }),
            )
            .unwrap();
    }

    #[tokio::test]
    async fn off_removes_and_reports() {
        let registry = Registry::default();
        let id = registry
            .on(
                Pattern::literal("Order.created"),
                handler_fn(|_| async { Ok(Value::Null) }),
            )
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.off(id));
        assert!(!registry.off(id));
        assert!(registry.emit(&order_created()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn emit_reports_handler_result() {
        let registry = Registry::default();
        registry
            .on(
                Pattern::literal("Order.created"),
                handler_fn(|event| async move {
                    Ok(json!({ "seen": event.type_discriminator() }))
                }),
            )
            .unwrap();

        let results = registry.emit(&order_created()).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].success);
        assert_eq!(results[0].result, Some(json!({ "seen": "Order" })));
        assert!(!results[0].timed_out);
    }

    #[tokio::test]
    async fn handler_error_is_isolated() {
        let registry = Registry::default();
        let ran = Arc::new(AtomicUsize::new(0));
        let ran2 = ran.clone();

        registry
            .register(
                Pattern::literal("Order.created"),
                handler_fn(|_| async { Err("broken".into()) }),
                ListenerOptions::new().priority(1),
            )
            .unwrap();
        registry
            .register(
                Pattern::literal("Order.created"),
                handler_fn(move |_| {
                    let ran = ran2.clone();
                    async move {
                        ran.fetch_add(1, Ordering::SeqCst);
                        Ok(Value::Null)
                    }
                }),
                ListenerOptions::new(),
            )
            .unwrap();

        let results = registry.emit(&order_created()).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(!results[0].success);
        assert_eq!(results[0].error.as_deref(), Some("broken"));
        assert!(results[1].success);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn before_failure_skips_handler() {
        let registry = Registry::default();
        let ran = Arc::new(AtomicUsize::new(0));
        let ran2 = ran.clone();

        registry
            .register(
                Pattern::literal("Order.created"),
                handler_fn(move |_| {
                    let ran = ran2.clone();
                    async move {
                        ran.fetch_add(1, Ordering::SeqCst);
                        Ok(Value::Null)
                    }
                }),
                ListenerOptions::new().before(|_| async { Err("gate".into()) }),
            )
            .unwrap();

        let results = registry.emit(&order_created()).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(!results[0].success);
        assert_eq!(results[0].error.as_deref(), Some("gate"));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn after_failure_reported_but_execution_counted() {
        let registry = Registry::default();
        let id = registry
            .register(
                Pattern::literal("Order.created"),
                handler_fn(|_| async { Ok(json!(1)) }),
                ListenerOptions::new().after(|_, _| async { Err("metric sink down".into()) }),
            )
            .unwrap();

        let results = registry.emit(&order_created()).await.unwrap();
        assert!(!results[0].success);
        assert_eq!(results[0].result, Some(json!(1)));
        assert_eq!(results[0].error.as_deref(), Some("metric sink down"));
        assert!(!results[0].timed_out);
        let _ = id;
    }

    #[tokio::test]
    async fn panicking_handler_is_a_handler_error() {
        let registry = Registry::default();
        registry
            .on(
                Pattern::literal("Order.created"),
                handler_fn(|_| async { panic!("boom") }),
            )
            .unwrap();

        let results = registry.emit(&order_created()).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(!results[0].success);
        assert!(!results[0].timed_out);
        assert!(results[0].error.is_some());
    }
}
