//! Error types for semroute.
//!
//! This module provides a structured error hierarchy using `thiserror`:
//!
//! - [`SemrouteError`] - Top-level error type for all semroute operations
//! - [`EventError`] - Errors constructing an event from untyped input
//! - [`RegisterError`] - Errors rejecting a listener at registration time
//! - [`DispatchError`] - Errors that abort a whole dispatch pass

use thiserror::Error;

/// A boxed error type for dynamic error handling.
///
/// Handler, middleware, and predicate failures all surface as `BoxError`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error type for all semroute operations.
#[derive(Error, Debug)]
pub enum SemrouteError {
    /// An event could not be constructed from untyped input.
    #[error("event error: {0}")]
    Event(#[from] EventError),

    /// A listener registration was rejected.
    #[error("registration error: {0}")]
    Register(#[from] RegisterError),

    /// A dispatch pass was aborted.
    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// A custom error occurred.
    #[error(transparent)]
    Custom(BoxError),
}

/// Errors constructing a [`SemanticEvent`] from untyped input.
///
/// A typed event is well-formed by construction, so these can only occur at
/// the JSON boundary ([`SemanticEvent::from_json`]).
///
/// [`SemanticEvent`]: crate::SemanticEvent
/// [`SemanticEvent::from_json`]: crate::SemanticEvent::from_json
#[derive(Error, Debug)]
pub enum EventError {
    /// The event carries no `what` field.
    #[error("event has no `what` field")]
    MissingWhat,

    /// A field that must be a JSON object is something else.
    #[error("event field `{field}` must be an object")]
    NotAnObject {
        /// Name of the offending field.
        field: &'static str,
    },

    /// The event shape did not deserialize.
    #[error("malformed event: {message}")]
    Malformed {
        /// Deserializer diagnostic.
        message: String,
    },
}

/// Errors rejecting a listener at registration time.
///
/// These are always raised synchronously from `register`; the caller must
/// fix the registration call.
#[derive(Error, Debug)]
pub enum RegisterError {
    /// The registry already holds its maximum number of listeners.
    #[error("listener capacity exceeded: registry holds the maximum of {max} listeners")]
    TotalCapacity {
        /// Configured total listener limit.
        max: usize,
    },

    /// The subject bucket for a literal pattern is full.
    #[error("listener capacity exceeded for subject `{subject}`: at most {max} listeners per pattern")]
    PatternCapacity {
        /// Leading subject token of the rejected pattern.
        subject: String,
        /// Configured per-pattern listener limit.
        max: usize,
    },

    /// The regex pattern's operator count exceeds the configured cap.
    #[error(
        "regex pattern too complex: score {score} exceeds the maximum of {max}; \
         simplify the expression or use a predicate pattern"
    )]
    PatternTooComplex {
        /// Metacharacter count of the rejected pattern.
        score: usize,
        /// Configured complexity cap.
        max: usize,
    },

    /// A filter value is a nested structure rather than a primitive.
    #[error(
        "filter `{field}.{key}` must be a primitive value; nested structures are \
         not supported, use a predicate pattern for structural matching"
    )]
    NestedFilter {
        /// Filterable field (`who`, `where`, ...) holding the bad value.
        field: &'static str,
        /// Key of the bad value inside that field.
        key: String,
    },

    /// A filter specification was not a JSON object.
    #[error("filter specification must be a JSON object, got {got}")]
    InvalidFilterSpec {
        /// JSON type actually encountered.
        got: &'static str,
    },

    /// The regex pattern failed to compile.
    #[error("invalid regex: {0}")]
    InvalidRegex(#[from] regex::Error),
}

/// Errors that abort a whole dispatch pass.
///
/// Individual handler and middleware failures are isolated per listener and
/// reported in the execution results; only a broken matcher aborts the pass,
/// because it cannot be trusted to correctly gate any listener.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// A predicate pattern threw while deciding a match.
    #[error("matcher failed for listener {listener_id}")]
    Matcher {
        /// Id of the listener whose predicate failed.
        listener_id: String,
        /// The predicate's failure.
        #[source]
        source: BoxError,
    },

    /// The event was malformed.
    #[error("event error: {0}")]
    Event(#[from] EventError),
}
