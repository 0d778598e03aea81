//! # semroute-core
//!
//! Core types for the semroute event dispatch registry.
//!
//! This crate has minimal dependencies and is designed to be imported by
//! event producers that only need to construct [`SemanticEvent`]s without
//! pulling in the dispatch machinery from the `semroute` crate.
//!
//! # What lives here
//!
//! - [`SemanticEvent`] — the immutable who/what/when/where/why/how record
//!   all dispatch operates on, with its typed JSON boundary
//!   ([`SemanticEvent::from_json`]).
//! - [`Pattern`] — the three registration-time selectors: literal path,
//!   regex over the synthesized semantic path, and arbitrary predicate.
//!   [`complexity_score`] is the regex admission heuristic.
//! - [`Filters`] — shallow, strictly-typed field filters; nested structures
//!   are unrepresentable by construction.
//! - The error hierarchy: [`SemrouteError`], [`EventError`],
//!   [`RegisterError`], [`DispatchError`], and the [`BoxError`] alias used
//!   for handler and predicate failures.

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

mod error;
mod event;
mod filter;
mod pattern;

pub use error::{BoxError, DispatchError, EventError, RegisterError, SemrouteError};
pub use event::{Entity, EventMetadata, Location, SemanticEvent};
pub use filter::{FieldFilter, FilterValue, Filters, field_filter_matches};
pub use pattern::{BoxPredicate, LiteralParts, Pattern, complexity_score};
