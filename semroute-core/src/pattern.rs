//! Registration-time patterns and their normalization.
//!
//! A listener selects events with one of three pattern kinds:
//!
//! - [`Pattern::Literal`] — an exact `subject[.predicate[.object]]` path,
//!   bucketed by its leading subject token for O(1) candidate lookup.
//! - [`Pattern::Regex`] — a regular expression tested against the event's
//!   synthesized semantic path (never the raw event serialization).
//! - [`Pattern::Predicate`] — an arbitrary (possibly async) predicate over
//!   the whole event.
//!
//! Regex patterns are admitted only below a configured complexity score,
//! computed by [`complexity_score`] at registration time.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use regex::Regex;

use crate::error::{BoxError, RegisterError};
use crate::event::SemanticEvent;

/// Type-erased predicate over an event. May resolve asynchronously.
pub type BoxPredicate =
    Arc<dyn for<'a> Fn(&'a SemanticEvent) -> BoxFuture<'a, Result<bool, BoxError>> + Send + Sync>;

/// Regex metacharacters counted by [`complexity_score`].
const METACHARACTERS: &[char] = &[
    '*', '+', '?', '{', '}', '[', ']', '(', ')', '|', '\\', '.', '^', '$',
];

/// Count the regex metacharacters in a pattern source.
///
/// This is a coarse admission heuristic, not a ReDoS detector: pathological
/// shapes like `(a+)+` score low while still backtracking catastrophically.
/// It bounds the obvious cases (huge alternations, deeply stacked
/// quantifiers) and nothing more.
pub fn complexity_score(source: &str) -> usize {
    source.chars().filter(|c| METACHARACTERS.contains(c)).count()
}

/// How a listener selects the events it fires for.
#[derive(Clone)]
pub enum Pattern {
    /// Exact `subject[.predicate[.object]]` path, matched case-sensitively.
    Literal(String),
    /// Regular expression over the synthesized semantic path.
    Regex(Regex),
    /// Arbitrary predicate over the whole event.
    Predicate(BoxPredicate),
}

impl Pattern {
    /// An exact-path pattern, stored verbatim.
    pub fn literal(path: impl Into<String>) -> Self {
        Self::Literal(path.into())
    }

    /// A regex pattern over the synthesized semantic path.
    ///
    /// Compilation failures surface here; the complexity cap is enforced at
    /// registration, where the registry's configuration is known.
    pub fn regex(source: &str) -> Result<Self, RegisterError> {
        Ok(Self::Regex(Regex::new(source)?))
    }

    /// A synchronous predicate pattern.
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&SemanticEvent) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(move |event| {
            let verdict = f(event);
            Box::pin(async move { Ok(verdict) })
        }))
    }

    /// A synchronous predicate pattern that may fail.
    ///
    /// A predicate failure is a programming error: it propagates out of the
    /// emit call and aborts the whole dispatch pass.
    pub fn try_predicate<F>(f: F) -> Self
    where
        F: Fn(&SemanticEvent) -> Result<bool, BoxError> + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(move |event| {
            let verdict = f(event);
            Box::pin(async move { verdict })
        }))
    }

    /// An asynchronous predicate pattern.
    pub fn predicate_async<F>(f: F) -> Self
    where
        F: for<'a> Fn(&'a SemanticEvent) -> BoxFuture<'a, Result<bool, BoxError>>
            + Send
            + Sync
            + 'static,
    {
        Self::Predicate(Arc::new(f))
    }

    /// The leading subject token of a literal pattern, used for bucketing.
    ///
    /// `None` for regex and predicate patterns, and for literal patterns
    /// whose subject segment is empty (an "any subject" pattern); those all
    /// live in the globally scanned list.
    pub fn subject_token(&self) -> Option<&str> {
        match self {
            Self::Literal(path) => {
                let subject = path.split('.').next().unwrap_or("");
                (!subject.is_empty()).then_some(subject)
            }
            Self::Regex(_) | Self::Predicate(_) => None,
        }
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(path) => f.debug_tuple("Literal").field(path).finish(),
            Self::Regex(re) => f.debug_tuple("Regex").field(&re.as_str()).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// The decomposed segments of a literal pattern.
///
/// Empty segments are `None`: a pattern of `".created"` constrains the
/// predicate but accepts any subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiteralParts<'a> {
    /// The subject segment, compared to the event's type discriminator.
    pub subject: Option<&'a str>,
    /// The predicate segment, compared to the event's resolved action.
    pub predicate: Option<&'a str>,
    /// The object segment, compared to the nested `what.object` discriminator.
    pub object: Option<&'a str>,
}

impl LiteralParts<'_> {
    /// Split a literal pattern into its segments.
    pub fn parse(path: &str) -> LiteralParts<'_> {
        fn non_empty(segment: Option<&str>) -> Option<&str> {
            segment.filter(|s| !s.is_empty())
        }

        let mut segments = path.splitn(3, '.');
        LiteralParts {
            subject: non_empty(segments.next()),
            predicate: non_empty(segments.next()),
            object: non_empty(segments.next()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Entity;

    #[test]
    fn complexity_counts_metacharacters() {
        assert_eq!(complexity_score("Order.created"), 1);
        assert_eq!(complexity_score("^(Order|Invoice)\\.cre.*$"), 9);
        assert_eq!(complexity_score("plain"), 0);
    }

    #[test]
    fn literal_parts_split_on_dots() {
        let parts = LiteralParts::parse("Order.created.Invoice");
        assert_eq!(parts.subject, Some("Order"));
        assert_eq!(parts.predicate, Some("created"));
        assert_eq!(parts.object, Some("Invoice"));

        let parts = LiteralParts::parse("Order");
        assert_eq!(parts.subject, Some("Order"));
        assert_eq!(parts.predicate, None);
        assert_eq!(parts.object, None);
    }

    #[test]
    fn empty_segments_are_wildcards() {
        let parts = LiteralParts::parse(".created");
        assert_eq!(parts.subject, None);
        assert_eq!(parts.predicate, Some("created"));
    }

    #[test]
    fn subject_token_only_for_bucketable_literals() {
        assert_eq!(
            Pattern::literal("Order.created").subject_token(),
            Some("Order")
        );
        assert_eq!(Pattern::literal(".created").subject_token(), None);
        assert_eq!(Pattern::regex("Order\\..*").unwrap().subject_token(), None);
        assert_eq!(Pattern::predicate(|_| true).subject_token(), None);
    }

    #[test]
    fn invalid_regex_is_rejected() {
        assert!(matches!(
            Pattern::regex("Order.(created"),
            Err(RegisterError::InvalidRegex(_))
        ));
    }

    #[tokio::test]
    async fn sync_predicate_is_wrapped() {
        let pattern = Pattern::predicate(|e| e.type_discriminator() == Some("Order"));
        let Pattern::Predicate(pred) = &pattern else {
            panic!("expected predicate pattern");
        };
        let event = crate::event::SemanticEvent::new(Entity::new("Order"));
        assert!(pred(&event).await.unwrap());
    }
}
