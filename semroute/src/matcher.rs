//! The matching algorithm: does a listener fire for an event?
//!
//! Matching is two-phase: the pattern decides first, then the shallow field
//! filters narrow the result. Both phases are read-only and side-effect
//! free, so the dispatcher evaluates candidates concurrently.

use semroute_core::{
    DispatchError, Entity, EventMetadata, FieldFilter, Filters, Location, LiteralParts, Pattern,
    SemanticEvent, field_filter_matches,
};

use crate::listener::Listener;

/// Decide whether `listener` fires for `event`.
///
/// Async because predicate patterns may be async. A predicate failure maps
/// to [`DispatchError::Matcher`] and aborts the caller's whole dispatch
/// pass: a broken matcher cannot be trusted to gate any listener.
pub(crate) async fn matches(
    event: &SemanticEvent,
    listener: &Listener,
) -> Result<bool, DispatchError> {
    if !pattern_matches(event, listener).await? {
        return Ok(false);
    }
    Ok(filters_match(&listener.options.filters, event))
}

async fn pattern_matches(event: &SemanticEvent, listener: &Listener) -> Result<bool, DispatchError> {
    match &listener.pattern {
        Pattern::Literal(path) => Ok(literal_matches(path, event)),
        Pattern::Regex(regex) => Ok(event
            .semantic_path()
            .is_some_and(|path| regex.is_match(&path))),
        Pattern::Predicate(predicate) => {
            predicate(event)
                .await
                .map_err(|source| DispatchError::Matcher {
                    listener_id: listener.id.to_string(),
                    source,
                })
        }
    }
}

/// Literal `subject[.predicate[.object]]` matching.
///
/// An event without a type discriminator never matches a literal pattern.
/// An absent subject segment accepts any subject. A pattern that names a
/// predicate segment requires the event to carry an action; an action-less
/// event is logged as a data-quality signal and treated as no match, never
/// as an error.
fn literal_matches(path: &str, event: &SemanticEvent) -> bool {
    let Some(event_type) = event.type_discriminator() else {
        return false;
    };
    let parts = LiteralParts::parse(path);

    if parts.subject.is_some_and(|subject| subject != event_type) {
        return false;
    }
    if let Some(predicate) = parts.predicate {
        match event.resolved_action() {
            Some(action) => {
                if predicate != action {
                    return false;
                }
            }
            None => {
                tracing::warn!(
                    pattern = %path,
                    event_type,
                    "pattern expects an action but the event carries none; treating as no match"
                );
                return false;
            }
        }
    }
    if let Some(object) = parts.object {
        if event.object_discriminator() != Some(object) {
            return false;
        }
    }
    true
}

/// Evaluate every configured field filter; all must pass.
fn filters_match(filters: &Filters, event: &SemanticEvent) -> bool {
    if let Some(filter) = &filters.who {
        if !event.who.as_ref().is_some_and(|who| entity_matches(filter, who)) {
            return false;
        }
    }
    if let Some(filter) = &filters.location {
        if !event
            .location
            .as_ref()
            .is_some_and(|location| location_matches(filter, location))
        {
            return false;
        }
    }
    if let Some(filter) = &filters.digital {
        if !event
            .location
            .as_ref()
            .and_then(|location| location.digital.as_ref())
            .is_some_and(|digital| field_filter_matches(filter, digital))
        {
            return false;
        }
    }
    if let Some(filter) = &filters.why {
        if !event.why.as_ref().is_some_and(|why| field_filter_matches(filter, why)) {
            return false;
        }
    }
    if let Some(filter) = &filters.how {
        if !event.how.as_ref().is_some_and(|how| field_filter_matches(filter, how)) {
            return false;
        }
    }
    if let Some(filter) = &filters.metadata {
        if !event
            .metadata
            .as_ref()
            .is_some_and(|metadata| metadata_matches(filter, metadata))
        {
            return false;
        }
    }
    true
}

/// Entity filters see `$type`/`type` and `id` alongside the free-form
/// fields.
fn entity_matches(filter: &FieldFilter, entity: &Entity) -> bool {
    filter.iter().all(|(key, expected)| match key.as_str() {
        "$type" | "type" => entity
            .entity_type
            .as_deref()
            .is_some_and(|t| expected.matches_str(t)),
        "id" => entity.id.as_deref().is_some_and(|i| expected.matches_str(i)),
        _ => entity
            .fields
            .get(key)
            .is_some_and(|value| expected.matches(value)),
    })
}

/// Location filters see the free-form fields; `digital` has its own filter.
fn location_matches(filter: &FieldFilter, location: &Location) -> bool {
    filter.iter().all(|(key, expected)| {
        location
            .fields
            .get(key)
            .is_some_and(|value| expected.matches(value))
    })
}

/// Metadata filters see `action` and `verb` alongside the free-form fields.
fn metadata_matches(filter: &FieldFilter, metadata: &EventMetadata) -> bool {
    filter.iter().all(|(key, expected)| match key.as_str() {
        "action" => metadata
            .action
            .as_deref()
            .is_some_and(|a| expected.matches_str(a)),
        "verb" => metadata
            .verb
            .as_deref()
            .is_some_and(|v| expected.matches_str(v)),
        _ => metadata
            .fields
            .get(key)
            .is_some_and(|value| expected.matches(value)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::{ListenerOptions, handler_fn};
    use semroute_core::{EventMetadata, Filters};
    use serde_json::{Value, json};

    fn listener_with(pattern: Pattern, options: ListenerOptions) -> Listener {
        Listener::new(pattern, handler_fn(|_| async { Ok(Value::Null) }), options)
    }

    fn order_created() -> SemanticEvent {
        SemanticEvent::new(Entity::new("Order").with_id("o-1"))
            .with_metadata(EventMetadata::action("created"))
    }

    #[tokio::test]
    async fn literal_exact_match() {
        let l = listener_with(Pattern::literal("Order.created"), ListenerOptions::new());
        assert!(matches(&order_created(), &l).await.unwrap());

        let l = listener_with(Pattern::literal("Order.updated"), ListenerOptions::new());
        assert!(!matches(&order_created(), &l).await.unwrap());

        let l = listener_with(Pattern::literal("User.created"), ListenerOptions::new());
        assert!(!matches(&order_created(), &l).await.unwrap());
    }

    #[tokio::test]
    async fn subject_only_and_wildcard_subject() {
        let l = listener_with(Pattern::literal("Order"), ListenerOptions::new());
        assert!(matches(&order_created(), &l).await.unwrap());

        let l = listener_with(Pattern::literal(".created"), ListenerOptions::new());
        assert!(matches(&order_created(), &l).await.unwrap());
    }

    #[tokio::test]
    async fn actionless_event_fails_predicate_segment() {
        let event = SemanticEvent::new(Entity::new("Order"));
        let l = listener_with(Pattern::literal("Order.created"), ListenerOptions::new());
        assert!(!matches(&event, &l).await.unwrap());

        // subject-only patterns still match
        let l = listener_with(Pattern::literal("Order"), ListenerOptions::new());
        assert!(matches(&event, &l).await.unwrap());
    }

    #[tokio::test]
    async fn typeless_event_matches_predicates_only() {
        let event = SemanticEvent::new(Entity::default())
            .with_metadata(EventMetadata::action("created"));

        let l = listener_with(Pattern::literal("Order.created"), ListenerOptions::new());
        assert!(!matches(&event, &l).await.unwrap());

        let l = listener_with(
            Pattern::regex("created").unwrap(),
            ListenerOptions::new(),
        );
        assert!(!matches(&event, &l).await.unwrap());

        let l = listener_with(Pattern::predicate(|_| true), ListenerOptions::new());
        assert!(matches(&event, &l).await.unwrap());
    }

    #[tokio::test]
    async fn object_segment_requires_object_discriminator() {
        let l = listener_with(
            Pattern::literal("Order.created.Invoice"),
            ListenerOptions::new(),
        );
        assert!(!matches(&order_created(), &l).await.unwrap());

        let event = SemanticEvent::new(
            Entity::new("Order").with_object(Entity::new("Invoice")),
        )
        .with_metadata(EventMetadata::action("created"));
        assert!(matches(&event, &l).await.unwrap());
    }

    #[tokio::test]
    async fn regex_runs_against_semantic_path() {
        let l = listener_with(
            Pattern::regex(r"^Order\.(created|updated)$").unwrap(),
            ListenerOptions::new(),
        );
        assert!(matches(&order_created(), &l).await.unwrap());

        let event = SemanticEvent::new(Entity::new("Order"))
            .with_metadata(EventMetadata::action("deleted"));
        assert!(!matches(&event, &l).await.unwrap());
    }

    #[tokio::test]
    async fn predicate_error_propagates() {
        let l = listener_with(
            Pattern::try_predicate(|_| Err("boom".into())),
            ListenerOptions::new(),
        );
        let err = matches(&order_created(), &l).await.unwrap_err();
        assert!(matches!(err, DispatchError::Matcher { .. }));
    }

    fn total_exceeds_1000(
        event: &SemanticEvent,
    ) -> futures::future::BoxFuture<'_, Result<bool, semroute_core::BoxError>> {
        let big = event
            .what
            .fields
            .get("total")
            .and_then(Value::as_i64)
            .is_some_and(|t| t > 1000);
        Box::pin(async move { Ok(big) })
    }

    #[tokio::test]
    async fn async_predicate_is_awaited() {
        let l = listener_with(Pattern::predicate_async(total_exceeds_1000), ListenerOptions::new());

        let small = SemanticEvent::new(Entity::new("Order").with_field("total", 50));
        let large = SemanticEvent::new(Entity::new("Order").with_field("total", 5000));
        assert!(!matches(&small, &l).await.unwrap());
        assert!(matches(&large, &l).await.unwrap());
    }

    #[tokio::test]
    async fn who_filter_sees_type_and_id() {
        let event = order_created().with_who(
            Entity::new("User").with_id("u-1").with_field("role", "admin"),
        );

        let l = listener_with(
            Pattern::literal("Order.created"),
            ListenerOptions::new()
                .filters(Filters::new().who("id", "u-1").who("role", "admin")),
        );
        assert!(matches(&event, &l).await.unwrap());

        let l = listener_with(
            Pattern::literal("Order.created"),
            ListenerOptions::new().filters(Filters::new().who("id", "u-2")),
        );
        assert!(!matches(&event, &l).await.unwrap());

        // filter on who with no who on the event
        let l = listener_with(
            Pattern::literal("Order.created"),
            ListenerOptions::new().filters(Filters::new().who("id", "u-1")),
        );
        assert!(!matches(&order_created(), &l).await.unwrap());
    }

    #[tokio::test]
    async fn filter_comparison_is_strictly_typed() {
        let event = order_created().with_how(
            json!({ "attempts": 5 }).as_object().cloned().unwrap(),
        );

        let l = listener_with(
            Pattern::literal("Order.created"),
            ListenerOptions::new().filters(Filters::new().how("attempts", 5)),
        );
        assert!(matches(&event, &l).await.unwrap());

        let l = listener_with(
            Pattern::literal("Order.created"),
            ListenerOptions::new().filters(Filters::new().how("attempts", "5")),
        );
        assert!(!matches(&event, &l).await.unwrap());
    }

    #[tokio::test]
    async fn digital_location_filter() {
        let event = order_created().with_location(
            Location::default()
                .with_field("store", "berlin")
                .with_digital("host", "api.example.com"),
        );

        let l = listener_with(
            Pattern::literal("Order.created"),
            ListenerOptions::new().filters(
                Filters::new()
                    .location("store", "berlin")
                    .digital("host", "api.example.com"),
            ),
        );
        assert!(matches(&event, &l).await.unwrap());

        let l = listener_with(
            Pattern::literal("Order.created"),
            ListenerOptions::new().filters(Filters::new().digital("host", "other")),
        );
        assert!(!matches(&event, &l).await.unwrap());
    }

    #[tokio::test]
    async fn metadata_filter_sees_action_and_fields() {
        let event = SemanticEvent::new(Entity::new("Order")).with_metadata(
            EventMetadata::action("created").with_field("source", "api"),
        );

        let l = listener_with(
            Pattern::literal("Order"),
            ListenerOptions::new().filters(
                Filters::new()
                    .metadata("action", "created")
                    .metadata("source", "api"),
            ),
        );
        assert!(matches(&event, &l).await.unwrap());
    }
}
