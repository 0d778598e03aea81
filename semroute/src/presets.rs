//! Pre-built predicate patterns for common selections.
//!
//! The surrounding system exposes vendor-specific trigger namespaces as
//! sugar over the registration primitive. Here they are ordinary named
//! functions returning a [`Pattern::Predicate`]; they add no semantics of
//! their own.

use semroute_core::{FilterValue, Pattern};
use serde_json::Value;

/// Match events whose resolved action equals `action`, regardless of
/// subject type.
pub fn action_is(action: impl Into<String>) -> Pattern {
    let action = action.into();
    Pattern::predicate(move |event| event.resolved_action() == Some(action.as_str()))
}

/// Match events whose metadata field `key` holds `value` (strictly typed).
pub fn metadata_field_equals(key: impl Into<String>, value: impl Into<FilterValue>) -> Pattern {
    let key = key.into();
    let value = value.into();
    Pattern::predicate(move |event| {
        event
            .metadata
            .as_ref()
            .and_then(|metadata| metadata.fields.get(&key))
            .is_some_and(|actual| value.matches(actual))
    })
}

/// Match events whose subject discriminator is one of `types`.
pub fn entity_type_in<I, S>(types: I) -> Pattern
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let types: Vec<String> = types.into_iter().map(Into::into).collect();
    Pattern::predicate(move |event| {
        event
            .type_discriminator()
            .is_some_and(|t| types.iter().any(|candidate| candidate == t))
    })
}

/// Match events carrying a `what` field `key` above `threshold`.
///
/// Covers the common "amount exceeds limit" trigger without a hand-written
/// closure at every call site.
pub fn subject_field_exceeds(key: impl Into<String>, threshold: f64) -> Pattern {
    let key = key.into();
    Pattern::predicate(move |event| {
        event
            .what
            .fields
            .get(&key)
            .and_then(Value::as_f64)
            .is_some_and(|actual| actual > threshold)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::handler_fn;
    use crate::registry::Registry;
    use semroute_core::{Entity, EventMetadata, SemanticEvent};
    use serde_json::json;

    #[tokio::test]
    async fn action_preset_ignores_subject() {
        let registry = Registry::default();
        registry
            .on(action_is("created"), handler_fn(|_| async { Ok(Value::Null) }))
            .unwrap();

        let order = SemanticEvent::new(Entity::new("Order"))
            .with_metadata(EventMetadata::action("created"));
        let user = SemanticEvent::new(Entity::new("User"))
            .with_metadata(EventMetadata::action("created"));
        let deleted = SemanticEvent::new(Entity::new("Order"))
            .with_metadata(EventMetadata::action("deleted"));

        assert_eq!(registry.emit(&order).await.unwrap().len(), 1);
        assert_eq!(registry.emit(&user).await.unwrap().len(), 1);
        assert_eq!(registry.emit(&deleted).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn metadata_preset_is_strictly_typed() {
        let registry = Registry::default();
        registry
            .on(
                metadata_field_equals("code", 7),
                handler_fn(|_| async { Ok(Value::Null) }),
            )
            .unwrap();

        let matching = SemanticEvent::new(Entity::new("Job"))
            .with_metadata(EventMetadata::default().with_field("code", 7));
        let coerced = SemanticEvent::new(Entity::new("Job"))
            .with_metadata(EventMetadata::default().with_field("code", "7"));

        assert_eq!(registry.emit(&matching).await.unwrap().len(), 1);
        assert_eq!(registry.emit(&coerced).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn threshold_preset_matches_large_subjects() {
        let registry = Registry::default();
        registry
            .on(
                subject_field_exceeds("total", 1000.0),
                handler_fn(|_| async { Ok(Value::Null) }),
            )
            .unwrap();

        let small = SemanticEvent::new(Entity::new("Order").with_field("total", 50));
        let large = SemanticEvent::new(Entity::new("Order").with_field("total", 5000));

        assert_eq!(registry.emit(&small).await.unwrap().len(), 0);
        assert_eq!(registry.emit(&large).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn type_set_preset() {
        let registry = Registry::default();
        registry
            .on(
                entity_type_in(["Order", "Invoice"]),
                handler_fn(|_| async { Ok(json!("seen")) }),
            )
            .unwrap();

        let invoice = SemanticEvent::new(Entity::new("Invoice"));
        let user = SemanticEvent::new(Entity::new("User"));

        assert_eq!(registry.emit(&invoice).await.unwrap().len(), 1);
        assert_eq!(registry.emit(&user).await.unwrap().len(), 0);
    }
}
