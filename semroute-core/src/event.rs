//! The semantic event model.
//!
//! Every occurrence in the system is described by a [`SemanticEvent`]: an
//! immutable record answering *who* did *what*, *when*, *where*, *why*, and
//! *how*, plus free-form metadata carrying the event's action verb.
//!
//! Events are never mutated after construction. The dispatcher hands each
//! handler its own copy, so a `before` middleware can transform one
//! listener's view of an event without affecting any other listener.
//!
//! # The JSON boundary
//!
//! Producers in the surrounding system ship events as JSON.
//! [`SemanticEvent::from_json`] is the typed boundary: a value without an
//! object-shaped `what` is rejected there, and a `SemanticEvent` is
//! well-formed by construction from then on. The dispatcher never
//! re-validates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::EventError;

/// A participant or subject in an event: the `who`, the `what`, or a nested
/// `what.object`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Domain type discriminator, e.g. `"Order"`. Serialized as `$type`;
    /// a plain `type` key is accepted on ingestion.
    #[serde(
        rename = "$type",
        alias = "type",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub entity_type: Option<String>,

    /// Optional local identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Nested object entity, when the event's subject acts on something.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<Box<Entity>>,

    /// Free-form fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Entity {
    /// Create an entity with the given type discriminator.
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: Some(entity_type.into()),
            ..Self::default()
        }
    }

    /// Set the local identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Attach a nested object entity.
    pub fn with_object(mut self, object: Entity) -> Self {
        self.object = Some(Box::new(object));
        self
    }

    /// Set a free-form field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// The `where` of an event: physical fields plus an optional `digital`
/// sub-record (host, url, session and the like).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Digital location fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digital: Option<Map<String, Value>>,

    /// Free-form location fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Location {
    /// Set a free-form location field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Set a digital location field.
    pub fn with_digital(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.digital
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }
}

/// Event metadata: the action verb plus free-form key/value pairs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// The event's action, e.g. `"created"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    /// Alternative spelling of the action; consulted when `action` is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verb: Option<String>,

    /// Free-form metadata fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl EventMetadata {
    /// Create metadata carrying the given action.
    pub fn action(action: impl Into<String>) -> Self {
        Self {
            action: Some(action.into()),
            ..Self::default()
        }
    }

    /// The resolved action: `action`, falling back to `verb`.
    pub fn resolved_action(&self) -> Option<&str> {
        self.action.as_deref().or(self.verb.as_deref())
    }

    /// Set a free-form metadata field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// An immutable structured record of an occurrence.
///
/// Only `what` is required. An event without a type discriminator on `what`,
/// or without a resolvable action on `metadata`, can still be emitted — it
/// just never matches a literal or regex pattern, only predicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticEvent {
    /// The actor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub who: Option<Entity>,

    /// The subject of the occurrence.
    pub what: Entity,

    /// When it happened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<DateTime<Utc>>,

    /// Where it happened.
    #[serde(rename = "where", default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,

    /// Why it happened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub why: Option<Map<String, Value>>,

    /// How it happened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub how: Option<Map<String, Value>>,

    /// Action verb and free-form metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<EventMetadata>,
}

impl SemanticEvent {
    /// Create an event about the given subject.
    pub fn new(what: Entity) -> Self {
        Self {
            who: None,
            what,
            when: None,
            location: None,
            why: None,
            how: None,
            metadata: None,
        }
    }

    /// Construct an event from untyped JSON.
    ///
    /// This is the only place a malformed event can be rejected; a typed
    /// `SemanticEvent` is well-formed by construction.
    pub fn from_json(value: Value) -> Result<Self, EventError> {
        let Value::Object(map) = &value else {
            return Err(EventError::NotAnObject { field: "event" });
        };
        match map.get("what") {
            None | Some(Value::Null) => return Err(EventError::MissingWhat),
            Some(Value::Object(_)) => {}
            Some(_) => return Err(EventError::NotAnObject { field: "what" }),
        }
        serde_json::from_value(value).map_err(|err| EventError::Malformed {
            message: err.to_string(),
        })
    }

    /// Set the actor.
    pub fn with_who(mut self, who: Entity) -> Self {
        self.who = Some(who);
        self
    }

    /// Set the timestamp.
    pub fn at(mut self, when: DateTime<Utc>) -> Self {
        self.when = Some(when);
        self
    }

    /// Set the location.
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Set the `why` record.
    pub fn with_why(mut self, why: Map<String, Value>) -> Self {
        self.why = Some(why);
        self
    }

    /// Set the `how` record.
    pub fn with_how(mut self, how: Map<String, Value>) -> Self {
        self.how = Some(how);
        self
    }

    /// Set the metadata record.
    pub fn with_metadata(mut self, metadata: EventMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// The subject's type discriminator, if any.
    pub fn type_discriminator(&self) -> Option<&str> {
        self.what.entity_type.as_deref()
    }

    /// The resolved action (`metadata.action`, falling back to
    /// `metadata.verb`), if any.
    pub fn resolved_action(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(|m| m.resolved_action())
    }

    /// The nested `what.object` discriminator, if any.
    pub fn object_discriminator(&self) -> Option<&str> {
        self.what
            .object
            .as_ref()
            .and_then(|o| o.entity_type.as_deref())
    }

    /// Synthesize the semantic path regex patterns are tested against:
    /// `"{subject}.{action}"`, extended with `".{object}"` when a nested
    /// object discriminator exists.
    ///
    /// `None` when the event lacks a type discriminator or an action; such
    /// events never match a regex pattern.
    pub fn semantic_path(&self) -> Option<String> {
        let subject = self.type_discriminator()?;
        let action = self.resolved_action()?;
        Some(match self.object_discriminator() {
            Some(object) => format!("{subject}.{action}.{object}"),
            None => format!("{subject}.{action}"),
        })
    }
}
