#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use semroute::{Entity, EventMetadata, Handler, SemanticEvent, handler_fn};
use serde_json::{Value, json};

// ============================================================================
// Test Events
// ============================================================================

pub fn order_event(action: &str) -> SemanticEvent {
    SemanticEvent::new(Entity::new("Order").with_id("o-1"))
        .with_metadata(EventMetadata::action(action))
}

pub fn order_with_total(total: i64) -> SemanticEvent {
    SemanticEvent::new(Entity::new("Order").with_id("o-1").with_field("total", total))
        .with_metadata(EventMetadata::action("created"))
}

pub fn user_event(action: &str) -> SemanticEvent {
    SemanticEvent::new(Entity::new("User").with_id("u-1"))
        .with_metadata(EventMetadata::action(action))
}

// ============================================================================
// Test Handlers
// ============================================================================

pub fn counting_handler(count: Arc<AtomicUsize>) -> Handler {
    handler_fn(move |_| {
        let count = count.clone();
        async move {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Null)
        }
    })
}

pub fn recording_handler(label: &'static str, order: Arc<Mutex<Vec<&'static str>>>) -> Handler {
    handler_fn(move |_| {
        let order = order.clone();
        async move {
            order.lock().unwrap().push(label);
            Ok(json!(label))
        }
    })
}

pub fn slow_handler(delay: Duration) -> Handler {
    handler_fn(move |_| async move {
        tokio::time::sleep(delay).await;
        Ok(json!("slow done"))
    })
}

pub fn null_handler() -> Handler {
    handler_fn(|_| async { Ok(Value::Null) })
}
