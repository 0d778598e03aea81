//! The indexed listener collection.
//!
//! Literal patterns with a concrete subject token are bucketed by that token
//! so a dispatch pass only inspects listeners that could possibly match.
//! Regex patterns, predicate patterns, and "any subject" literals cannot be
//! indexed cheaply; they live in a single global list scanned for every
//! event.

use std::collections::HashMap;
use std::sync::Arc;

use semroute_core::RegisterError;

use crate::config::RegistryConfig;
use crate::listener::{Listener, ListenerId};

#[derive(Default)]
pub(crate) struct ListenerStore {
    /// Literal-pattern listeners, keyed by leading subject token.
    buckets: HashMap<String, Vec<Arc<Listener>>>,
    /// Regex, predicate, and subject-less literal listeners; scanned for
    /// every event.
    global: Vec<Arc<Listener>>,
    total: usize,
}

impl ListenerStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Insert a listener, enforcing the total cap first and the per-subject
    /// cap for bucketed literals.
    pub(crate) fn insert(
        &mut self,
        listener: Arc<Listener>,
        config: &RegistryConfig,
    ) -> Result<(), RegisterError> {
        if self.total >= config.max_total_listeners {
            return Err(RegisterError::TotalCapacity {
                max: config.max_total_listeners,
            });
        }

        match listener.pattern().subject_token() {
            Some(subject) => {
                let bucket = self.buckets.entry(subject.to_string()).or_default();
                if bucket.len() >= config.max_listeners_per_pattern {
                    return Err(RegisterError::PatternCapacity {
                        subject: subject.to_string(),
                        max: config.max_listeners_per_pattern,
                    });
                }
                bucket.push(listener);
            }
            None => self.global.push(listener),
        }
        self.total += 1;
        Ok(())
    }

    /// Remove a listener by id. Idempotent.
    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let mut removed = false;
        self.buckets.retain(|_, bucket| {
            let before = bucket.len();
            bucket.retain(|l| l.id() != id);
            removed |= bucket.len() < before;
            !bucket.is_empty()
        });
        if !removed {
            let before = self.global.len();
            self.global.retain(|l| l.id() != id);
            removed = self.global.len() < before;
        }
        if removed {
            self.total -= 1;
        }
        removed
    }

    /// Remove every listener registered under `group`; returns the count.
    pub(crate) fn remove_group(&mut self, group: &str) -> usize {
        let in_group =
            |l: &Arc<Listener>| l.options().group.as_deref() == Some(group);

        let mut removed = 0;
        self.buckets.retain(|_, bucket| {
            let before = bucket.len();
            bucket.retain(|l| !in_group(l));
            removed += before - bucket.len();
            !bucket.is_empty()
        });
        let before = self.global.len();
        self.global.retain(|l| !in_group(l));
        removed += before - self.global.len();

        self.total -= removed;
        removed
    }

    pub(crate) fn clear(&mut self) {
        self.buckets.clear();
        self.global.clear();
        self.total = 0;
    }

    pub(crate) fn len(&self) -> usize {
        self.total
    }

    /// The complete candidate set for an event: its subject bucket (if the
    /// event has a type discriminator) concatenated with the global list.
    /// Filtering down to actual matches is the matcher's job.
    pub(crate) fn candidates(&self, subject: Option<&str>) -> Vec<Arc<Listener>> {
        let bucket = subject
            .and_then(|s| self.buckets.get(s))
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut candidates = Vec::with_capacity(bucket.len() + self.global.len());
        candidates.extend(bucket.iter().cloned());
        candidates.extend(self.global.iter().cloned());
        candidates
    }
}
