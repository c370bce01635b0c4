//! Reducer registry
//!
//! Built once at startup and handed to the orchestrator; immutable afterwards.

use super::note_version::NoteVersionReducer;
use super::traits::Reducer;
use crate::event::{EventType, RawEvent};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Immutable mapping from event type to reducer.
#[derive(Clone, Default)]
pub struct ReducerRegistry {
    reducers: HashMap<EventType, Arc<dyn Reducer>>,
}

impl ReducerRegistry {
    pub fn builder() -> ReducerRegistryBuilder {
        ReducerRegistryBuilder::default()
    }

    /// Registry with every reducer this crate ships.
    pub fn default_registry() -> Self {
        Self::builder()
            .register(Arc::new(NoteVersionReducer::new()))
            .build()
    }

    /// Reducer for a known event type.
    pub fn get(&self, event_type: EventType) -> Option<&Arc<dyn Reducer>> {
        self.reducers.get(&event_type)
    }

    /// Reducer for a stored raw event. `None` for event types this build does
    /// not know and for known types with nothing registered.
    pub fn for_raw_event(&self, raw_event: &RawEvent) -> Option<&Arc<dyn Reducer>> {
        raw_event.known_event_type().and_then(|t| self.get(t))
    }

    pub fn len(&self) -> usize {
        self.reducers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reducers.is_empty()
    }
}

/// Collects reducers before freezing them into a [`ReducerRegistry`].
#[derive(Default)]
pub struct ReducerRegistryBuilder {
    reducers: HashMap<EventType, Arc<dyn Reducer>>,
}

impl ReducerRegistryBuilder {
    /// Add a reducer. A later registration for the same event type replaces
    /// the earlier one.
    pub fn register(mut self, reducer: Arc<dyn Reducer>) -> Self {
        let event_type = reducer.event_type();
        if let Some(previous) = self.reducers.insert(event_type, reducer) {
            warn!(
                event_type = %event_type,
                replaced_version = previous.version(),
                "reducer registered twice, keeping the later one"
            );
        }
        self
    }

    pub fn build(self) -> ReducerRegistry {
        ReducerRegistry {
            reducers: self.reducers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineResult;
    use crate::event::SemanticEventCandidate;
    use chrono::Utc;
    use rusqlite::Connection;
    use serde_json::json;

    struct FixedReducer {
        version: &'static str,
    }

    impl Reducer for FixedReducer {
        fn event_type(&self) -> EventType {
            EventType::NoteVersionCreated
        }

        fn version(&self) -> &str {
            self.version
        }

        fn reduce(&self, raw_event: &RawEvent, _conn: &Connection) -> PipelineResult<SemanticEventCandidate> {
            Ok(SemanticEventCandidate {
                event_type: EventType::NoteVersionCreated,
                workspace_id: raw_event.workspace_id,
                occurred_at: raw_event.occurred_at,
                reducer_version: self.version.to_string(),
                raw_event_ids: vec![raw_event.id],
                payload: json!({}),
                unique_hash: String::new(),
            })
        }
    }

    fn raw_event(event_type: &str) -> RawEvent {
        RawEvent {
            id: 1,
            occurred_at: Utc::now(),
            ingested_at: None,
            source_id: 1,
            workspace_id: 1,
            event_type: event_type.to_string(),
            event_version: 1,
            payload: json!({}),
            source_event_id: "1".to_string(),
        }
    }

    #[test]
    fn default_registry_handles_note_versions() {
        let registry = ReducerRegistry::default_registry();
        assert_eq!(registry.len(), 1);
        let reducer = registry.get(EventType::NoteVersionCreated).unwrap();
        assert_eq!(reducer.version(), "1.0.0");
    }

    #[test]
    fn later_registration_wins() {
        let registry = ReducerRegistry::builder()
            .register(Arc::new(FixedReducer { version: "a" }))
            .register(Arc::new(FixedReducer { version: "b" }))
            .build();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(EventType::NoteVersionCreated).unwrap().version(), "b");
    }

    #[test]
    fn unknown_event_type_has_no_reducer() {
        let registry = ReducerRegistry::default_registry();
        assert!(registry.for_raw_event(&raw_event("note.archived")).is_none());
        assert!(registry.for_raw_event(&raw_event("note_version.created")).is_some());
    }

    #[test]
    fn empty_registry_skips_known_types() {
        let registry = ReducerRegistry::builder().build();
        assert!(registry.is_empty());
        assert!(registry.for_raw_event(&raw_event("note_version.created")).is_none());
    }
}
