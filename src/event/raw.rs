//! Raw events: immutable ledger rows mirrored from the domain source

use super::types::EventType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A captured domain change as stored in the ledger.
///
/// `ingested_at` is `None` until the semantic reducer has handled the event.
/// The event type is kept as the stored string so rows written with types
/// this build does not know still load; see [`RawEvent::known_event_type`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub id: i64,
    pub occurred_at: DateTime<Utc>,
    pub ingested_at: Option<DateTime<Utc>>,
    pub source_id: i64,
    pub workspace_id: i64,
    pub event_type: String,
    pub event_version: i64,
    pub payload: Value,
    pub source_event_id: String,
}

impl RawEvent {
    /// The event type, if it names a variant of [`EventType`].
    pub fn known_event_type(&self) -> Option<EventType> {
        self.event_type.parse().ok()
    }

    /// True once the reducer has marked this event processed.
    pub fn is_processed(&self) -> bool {
        self.ingested_at.is_some()
    }
}

/// A raw event about to be appended to the ledger.
///
/// There is no `ingested_at` field: every raw event starts unprocessed.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRawEvent {
    pub source_id: i64,
    pub workspace_id: i64,
    pub event_type: EventType,
    pub event_version: i64,
    pub payload: Value,
    pub occurred_at: DateTime<Utc>,
    /// Stringified primary key of the domain row
    pub source_event_id: String,
}
