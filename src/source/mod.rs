//! Read-only access to domain tables that capture mirrors into the ledger

mod note_versions;

pub use note_versions::{NoteVersion, NoteVersionSource};

use crate::error::PipelineResult;
use crate::event::{EventType, SourceSystem, SourceType};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde_json::Value;

/// One domain row, ready to become a raw event.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    /// Stringified primary key; becomes the raw event's `source_event_id`
    /// and, for the last row of a batch, the new checkpoint key.
    pub key: String,
    pub occurred_at: DateTime<Utc>,
    pub workspace_id: i64,
    /// The full row, serialized
    pub payload: Value,
}

/// A domain table that capture reads incrementally by primary key.
///
/// Each source fixes the checkpoint pair it is tracked under and the event
/// type its rows map to.
pub trait DomainSource: Send + Sync {
    fn source_type(&self) -> SourceType;

    fn source_system(&self) -> SourceSystem;

    /// Event type given to every raw event captured from this source
    fn event_type(&self) -> EventType;

    /// Schema version of the payloads this source emits
    fn event_version(&self) -> i64;

    /// Rows whose key is strictly greater than `checkpoint_key`, ascending by key.
    ///
    /// `checkpoint_key` is parsed as the source's key type; a key that does
    /// not parse is a configuration error.
    fn rows_after(&self, conn: &Connection, checkpoint_key: &str) -> PipelineResult<Vec<SourceRow>>;
}
