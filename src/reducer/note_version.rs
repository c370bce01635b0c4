//! Note version reducer: enrich each captured version with a diff against its predecessor

use super::diff::unified_diff;
use super::hash::unique_hash;
use super::traits::Reducer;
use crate::error::{PipelineError, PipelineResult};
use crate::event::{EventType, RawEvent, SemanticEventCandidate};
use crate::source::NoteVersion;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Version of the transformation below. Bump when the enriched payload changes.
pub const NOTE_VERSION_REDUCER_VERSION: &str = "1.0.0";

/// Lines of unchanged context around each change in the diff
const DIFF_CONTEXT_LINES: usize = 3;

/// The captured snapshot plus its diff against the prior version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedNoteVersion {
    #[serde(flatten)]
    pub snapshot: NoteVersion,
    /// Unified diff from the prior version's text; empty for a first version
    pub diff: String,
}

/// Reducer for `note_version.created`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoteVersionReducer;

impl NoteVersionReducer {
    pub fn new() -> Self {
        Self
    }

    fn decode(raw_event: &RawEvent) -> PipelineResult<NoteVersion> {
        serde_json::from_value(raw_event.payload.clone()).map_err(|source| PipelineError::Payload {
            raw_event_id: raw_event.id,
            source,
        })
    }
}

impl Reducer for NoteVersionReducer {
    fn event_type(&self) -> EventType {
        EventType::NoteVersionCreated
    }

    fn version(&self) -> &str {
        NOTE_VERSION_REDUCER_VERSION
    }

    fn reduce(&self, raw_event: &RawEvent, conn: &Connection) -> PipelineResult<SemanticEventCandidate> {
        let snapshot = Self::decode(raw_event)?;

        let diff = match NoteVersion::prior(conn, snapshot.note_id, snapshot.version)? {
            Some(prior) => unified_diff(&prior.text, &snapshot.text, "previous", "current", DIFF_CONTEXT_LINES),
            None => String::new(),
        };
        debug!(
            raw_event_id = raw_event.id,
            note_id = snapshot.note_id,
            version = snapshot.version,
            diff_len = diff.len(),
            "reduced note version"
        );

        let payload = serde_json::to_value(EnrichedNoteVersion { snapshot, diff })?;
        let raw_event_ids = vec![raw_event.id];
        let event_type = self.event_type();

        Ok(SemanticEventCandidate {
            event_type,
            workspace_id: raw_event.workspace_id,
            occurred_at: raw_event.occurred_at,
            reducer_version: NOTE_VERSION_REDUCER_VERSION.to_string(),
            unique_hash: unique_hash(event_type.as_str(), raw_event.workspace_id, &raw_event_ids, &payload),
            raw_event_ids,
            payload,
        })
    }
}
