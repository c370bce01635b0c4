//! Semantic event store, keyed by content hash

use crate::event::{SemanticEvent, SemanticEventCandidate};
use crate::storage::{format_timestamp, parse_timestamp, StorageResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

/// Semantic event access bound to one connection or transaction.
pub struct SemanticEventStore<'c> {
    conn: &'c Connection,
}

impl<'c> SemanticEventStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Insert a candidate unless its `unique_hash` is already stored.
    ///
    /// Returns the new id, or `None` when another writer (or an earlier run)
    /// already produced this event.
    pub fn insert_ignore(
        &self,
        candidate: &SemanticEventCandidate,
        created_at: &DateTime<Utc>,
    ) -> StorageResult<Option<i64>> {
        let raw_event_ids = serde_json::to_string(&candidate.raw_event_ids)?;
        let payload = serde_json::to_string(&candidate.payload)?;

        let id = self
            .conn
            .query_row(
                r#"
                INSERT INTO semantic_events
                    (event_type, workspace_id, occurred_at, created_at, reducer_version,
                     raw_event_ids_json, payload_json, unique_hash)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(unique_hash) DO NOTHING
                RETURNING id
                "#,
                params![
                    candidate.event_type.as_str(),
                    candidate.workspace_id,
                    format_timestamp(&candidate.occurred_at),
                    format_timestamp(created_at),
                    candidate.reducer_version,
                    raw_event_ids,
                    payload,
                    candidate.unique_hash,
                ],
                |row| row.get(0),
            )
            .optional()?;

        Ok(id)
    }

    /// Look up a semantic event by its idempotency hash.
    pub fn get_by_hash(&self, unique_hash: &str) -> StorageResult<Option<SemanticEvent>> {
        let row: Option<(i64, String, i64, String, String, String, String, String, String)> = self
            .conn
            .query_row(
                r#"
                SELECT id, event_type, workspace_id, occurred_at, created_at, reducer_version,
                       raw_event_ids_json, payload_json, unique_hash
                FROM semantic_events
                WHERE unique_hash = ?1
                "#,
                params![unique_hash],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                        row.get(7)?,
                        row.get(8)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, event_type, workspace_id, occurred_at, created_at, reducer_version, ids, payload, unique_hash)) =
            row
        else {
            return Ok(None);
        };

        Ok(Some(SemanticEvent {
            id,
            event_type,
            workspace_id,
            occurred_at: parse_timestamp(&occurred_at)?,
            created_at: parse_timestamp(&created_at)?,
            reducer_version,
            raw_event_ids: serde_json::from_str(&ids)?,
            payload: serde_json::from_str(&payload)?,
            unique_hash,
        }))
    }

    /// Number of stored semantic events.
    pub fn count(&self) -> StorageResult<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM semantic_events", [], |row| row.get(0))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventType;
    use crate::storage::schema;
    use serde_json::json;

    fn candidate(hash: &str) -> SemanticEventCandidate {
        SemanticEventCandidate {
            event_type: EventType::NoteVersionCreated,
            workspace_id: 3,
            occurred_at: Utc::now(),
            reducer_version: "1.0.0".to_string(),
            raw_event_ids: vec![5],
            payload: json!({ "diff": "" }),
            unique_hash: hash.to_string(),
        }
    }

    #[test]
    fn test_conflicting_hash_is_a_noop() {
        let conn = Connection::open_in_memory().unwrap();
        schema::provision(&conn).unwrap();
        let store = SemanticEventStore::new(&conn);
        let now = Utc::now();

        let first = store.insert_ignore(&candidate("abc"), &now).unwrap();
        let second = store.insert_ignore(&candidate("abc"), &now).unwrap();

        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_get_by_hash_round_trips_fields() {
        let conn = Connection::open_in_memory().unwrap();
        schema::provision(&conn).unwrap();
        let store = SemanticEventStore::new(&conn);

        let id = store.insert_ignore(&candidate("xyz"), &Utc::now()).unwrap().unwrap();
        let stored = store.get_by_hash("xyz").unwrap().unwrap();

        assert_eq!(stored.id, id);
        assert_eq!(stored.event_type, "note_version.created");
        assert_eq!(stored.raw_event_ids, vec![5]);
        assert_eq!(stored.payload, json!({ "diff": "" }));
        assert!(store.get_by_hash("missing").unwrap().is_none());
    }
}
