//! Shared fixtures for the pipeline integration tests
//!
//! Databases come provisioned with the schema and the note-version
//! checkpoint at "0", the way `cognition provision` leaves them.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use cognition::{
    schema, Checkpoint, CheckpointStore, Database, EventCapture, NoteVersionSource, RawEvent, RawEventLedger,
    ReducerRegistry, SemanticEvent, SemanticEventStore, SemanticReducer, SourceSystem, SourceType, StorageResult,
};
use rusqlite::params;
use std::path::Path;
use std::sync::Arc;

pub const NOTE_SOURCE: (SourceType, SourceSystem) = (SourceType::CognoNoteVersions, SourceSystem::Cogno);

/// Creation time of note version `id`: one minute per id after a fixed epoch.
pub fn created_at(id: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(id)
}

fn provision(db: &Database) {
    db.with_connection(|conn| -> StorageResult<()> {
        schema::provision(conn)?;
        schema::register_source(conn, NOTE_SOURCE.0, NOTE_SOURCE.1, "0")?;
        Ok(())
    })
    .unwrap();
}

pub fn memory_db() -> Arc<Database> {
    let db = Database::open_in_memory().unwrap();
    provision(&db);
    Arc::new(db)
}

/// Provision a file-backed database and return a handle to it. Open more
/// handles on the same path with [`Database::open`].
pub fn file_db(path: &Path) -> Arc<Database> {
    let db = Database::open(path).unwrap();
    provision(&db);
    Arc::new(db)
}

pub fn capture(db: &Arc<Database>) -> EventCapture {
    EventCapture::new(db.clone()).with_source(Arc::new(NoteVersionSource::new()))
}

pub fn reducer(db: &Arc<Database>) -> SemanticReducer {
    SemanticReducer::new(db.clone(), Arc::new(ReducerRegistry::default_registry()))
}

pub fn insert_note_version(db: &Database, id: i64, note_id: i64, version: i64, text: &str) {
    db.with_connection(|conn| -> StorageResult<()> {
        conn.execute(
            r#"
            INSERT INTO note_versions (id, note_id, version, created_at, title, text, workspace_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, 7)
            "#,
            params![
                id,
                note_id,
                version,
                cognition::storage::format_timestamp(&created_at(id)),
                format!("note {}", note_id),
                text
            ],
        )?;
        Ok(())
    })
    .unwrap();
}

pub fn execute(db: &Database, sql: &str) {
    db.with_connection(|conn| -> StorageResult<()> {
        conn.execute_batch(sql)?;
        Ok(())
    })
    .unwrap();
}

pub fn checkpoint(db: &Database) -> Checkpoint {
    db.with_connection(|conn| CheckpointStore::new(conn).get(NOTE_SOURCE.0, NOTE_SOURCE.1))
        .unwrap()
        .unwrap()
}

pub fn raw_event(db: &Database, id: i64) -> RawEvent {
    db.with_connection(|conn| RawEventLedger::new(conn).get(id)).unwrap().unwrap()
}

pub fn raw_event_count(db: &Database) -> i64 {
    db.with_connection(|conn| -> StorageResult<i64> {
        Ok(conn.query_row("SELECT COUNT(*) FROM raw_events", [], |r| r.get(0))?)
    })
    .unwrap()
}

pub fn semantic_events(db: &Database) -> Vec<SemanticEvent> {
    db.with_connection(|conn| -> StorageResult<Vec<SemanticEvent>> {
        let mut stmt = conn.prepare("SELECT unique_hash FROM semantic_events ORDER BY id")?;
        let hashes = stmt
            .query_map([], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let store = SemanticEventStore::new(conn);
        let mut events = Vec::new();
        for hash in hashes {
            if let Some(event) = store.get_by_hash(&hash)? {
                events.push(event);
            }
        }
        Ok(events)
    })
    .unwrap()
}
