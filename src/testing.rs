//! Shared fixtures for unit tests

use crate::event::{SourceSystem, SourceType};
use crate::storage::{format_timestamp, schema, Database};
use chrono::{TimeZone, Utc};
use rusqlite::{params, Connection};

pub fn provisioned_connection() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    schema::provision(&conn).unwrap();
    conn
}

/// In-memory database with schema and the note-version checkpoint at "0".
pub fn provisioned_database() -> Database {
    let db = Database::open_in_memory().unwrap();
    db.with_connection(|conn| -> crate::storage::StorageResult<()> {
        schema::provision(conn)?;
        schema::register_source(conn, SourceType::CognoNoteVersions, SourceSystem::Cogno, "0")?;
        Ok(())
    })
    .unwrap();
    db
}

/// Insert a note version created `id` minutes after a fixed epoch, in workspace 1.
pub fn insert_note_version(conn: &Connection, id: i64, note_id: i64, version: i64, text: &str) {
    let created_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::minutes(id);
    conn.execute(
        r#"
        INSERT INTO note_versions (id, note_id, version, created_at, title, text, workspace_id)
        VALUES (?1, ?2, ?3, ?4, NULL, ?5, 1)
        "#,
        params![id, note_id, version, format_timestamp(&created_at), text],
    )
    .unwrap();
}
