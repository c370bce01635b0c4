//! Out-of-band provisioning of the pipeline tables
//!
//! Nothing in capture or reduction calls into this module. The unique
//! constraints created here are part of the correctness contract: the
//! ledger's `(source_id, source_event_id)` key and the semantic store's
//! `unique_hash` are what make repeated writes no-ops.

use super::error::StorageResult;
use crate::event::{SourceSystem, SourceType};
use rusqlite::{params, Connection};

/// Create every table and index the pipeline relies on.
///
/// Idempotent: safe to run against an already provisioned database.
pub fn provision(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        r#"
        -- Domain source: append-only versioned note content
        CREATE TABLE IF NOT EXISTS note_versions (
            id INTEGER PRIMARY KEY,
            note_id INTEGER NOT NULL,
            version INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            title TEXT,
            text TEXT NOT NULL,
            workspace_id INTEGER NOT NULL,
            note_folder_id INTEGER,
            similarity REAL
        );

        CREATE INDEX IF NOT EXISTS idx_note_versions_note
            ON note_versions(note_id, version);

        -- Checkpoints, one per (source type, source system)
        CREATE TABLE IF NOT EXISTS raw_event_sources (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_type TEXT NOT NULL,
            source_system TEXT NOT NULL,
            last_event_id TEXT NOT NULL DEFAULT '',
            last_event_at TEXT,
            updated_at TEXT,
            UNIQUE (source_type, source_system)
        );

        -- Raw event ledger
        CREATE TABLE IF NOT EXISTS raw_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            occurred_at TEXT NOT NULL,
            ingested_at TEXT,
            source_id INTEGER NOT NULL,
            workspace_id INTEGER NOT NULL,
            event_type TEXT NOT NULL,
            event_version INTEGER NOT NULL,
            payload_json TEXT NOT NULL,
            source_event_id TEXT NOT NULL,
            UNIQUE (source_id, source_event_id),
            FOREIGN KEY (source_id) REFERENCES raw_event_sources(id)
        );

        CREATE INDEX IF NOT EXISTS idx_raw_events_unprocessed
            ON raw_events(id) WHERE ingested_at IS NULL;

        -- Deduplicated semantic output
        CREATE TABLE IF NOT EXISTS semantic_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_type TEXT NOT NULL,
            workspace_id INTEGER NOT NULL,
            occurred_at TEXT NOT NULL,
            created_at TEXT NOT NULL,
            reducer_version TEXT NOT NULL,
            raw_event_ids_json TEXT NOT NULL,
            payload_json TEXT NOT NULL,
            unique_hash TEXT NOT NULL UNIQUE
        );
        "#,
    )?;
    Ok(())
}

/// Create the checkpoint row for a source pair, starting at `initial_key`.
///
/// Leaves an existing row untouched. Returns the row id either way.
pub fn register_source(
    conn: &Connection,
    source_type: SourceType,
    source_system: SourceSystem,
    initial_key: &str,
) -> StorageResult<i64> {
    conn.execute(
        r#"
        INSERT INTO raw_event_sources (source_type, source_system, last_event_id)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(source_type, source_system) DO NOTHING
        "#,
        params![source_type.as_str(), source_system.as_str(), initial_key],
    )?;

    let id = conn.query_row(
        "SELECT id FROM raw_event_sources WHERE source_type = ?1 AND source_system = ?2",
        params![source_type.as_str(), source_system.as_str()],
        |row| row.get(0),
    )?;
    Ok(id)
}
