//! Checkpoint store: one cursor row per source pair

use crate::event::{Checkpoint, SourceSystem, SourceType};
use crate::storage::{format_timestamp, parse_timestamp, StorageError, StorageResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

/// Checkpoint access bound to one connection or transaction.
///
/// Rows are created by provisioning, never here. Only capture writes.
pub struct CheckpointStore<'c> {
    conn: &'c Connection,
}

impl<'c> CheckpointStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Load the checkpoint for a source pair, `None` if it was never provisioned.
    pub fn get(
        &self,
        source_type: SourceType,
        source_system: SourceSystem,
    ) -> StorageResult<Option<Checkpoint>> {
        let row: Option<(i64, String, Option<String>, Option<String>)> = self
            .conn
            .query_row(
                r#"
                SELECT id, last_event_id, last_event_at, updated_at
                FROM raw_event_sources
                WHERE source_type = ?1 AND source_system = ?2
                "#,
                params![source_type.as_str(), source_system.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        let Some((id, last_event_id, last_event_at, updated_at)) = row else {
            return Ok(None);
        };

        Ok(Some(Checkpoint {
            id,
            source_type,
            source_system,
            last_event_id,
            last_event_at: last_event_at.as_deref().map(parse_timestamp).transpose()?,
            updated_at: updated_at.as_deref().map(parse_timestamp).transpose()?,
        }))
    }

    /// Move the cursor for checkpoint `id` to `last_event_id`.
    ///
    /// Fails with a `QueryReturnedNoRows` database error if the row is gone,
    /// so a vanished checkpoint aborts the surrounding unit of work.
    pub fn advance(
        &self,
        id: i64,
        last_event_id: &str,
        last_event_at: &DateTime<Utc>,
        now: &DateTime<Utc>,
    ) -> StorageResult<()> {
        let updated = self.conn.execute(
            r#"
            UPDATE raw_event_sources
            SET last_event_id = ?1,
                last_event_at = ?2,
                updated_at = ?3
            WHERE id = ?4
            "#,
            params![
                last_event_id,
                format_timestamp(last_event_at),
                format_timestamp(now),
                id,
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::Database(rusqlite::Error::QueryReturnedNoRows));
        }
        Ok(())
    }
}
