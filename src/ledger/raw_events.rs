//! Raw event ledger: append-only log of captured domain changes

use crate::event::{NewRawEvent, RawEvent};
use crate::storage::{format_timestamp, parse_timestamp, StorageResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const RAW_EVENT_COLUMNS: &str = "id, occurred_at, ingested_at, source_id, workspace_id, \
     event_type, event_version, payload_json, source_event_id";

/// Columns of one `raw_events` row before JSON and timestamp decoding.
type RawEventRow = (i64, String, Option<String>, i64, i64, String, i64, String, String);

/// Ledger access bound to one connection or transaction.
pub struct RawEventLedger<'c> {
    conn: &'c Connection,
}

impl<'c> RawEventLedger<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Append an event unless `(source_id, source_event_id)` already exists.
    ///
    /// Returns the new id, or `None` when the row was a duplicate. The
    /// insert itself decides; there is no separate existence check.
    pub fn insert_ignore(&self, event: &NewRawEvent) -> StorageResult<Option<i64>> {
        let payload = serde_json::to_string(&event.payload)?;

        let id = self
            .conn
            .query_row(
                r#"
                INSERT INTO raw_events
                    (occurred_at, ingested_at, source_id, workspace_id,
                     event_type, event_version, payload_json, source_event_id)
                VALUES (?1, NULL, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(source_id, source_event_id) DO NOTHING
                RETURNING id
                "#,
                params![
                    format_timestamp(&event.occurred_at),
                    event.source_id,
                    event.workspace_id,
                    event.event_type.as_str(),
                    event.event_version,
                    payload,
                    event.source_event_id,
                ],
                |row| row.get(0),
            )
            .optional()?;

        Ok(id)
    }

    /// Look up one event by id.
    pub fn get(&self, id: i64) -> StorageResult<Option<RawEvent>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM raw_events WHERE id = ?1", RAW_EVENT_COLUMNS),
                params![id],
                Self::read_row,
            )
            .optional()?;

        row.map(Self::decode).transpose()
    }

    /// Look up several events. Ids that do not exist are left out of the result.
    pub fn get_batch(&self, ids: &[i64]) -> StorageResult<Vec<RawEvent>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM raw_events WHERE id IN ({}) ORDER BY id ASC",
            RAW_EVENT_COLUMNS, placeholders
        );
        self.collect(&sql, params_from_iter(ids.iter()))
    }

    /// Oldest events that have not been reduced yet, ascending by id.
    pub fn get_unprocessed(&self, limit: usize) -> StorageResult<Vec<RawEvent>> {
        self.get_unprocessed_after(0, limit)
    }

    /// Like [`get_unprocessed`](Self::get_unprocessed), starting past `after_id`.
    /// Lets a caller page beyond events that keep failing.
    pub fn get_unprocessed_after(&self, after_id: i64, limit: usize) -> StorageResult<Vec<RawEvent>> {
        let sql = format!(
            "SELECT {} FROM raw_events WHERE ingested_at IS NULL AND id > ?1 ORDER BY id ASC LIMIT ?2",
            RAW_EVENT_COLUMNS
        );
        self.collect(&sql, params![after_id, limit as i64])
    }

    /// Set `ingested_at` on every listed event.
    ///
    /// Idempotent. A repeated call moves the timestamp forward but never
    /// back, and never clears it. Returns how many rows matched.
    pub fn mark_processed(&self, ids: &[i64], at: &DateTime<Utc>) -> StorageResult<usize> {
        let at = format_timestamp(at);
        let mut stmt = self.conn.prepare_cached(
            r#"
            UPDATE raw_events
            SET ingested_at = CASE
                WHEN ingested_at IS NULL OR ingested_at < ?1 THEN ?1
                ELSE ingested_at
            END
            WHERE id = ?2
            "#,
        )?;

        let mut matched = 0;
        for id in ids {
            matched += stmt.execute(params![at, id])?;
        }
        Ok(matched)
    }

    fn collect<P: rusqlite::Params>(&self, sql: &str, params: P) -> StorageResult<Vec<RawEvent>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, Self::read_row)?;

        let mut events = Vec::new();
        for row in rows {
            events.push(Self::decode(row?)?);
        }
        Ok(events)
    }

    fn read_row(row: &Row<'_>) -> rusqlite::Result<RawEventRow> {
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
    }

    fn decode(row: RawEventRow) -> StorageResult<RawEvent> {
        let (id, occurred_at, ingested_at, source_id, workspace_id, event_type, event_version, payload, source_event_id) =
            row;

        Ok(RawEvent {
            id,
            occurred_at: parse_timestamp(&occurred_at)?,
            ingested_at: ingested_at.as_deref().map(parse_timestamp).transpose()?,
            source_id,
            workspace_id,
            event_type,
            event_version,
            payload: serde_json::from_str(&payload)?,
            source_event_id,
        })
    }
}
