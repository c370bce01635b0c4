//! The `note_versions` table: append-only versioned note content

use super::{DomainSource, SourceRow};
use crate::error::{PipelineError, PipelineResult};
use crate::event::{EventType, SourceSystem, SourceType};
use crate::storage::{parse_timestamp, StorageResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

const NOTE_VERSION_COLUMNS: &str =
    "id, note_id, version, created_at, title, text, workspace_id, note_folder_id, similarity";

/// One version of a note as stored by the domain system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteVersion {
    pub id: i64,
    pub note_id: i64,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub title: Option<String>,
    pub text: String,
    pub workspace_id: i64,
    #[serde(default)]
    pub note_folder_id: Option<i64>,
    #[serde(default)]
    pub similarity: Option<f64>,
}

type NoteVersionRow = (i64, i64, i64, String, Option<String>, String, i64, Option<i64>, Option<f64>);

impl NoteVersion {
    fn read_row(row: &Row<'_>) -> rusqlite::Result<NoteVersionRow> {
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

    fn decode(row: NoteVersionRow) -> StorageResult<Self> {
        let (id, note_id, version, created_at, title, text, workspace_id, note_folder_id, similarity) = row;
        Ok(Self {
            id,
            note_id,
            version,
            created_at: parse_timestamp(&created_at)?,
            title,
            text,
            workspace_id,
            note_folder_id,
            similarity,
        })
    }

    /// Note versions with `id > after`, ascending by id.
    pub fn list_after(conn: &Connection, after: i64) -> StorageResult<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM note_versions WHERE id > ?1 ORDER BY id ASC",
            NOTE_VERSION_COLUMNS
        ))?;
        let rows = stmt.query_map(params![after], Self::read_row)?;

        let mut versions = Vec::new();
        for row in rows {
            versions.push(Self::decode(row?)?);
        }
        Ok(versions)
    }

    /// The version immediately before `version` for the same note, if any.
    ///
    /// Reads committed rows only; it never sees another reduction in flight.
    pub fn prior(conn: &Connection, note_id: i64, version: i64) -> StorageResult<Option<Self>> {
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM note_versions WHERE note_id = ?1 AND version < ?2 \
                     ORDER BY version DESC LIMIT 1",
                    NOTE_VERSION_COLUMNS
                ),
                params![note_id, version],
                Self::read_row,
            )
            .optional()?;

        row.map(Self::decode).transpose()
    }
}

/// Captures `note_versions` rows as `note_version.created` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoteVersionSource;

impl NoteVersionSource {
    pub fn new() -> Self {
        Self
    }

    fn parse_key(checkpoint_key: &str) -> PipelineResult<i64> {
        // A freshly provisioned checkpoint may carry an empty key
        if checkpoint_key.trim().is_empty() {
            return Ok(0);
        }
        checkpoint_key.trim().parse().map_err(|_| {
            PipelineError::Configuration(format!(
                "checkpoint key '{}' for {} is not an integer note version id",
                checkpoint_key,
                SourceType::CognoNoteVersions
            ))
        })
    }
}

impl DomainSource for NoteVersionSource {
    fn source_type(&self) -> SourceType {
        SourceType::CognoNoteVersions
    }

    fn source_system(&self) -> SourceSystem {
        SourceSystem::Cogno
    }

    fn event_type(&self) -> EventType {
        EventType::NoteVersionCreated
    }

    fn event_version(&self) -> i64 {
        1
    }

    fn rows_after(&self, conn: &Connection, checkpoint_key: &str) -> PipelineResult<Vec<SourceRow>> {
        let after = Self::parse_key(checkpoint_key)?;

        NoteVersion::list_after(conn, after)?
            .into_iter()
            .map(|version| -> PipelineResult<SourceRow> {
                Ok(SourceRow {
                    key: version.id.to_string(),
                    occurred_at: version.created_at,
                    workspace_id: version.workspace_id,
                    payload: serde_json::to_value(&version)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{insert_note_version, provisioned_connection};

    #[test]
    fn test_rows_after_is_strict_and_ascending() {
        let conn = provisioned_connection();
        insert_note_version(&conn, 3, 10, 1, "a");
        insert_note_version(&conn, 1, 11, 1, "b");
        insert_note_version(&conn, 2, 10, 2, "c");

        let rows = NoteVersionSource.rows_after(&conn, "1").unwrap();
        let keys: Vec<&str> = rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["2", "3"]);
        assert_eq!(rows[0].payload["text"], "c");
        assert_eq!(rows[0].payload["note_id"], 10);
    }

    #[test]
    fn test_empty_checkpoint_key_reads_from_start() {
        let conn = provisioned_connection();
        insert_note_version(&conn, 1, 10, 1, "a");
        assert_eq!(NoteVersionSource.rows_after(&conn, "").unwrap().len(), 1);
    }

    #[test]
    fn test_non_numeric_checkpoint_key_is_configuration_error() {
        let conn = provisioned_connection();
        let err = NoteVersionSource.rows_after(&conn, "abc").unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[test]
    fn test_prior_picks_greatest_lower_version() {
        let conn = provisioned_connection();
        insert_note_version(&conn, 1, 10, 1, "one");
        insert_note_version(&conn, 2, 10, 2, "two");
        insert_note_version(&conn, 3, 10, 4, "four");
        insert_note_version(&conn, 4, 99, 3, "other note");

        let prior = NoteVersion::prior(&conn, 10, 4).unwrap().unwrap();
        assert_eq!(prior.text, "two");
        assert!(NoteVersion::prior(&conn, 10, 1).unwrap().is_none());
    }

    #[test]
    fn test_payload_decodes_back_into_snapshot() {
        let conn = provisioned_connection();
        insert_note_version(&conn, 1, 10, 1, "hello");
        let row = NoteVersionSource.rows_after(&conn, "0").unwrap().remove(0);

        let snapshot: NoteVersion = serde_json::from_value(row.payload).unwrap();
        assert_eq!(snapshot.id, 1);
        assert_eq!(snapshot.title, None);
        assert_eq!(snapshot.text, "hello");
    }
}
