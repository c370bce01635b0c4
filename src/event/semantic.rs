//! Semantic events: deduplicated reducer output

use super::types::EventType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A stored semantic event. Never mutated once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticEvent {
    pub id: i64,
    pub event_type: String,
    pub workspace_id: i64,
    pub occurred_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub reducer_version: String,
    pub raw_event_ids: Vec<i64>,
    pub payload: Value,
    pub unique_hash: String,
}

/// What a reducer hands back to the orchestrator for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticEventCandidate {
    pub event_type: EventType,
    pub workspace_id: i64,
    pub occurred_at: DateTime<Utc>,
    pub reducer_version: String,
    /// Every raw event that contributed; all of them are marked processed.
    pub raw_event_ids: Vec<i64>,
    pub payload: Value,
    pub unique_hash: String,
}
