//! Capture checkpoints

use super::types::{SourceSystem, SourceType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted cursor for one (source type, source system) pair.
///
/// `last_event_id` is the stringified key of the last domain row captured;
/// an empty string means nothing has been captured yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: i64,
    pub source_type: SourceType,
    pub source_system: SourceSystem,
    pub last_event_id: String,
    pub last_event_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}
