//! Errors surfaced by capture and reduction

use crate::storage::StorageError;
use thiserror::Error;

/// Errors that can occur in pipeline operations
///
/// Every unit of work that fails with one of these has already been rolled
/// back. None of them are retried internally; retry belongs to whatever
/// scheduled the unit of work.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing checkpoint row, unparseable checkpoint key or unregistered
    /// source. Needs operator provisioning, retrying will not help.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A dispatched raw event id does not exist in the ledger.
    #[error("Raw event not found: {0}")]
    NotFound(i64),

    /// A raw event's payload does not decode into the snapshot its reducer expects.
    #[error("Invalid payload for raw event {raw_event_id}: {source}")]
    Payload {
        raw_event_id: i64,
        #[source]
        source: serde_json::Error,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The work queue refused a job (receiver gone).
    #[error("Dispatch error: {0}")]
    Dispatch(String),

    /// A blocking unit of work could not be joined.
    #[error("Worker error: {0}")]
    Worker(String),
}

impl PipelineError {
    /// True for storage-boundary failures worth a scheduler-level retry.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_transient(),
            _ => false,
        }
    }
}

impl From<rusqlite::Error> for PipelineError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(StorageError::from(e))
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display_names_the_id() {
        let err = PipelineError::NotFound(17);
        assert_eq!(err.to_string(), "Raw event not found: 17");
        assert!(!err.is_transient());
    }

    #[test]
    fn busy_storage_is_transient() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".to_string()),
        );
        let err = PipelineError::from(busy);
        assert!(err.is_transient());
    }

    #[test]
    fn configuration_is_not_transient() {
        let err = PipelineError::Configuration("no checkpoint".to_string());
        assert!(!err.is_transient());
        assert!(err.to_string().contains("no checkpoint"));
    }
}
