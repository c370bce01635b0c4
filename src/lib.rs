//! Cognition: checkpointed event capture and semantic reduction
//!
//! Two decoupled stages over one SQLite database:
//!
//! - **Capture** reads new rows from a domain table past a per-source
//!   checkpoint and appends them to an append-only raw event ledger, moving
//!   the checkpoint in the same transaction.
//! - **Reduction** turns one raw event at a time into an enriched semantic
//!   event through a registry of per-type reducers, deduplicated by a
//!   content hash, and marks the raw event processed.
//!
//! Both stages are idempotent: re-running a capture cycle or a reduction
//! converges to the same stored state.
//!
//! # Example
//!
//! ```
//! use cognition::{schema, Database, EventCapture, NoteVersionSource, SourceSystem, SourceType};
//! use std::sync::Arc;
//!
//! let db = Database::open_in_memory().unwrap();
//! db.with_connection(|conn| -> cognition::StorageResult<()> {
//!     schema::provision(conn)?;
//!     schema::register_source(conn, SourceType::CognoNoteVersions, SourceSystem::Cogno, "0")?;
//!     Ok(())
//! })
//! .unwrap();
//!
//! let capture = EventCapture::new(Arc::new(db)).with_source(Arc::new(NoteVersionSource::new()));
//! let inserted = capture
//!     .capture_batch(SourceType::CognoNoteVersions, SourceSystem::Cogno)
//!     .unwrap();
//! assert!(inserted.is_empty());
//! ```

pub mod capture;
pub mod config;
pub mod dispatch;
mod error;
pub mod event;
pub mod ledger;
pub mod reducer;
pub mod source;
pub mod storage;

#[cfg(test)]
mod testing;

pub use capture::EventCapture;
pub use config::PipelineConfig;
pub use dispatch::{CaptureLoop, ChannelDispatcher, Dispatcher, ReductionWorkers, TickReport, WorkerReport};
pub use error::{PipelineError, PipelineResult};
pub use event::{Checkpoint, EventType, NewRawEvent, RawEvent, SemanticEvent, SemanticEventCandidate, SourceSystem, SourceType};
pub use ledger::{CheckpointStore, RawEventLedger, SemanticEventStore};
pub use reducer::{BackfillReport, NoteVersionReducer, Reducer, ReducerRegistry, ReductionOutcome, SemanticReducer};
pub use source::{DomainSource, NoteVersion, NoteVersionSource, SourceRow};
pub use storage::{schema, Database, StorageError, StorageResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
