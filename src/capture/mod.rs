//! Event capture: mirror new domain rows into the raw event ledger
//!
//! One capture cycle for a source pair:
//! 1. Read the checkpoint (missing row is a configuration error)
//! 2. Read domain rows with key > checkpoint, ascending
//! 3. Append each as a raw event, ignoring duplicates
//! 4. Advance the checkpoint to the batch maximum
//!
//! Steps 1-4 are one transaction. The checkpoint moves to the maximum key of
//! the batch that was read, not of the rows that were newly inserted, so a
//! batch left fully captured by an earlier run that failed to record its
//! checkpoint is stepped over instead of rescanned forever.
//!
//! Two cycles for the same pair must not overlap. [`Database`] begins every
//! unit of work with `BEGIN IMMEDIATE`, which serializes them on the write
//! lock; a scheduler driving several processes against a server database
//! needs an equivalent row lock or single-flight guarantee.

use crate::dispatch::Dispatcher;
use crate::error::{PipelineError, PipelineResult};
use crate::event::{NewRawEvent, SourceSystem, SourceType};
use crate::ledger::{CheckpointStore, RawEventLedger};
use crate::source::DomainSource;
use crate::storage::Database;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Runs capture cycles for registered domain sources.
#[derive(Clone)]
pub struct EventCapture {
    db: Arc<Database>,
    sources: HashMap<(SourceType, SourceSystem), Arc<dyn DomainSource>>,
}

impl EventCapture {
    /// Create a capture service with no sources registered.
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            sources: HashMap::new(),
        }
    }

    /// Register a domain source under the pair it declares.
    pub fn with_source(mut self, source: Arc<dyn DomainSource>) -> Self {
        self.sources
            .insert((source.source_type(), source.source_system()), source);
        self
    }

    /// Run one capture cycle and return the ids of raw events actually inserted.
    ///
    /// Duplicates are skipped silently and not returned. On any error the
    /// whole cycle rolls back: no raw events, no checkpoint movement.
    pub fn capture_batch(
        &self,
        source_type: SourceType,
        source_system: SourceSystem,
    ) -> PipelineResult<Vec<i64>> {
        let source = self.sources.get(&(source_type, source_system)).ok_or_else(|| {
            PipelineError::Configuration(format!(
                "no domain source registered for {} / {}",
                source_type, source_system
            ))
        })?;

        let result = self
            .db
            .with_transaction(|tx| Self::run_cycle(tx, source.as_ref(), source_type, source_system));

        if let Err(e) = &result {
            error!(
                source_type = %source_type,
                source_system = %source_system,
                "capture cycle rolled back: {}",
                e
            );
        }
        result
    }

    fn run_cycle(
        tx: &rusqlite::Transaction<'_>,
        source: &dyn DomainSource,
        source_type: SourceType,
        source_system: SourceSystem,
    ) -> PipelineResult<Vec<i64>> {
        let checkpoints = CheckpointStore::new(tx);
        let checkpoint = checkpoints.get(source_type, source_system)?.ok_or_else(|| {
            PipelineError::Configuration(format!(
                "raw event source not found for {} / {}; checkpoints must be provisioned before capture",
                source_type, source_system
            ))
        })?;

        let rows = source.rows_after(tx, &checkpoint.last_event_id)?;
        let Some(last) = rows.last() else {
            info!(source_type = %source_type, "no new domain rows to capture");
            return Ok(Vec::new());
        };

        let ledger = RawEventLedger::new(tx);
        let mut inserted = Vec::new();
        let mut duplicates = 0usize;

        for row in &rows {
            let event = NewRawEvent {
                source_id: checkpoint.id,
                workspace_id: row.workspace_id,
                event_type: source.event_type(),
                event_version: source.event_version(),
                payload: row.payload.clone(),
                occurred_at: row.occurred_at,
                source_event_id: row.key.clone(),
            };

            match ledger.insert_ignore(&event)? {
                Some(id) => {
                    debug!(raw_event_id = id, source_event_id = %row.key, "captured raw event");
                    inserted.push(id);
                }
                None => {
                    debug!(source_event_id = %row.key, "raw event already captured, skipping");
                    duplicates += 1;
                }
            }
        }

        checkpoints.advance(checkpoint.id, &last.key, &last.occurred_at, &Utc::now())?;

        info!(
            source_type = %source_type,
            rows = rows.len(),
            inserted = inserted.len(),
            duplicates,
            checkpoint = %last.key,
            "capture cycle committed"
        );
        Ok(inserted)
    }

    /// Run a capture cycle, then hand each newly inserted id to `dispatcher`.
    ///
    /// Dispatch happens only after the cycle has committed. A job that fails
    /// to enqueue is logged and left for the unprocessed-event backfill; it
    /// does not fail the cycle.
    pub async fn capture_and_dispatch(
        &self,
        source_type: SourceType,
        source_system: SourceSystem,
        dispatcher: &dyn Dispatcher,
    ) -> PipelineResult<Vec<i64>> {
        let capture = self.clone();
        let inserted = tokio::task::spawn_blocking(move || capture.capture_batch(source_type, source_system))
            .await
            .map_err(|e| PipelineError::Worker(e.to_string()))??;

        for &id in &inserted {
            match dispatcher.dispatch(id).await {
                Ok(()) => debug!(raw_event_id = id, "enqueued raw event for reduction"),
                Err(e) => warn!(raw_event_id = id, "failed to enqueue raw event for reduction: {}", e),
            }
        }
        Ok(inserted)
    }
}
