//! Semantic reducer: one raw event in, at most one semantic event out
//!
//! Each call to [`SemanticReducer::process_event`] is a single unit of work:
//! fetch, reduce, insert-or-ignore, mark processed, commit. A failure at any
//! step rolls the whole unit back and leaves the raw event unprocessed.

use super::registry::ReducerRegistry;
use crate::error::{PipelineError, PipelineResult};
use crate::ledger::{RawEventLedger, SemanticEventStore};
use crate::storage::Database;
use chrono::Utc;
use rusqlite::Transaction;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What a single reduction did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReductionOutcome {
    /// A new semantic event was stored.
    Created { semantic_event_id: i64, unique_hash: String },
    /// An identical semantic event already existed; the raw event was
    /// re-marked as processed.
    AlreadyExists { unique_hash: String },
    /// No reducer for this event type; marked processed without output.
    Skipped { event_type: String },
}

/// Result of draining the unprocessed backlog.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BackfillReport {
    pub processed: usize,
    pub failed: Vec<(i64, String)>,
}

impl BackfillReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Applies registered reducers to raw events.
#[derive(Clone)]
pub struct SemanticReducer {
    db: Arc<Database>,
    registry: Arc<ReducerRegistry>,
}

impl SemanticReducer {
    pub fn new(db: Arc<Database>, registry: Arc<ReducerRegistry>) -> Self {
        Self { db, registry }
    }

    /// Reduce one raw event.
    ///
    /// Safe to call repeatedly and concurrently for the same id: the second
    /// caller hits the `unique_hash` conflict and only refreshes the
    /// processed timestamp.
    pub fn process_event(&self, raw_event_id: i64) -> PipelineResult<ReductionOutcome> {
        let result = self.db.with_transaction(|tx| self.reduce_in(tx, raw_event_id));

        match &result {
            Ok(outcome) => debug!(raw_event_id, ?outcome, "reduction committed"),
            Err(e) => error!(raw_event_id, "reduction rolled back: {}", e),
        }
        result
    }

    fn reduce_in(&self, tx: &Transaction<'_>, raw_event_id: i64) -> PipelineResult<ReductionOutcome> {
        let ledger = RawEventLedger::new(tx);
        let raw_event = ledger
            .get(raw_event_id)?
            .ok_or(PipelineError::NotFound(raw_event_id))?;
        let now = Utc::now();

        let Some(reducer) = self.registry.for_raw_event(&raw_event) else {
            warn!(
                raw_event_id,
                event_type = %raw_event.event_type,
                "no reducer registered for event type, marking processed"
            );
            ledger.mark_processed(&[raw_event.id], &now)?;
            return Ok(ReductionOutcome::Skipped {
                event_type: raw_event.event_type,
            });
        };

        let candidate = reducer.reduce(&raw_event, tx)?;
        let inserted = SemanticEventStore::new(tx).insert_ignore(&candidate, &now)?;
        ledger.mark_processed(&candidate.raw_event_ids, &now)?;

        Ok(match inserted {
            Some(semantic_event_id) => ReductionOutcome::Created {
                semantic_event_id,
                unique_hash: candidate.unique_hash,
            },
            None => {
                debug!(raw_event_id, unique_hash = %candidate.unique_hash, "semantic event already exists");
                ReductionOutcome::AlreadyExists {
                    unique_hash: candidate.unique_hash,
                }
            }
        })
    }

    /// Reduce up to `limit` raw events that were never marked processed,
    /// oldest first. Each id is its own unit of work; one failure does not
    /// stop the rest.
    ///
    /// Failures do not count against `limit`: the pass pages forward past
    /// them, so events that keep failing cannot starve newer ones.
    pub fn process_unprocessed(&self, limit: usize) -> PipelineResult<BackfillReport> {
        let mut report = BackfillReport::default();
        let mut after_id = 0;

        while report.processed < limit {
            let page = self.db.with_connection(|conn| {
                RawEventLedger::new(conn).get_unprocessed_after(after_id, limit - report.processed)
            })?;
            let Some(last) = page.last() else { break };
            after_id = last.id;

            for raw_event in page {
                match self.process_event(raw_event.id) {
                    Ok(_) => report.processed += 1,
                    Err(e) => report.failed.push((raw_event.id, e.to_string())),
                }
            }
        }

        if report.processed > 0 || !report.is_clean() {
            info!(
                processed = report.processed,
                failed = report.failed.len(),
                "backfill pass finished"
            );
        }
        Ok(report)
    }
}
