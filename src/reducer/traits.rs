//! Reducer trait: the contract per-event-type transformations implement

use crate::error::PipelineResult;
use crate::event::{EventType, RawEvent, SemanticEventCandidate};
use rusqlite::Connection;

/// Turns one raw event into a semantic event candidate.
///
/// Reducers are pure apart from read-only lookups through `conn`, which is
/// the transaction of the current unit of work, so they only ever observe
/// committed data. Given the same raw event and the same committed state, a
/// reducer must return the same candidate (including its hash); that is
/// what makes reprocessing a no-op.
pub trait Reducer: Send + Sync {
    /// The raw event type this reducer handles
    fn event_type(&self) -> EventType;

    /// Version string recorded on every semantic event this reducer produces
    fn version(&self) -> &str;

    fn reduce(&self, raw_event: &RawEvent, conn: &Connection) -> PipelineResult<SemanticEventCandidate>;
}
