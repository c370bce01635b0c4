//! Repositories over the pipeline tables
//!
//! Each repository borrows a connection (normally the transaction of the
//! current unit of work), so everything a unit of work writes commits or
//! rolls back together.

mod checkpoints;
mod raw_events;
mod semantic_events;

pub use checkpoints::CheckpointStore;
pub use raw_events::RawEventLedger;
pub use semantic_events::SemanticEventStore;
