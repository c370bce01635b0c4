//! Reduction of raw events into semantic events
//!
//! A [`Reducer`] turns one raw event into a semantic event candidate; the
//! [`ReducerRegistry`] maps event types to reducers; [`SemanticReducer`]
//! runs the whole unit of work against the ledger and the semantic store.

mod diff;
mod hash;
mod note_version;
mod registry;
mod service;
mod traits;

pub use diff::unified_diff;
pub use hash::{canonical_json, unique_hash};
pub use note_version::{EnrichedNoteVersion, NoteVersionReducer, NOTE_VERSION_REDUCER_VERSION};
pub use registry::{ReducerRegistry, ReducerRegistryBuilder};
pub use service::{BackfillReport, ReductionOutcome, SemanticReducer};
pub use traits::Reducer;
