//! Event data model shared by capture and reduction

mod checkpoint;
mod raw;
mod semantic;
mod types;

pub use checkpoint::Checkpoint;
pub use raw::{NewRawEvent, RawEvent};
pub use semantic::{SemanticEvent, SemanticEventCandidate};
pub use types::{EventType, SourceSystem, SourceType, UnknownVariant};
