//! Shared data model: parser events, positions, state snapshots, findings
//! and run results.

mod event;
mod result;
mod state;
mod violation;

pub use event::{AttributeMap, ParserEvent, Position};
pub use result::{
    FileFragment, FileStats, IdObservation, RefObservation, ResultAggregator, ValidationResult,
};
pub use state::ParserState;
pub use violation::{rules, Severity, ValidationError};
