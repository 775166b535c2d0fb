//! Domain model (work items, error taxonomy, run state).

pub mod errors;
pub mod item;
pub mod state;

pub use errors::{FatalRunError, ItemError, RunError};
pub use item::{ItemId, ItemStatus, Payload, PayloadError, WorkItem};
pub use state::{DrainStop, RunReport, RunState, RunVerdict};
