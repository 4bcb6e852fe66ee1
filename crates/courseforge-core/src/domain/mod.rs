//! Domain types: task identity and the live-build snapshot.
//!
//! Pure data; no I/O.

pub mod snapshot;
pub mod task;

pub use snapshot::{
    BuildStatus, ItemStatus, ModuleProgress, ResourceSummary, SearchQuery, Snapshot,
    SubmoduleProgress, TopicResources,
};
pub use task::{FailureReason, TaskError, TaskId, TaskOutcome, TaskStatus, TaskStatusReport};
