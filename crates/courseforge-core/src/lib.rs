//! Core domain of the courseforge live-build engine.
//!
//! Folds a server-pushed stream of course-construction events into a
//! nested progress snapshot. Everything here is transport-agnostic:
//!
//! - `domain` - snapshot tree, task identity and outcomes
//! - `events` - the closed event union and wire normalization
//! - `reducer` - the pure fold from events to snapshots
//! - `tracking` - tracking phases and the completion latch
//! - `ports` - traits for the push channel, the poll endpoint and storage
//! - `store` - snapshot persistence on top of the storage port
//! - `errors` - the error taxonomy
#![deny(unused_crate_dependencies)]

pub mod domain;
pub mod errors;
pub mod events;
pub mod ports;
pub mod reducer;
pub mod store;
pub mod tracking;

// Re-export commonly used types for convenience
pub use domain::{
    BuildStatus, FailureReason, ItemStatus, ModuleProgress, ResourceSummary, SearchQuery,
    Snapshot, SubmoduleProgress, TaskError, TaskId, TaskOutcome, TaskStatus, TaskStatusReport,
    TopicResources,
};
pub use errors::{StatusError, StorageError, SyncError};
pub use events::{EventEnvelope, EventKind, LiveBuildEvent, StreamMessage};
pub use ports::{
    EventSourcePort, KeyValueStore, MemoryKeyValueStore, MessageStream, TaskStatusPort,
};
pub use reducer::{reduce, replay, replay_onto};
pub use store::{SnapshotStore, StoredProgress};
pub use tracking::{CompletionLatch, InvalidTransition, PhaseTracker, TrackingPhase};
