//! Error taxonomy for live-build synchronization.
//!
//! Transport errors are handled inside the engine up to failover; only a
//! terminal outcome reaches the consumer. Storage errors never stop tracking.

use thiserror::Error;

use crate::domain::TaskId;

/// Errors raised while synchronizing a task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// Dropped connection or 5xx; recovered by one reconnect.
    #[error("transient transport error: {0}")]
    TransientTransport(String),

    /// Repeated failure or a non-retryable response.
    #[error("terminal transport error: {0}")]
    TerminalTransport(String),

    /// A single unparseable event. The event is dropped, the stream continues.
    #[error("malformed event ({event_type}): {reason}")]
    MalformedEvent {
        /// The wire type tag, or `<message>` when the envelope itself was bad.
        event_type: String,
        /// What failed to parse.
        reason: String,
    },

    /// The server reported the task as failed.
    #[error("task failed: {0}")]
    TaskFailure(String),

    /// Snapshot persistence failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SyncError {
    /// Whether a reconnect may recover from this error.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::TransientTransport(_))
    }

    /// Create a malformed-event error.
    pub fn malformed(event_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedEvent {
            event_type: event_type.into(),
            reason: reason.into(),
        }
    }
}

/// Errors from the key-value backend behind the snapshot store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The backend rejected the write (quota, permissions, I/O).
    #[error("Storage error: {0}")]
    Backend(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors from a single poll request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusError {
    /// The poll endpoint answered 404 for this task.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// Network failure or unexpected status; the next tick retries.
    #[error("status request failed: {0}")]
    Transport(String),

    /// The response body did not match the status contract.
    #[error("invalid status response: {0}")]
    InvalidResponse(String),
}
