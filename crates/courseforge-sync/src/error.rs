//! HTTP transport errors and their mapping onto the engine's taxonomy.

use courseforge_core::{StatusError, SyncError, TaskId};
use thiserror::Error;

/// Failure of one HTTP exchange.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The server answered with a non-success status.
    #[error("request to {url} failed with status {status}")]
    Status { status: u16, url: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid response body: {0}")]
    Body(#[from] serde_json::Error),
}

impl TransportError {
    /// Whether a later attempt may succeed.
    ///
    /// 5xx, 408 and 429 are retryable; other 4xx are not. Network errors
    /// are retryable unless the request could not even be built.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status >= 500 || matches!(*status, 408 | 429),
            Self::Network(e) => !e.is_builder(),
            Self::InvalidUrl(_) | Self::Body(_) => false,
        }
    }

    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }

    /// Map onto the push-side error.
    pub fn into_sync_error(self) -> SyncError {
        if self.is_retryable() {
            SyncError::TransientTransport(self.to_string())
        } else {
            SyncError::TerminalTransport(self.to_string())
        }
    }

    /// Map onto the pull-side error.
    pub fn into_status_error(self, task_id: &TaskId) -> StatusError {
        match self {
            e if e.is_not_found() => StatusError::NotFound(task_id.clone()),
            Self::Body(e) => StatusError::InvalidResponse(e.to_string()),
            other => StatusError::Transport(other.to_string()),
        }
    }
}
