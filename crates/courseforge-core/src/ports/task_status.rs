//! Pull-based status port used as the fallback transport.

use async_trait::async_trait;

use crate::domain::{TaskId, TaskStatusReport};
use crate::errors::StatusError;

/// Fetches the current status of a task.
#[async_trait]
pub trait TaskStatusPort: Send + Sync {
    /// One status request.
    ///
    /// A 404 must surface as [`StatusError::NotFound`] so the poller can
    /// stop instead of polling forever.
    async fn fetch_status(&self, task_id: &TaskId) -> Result<TaskStatusReport, StatusError>;
}
