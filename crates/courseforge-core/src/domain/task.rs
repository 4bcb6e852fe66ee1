//! Task identity, pull-side status reports and terminal outcomes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies one course-generation run.
///
/// Opaque to the engine; used as the primary key for persisted state and
/// as the path segment for both transports.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Create a task id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Task status as reported by the poll endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Accepted but not started.
    Pending,
    /// Generation in progress.
    #[serde(alias = "in_progress", alias = "processing")]
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    #[serde(alias = "error")]
    Failed,
}

impl TaskStatus {
    /// Whether no further progress will follow this status.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Wire representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Response body of the poll endpoint.
///
/// Only `status` is mandatory. `progress` and `message` are optional extras
/// some servers attach to non-terminal responses.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskStatusReport {
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TaskStatusReport {
    /// Build a bare report with only a status.
    pub const fn new(status: TaskStatus) -> Self {
        Self {
            status,
            result: None,
            error: None,
            progress: None,
            message: None,
        }
    }
}

/// Why a task ended in failure.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The server reported the task as failed.
    #[default]
    Reported,
    /// The poll endpoint no longer knows the task.
    NotFound,
    /// Both transports became unusable.
    Transport,
}

/// Task-level terminal error carried by the snapshot and the outcome.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskError {
    pub message: String,
    #[serde(default)]
    pub reason: FailureReason,
}

impl TaskError {
    /// A failure reported by the server.
    pub fn reported(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            reason: FailureReason::Reported,
        }
    }

    /// The synthetic failure used when the task is unknown to the server.
    pub fn not_found(task_id: &TaskId) -> Self {
        Self {
            message: format!("task not found: {task_id}"),
            reason: FailureReason::NotFound,
        }
    }

    /// Contact with the server was lost for good.
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            reason: FailureReason::Transport,
        }
    }
}

/// The single terminal result handed to the consumer.
#[derive(Clone, Debug, PartialEq)]
pub enum TaskOutcome {
    /// Generation finished. `result` is the artifact reference when the
    /// poll endpoint supplied one.
    Completed {
        task_id: TaskId,
        result: Option<serde_json::Value>,
    },
    /// Generation failed.
    Failed { task_id: TaskId, error: TaskError },
}

impl TaskOutcome {
    /// The task this outcome belongs to.
    pub const fn task_id(&self) -> &TaskId {
        match self {
            Self::Completed { task_id, .. } | Self::Failed { task_id, .. } => task_id,
        }
    }

    /// Whether the task succeeded.
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}
