//! Pull-based status poller.
//!
//! Polls the status endpoint on a fixed period with at most one request in
//! flight. A tick that comes due while a request is outstanding is skipped.
//! The poller reports a terminal status exactly once and then stops.
//! After [`MAX_CONSECUTIVE_FAILURES`] failed requests in a row it gives up
//! with a transport failure.

use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use courseforge_core::{StatusError, TaskError, TaskId, TaskStatus, TaskStatusPort, TaskStatusReport};
use futures_core::Stream;
use futures_util::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const DEFAULT_FAILURE_MESSAGE: &str = "Course generation failed";

/// Failed requests in a row before polling gives up.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 10;

/// Lower bound for the polling period; `interval` rejects zero.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Final status of a polled task.
#[derive(Debug, Clone, PartialEq)]
pub enum TerminalStatus {
    Completed { result: Option<Value> },
    Failed(TaskError),
}

impl TerminalStatus {
    /// Terminal status from a report, `None` while the task is still running.
    pub fn from_report(report: &TaskStatusReport) -> Option<Self> {
        match report.status {
            TaskStatus::Completed => Some(Self::Completed {
                result: report.result.clone(),
            }),
            TaskStatus::Failed => Some(Self::Failed(TaskError::reported(
                report
                    .error
                    .clone()
                    .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string()),
            ))),
            TaskStatus::Pending | TaskStatus::Running => None,
        }
    }
}

/// One observation of the poller.
#[derive(Debug, Clone, PartialEq)]
pub enum PollUpdate {
    /// A non-terminal report.
    Status(TaskStatusReport),
    /// The last update of the stream.
    Terminal(TerminalStatus),
}

/// Polls one status port.
#[derive(Clone)]
pub struct StatusPoller {
    port: Arc<dyn TaskStatusPort>,
    interval: Duration,
}

impl StatusPoller {
    /// A zero `interval` is raised to one millisecond.
    pub fn new(port: Arc<dyn TaskStatusPort>, interval: Duration) -> Self {
        Self {
            port,
            interval: interval.max(MIN_POLL_INTERVAL),
        }
    }

    /// Poll until a terminal status or cancellation.
    ///
    /// The first request is sent immediately. Request errors other than
    /// [`StatusError::NotFound`] are logged and retried on the next tick
    /// until [`MAX_CONSECUTIVE_FAILURES`] is reached; `NotFound` ends
    /// polling with a synthetic failure.
    pub fn poll(
        &self,
        task_id: TaskId,
        cancel: CancellationToken,
    ) -> impl Stream<Item = PollUpdate> + Send + 'static {
        let port = Arc::clone(&self.port);
        let period = self.interval;

        stream! {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            let mut failures = 0u32;

            debug!(task_id = %task_id, ?period, "Starting status poller");

            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let response = tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    response = port.fetch_status(&task_id) => response,
                };

                if response.is_ok() {
                    failures = 0;
                }

                match response {
                    Ok(report) => match TerminalStatus::from_report(&report) {
                        Some(terminal) => {
                            debug!(task_id = %task_id, status = report.status.as_str(), "Task reached terminal status");
                            yield PollUpdate::Terminal(terminal);
                            break;
                        }
                        None => yield PollUpdate::Status(report),
                    },
                    Err(StatusError::NotFound(_)) => {
                        warn!(task_id = %task_id, "Task not found by status endpoint");
                        yield PollUpdate::Terminal(TerminalStatus::Failed(TaskError::not_found(&task_id)));
                        break;
                    }
                    Err(e) => {
                        failures += 1;
                        if failures >= MAX_CONSECUTIVE_FAILURES {
                            warn!(task_id = %task_id, error = %e, failures, "Status endpoint unreachable, giving up");
                            yield PollUpdate::Terminal(TerminalStatus::Failed(TaskError::transport(
                                format!("status endpoint unreachable after {failures} attempts: {e}"),
                            )));
                            break;
                        }
                        warn!(task_id = %task_id, error = %e, failures, "Status request failed, retrying on next tick");
                    }
                }
            }

            debug!(task_id = %task_id, "Status poller stopped");
        }
    }

    /// Callback flavour of [`poll`](Self::poll): runs on its own task until
    /// a terminal status or cancellation.
    pub fn start<F>(&self, task_id: TaskId, cancel: CancellationToken, mut on_status: F) -> JoinHandle<()>
    where
        F: FnMut(PollUpdate) + Send + 'static,
    {
        let updates = self.poll(task_id, cancel);
        tokio::spawn(async move {
            let mut updates = std::pin::pin!(updates);
            while let Some(update) = updates.next().await {
                on_status(update);
            }
        })
    }
}
