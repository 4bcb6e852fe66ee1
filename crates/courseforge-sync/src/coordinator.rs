//! Tracks one task from cached state to a single terminal outcome.
//!
//! ```text
//! restore ─▶ emit cached ─▶ STREAMING ─(closed)─▶ POLLING ─▶ DONE
//! ```
//!
//! Every transport feeds the same reducer. A new snapshot is persisted and
//! then handed to `on_snapshot`; the outcome goes through a
//! [`CompletionLatch`] so it is delivered at most once, and never after
//! [`TrackingHandle::cancel`].

use std::pin::Pin;
use std::sync::Arc;

use courseforge_core::{
    BuildStatus, CompletionLatch, EventEnvelope, EventSourcePort, LiveBuildEvent,
    PhaseTracker, Snapshot, SnapshotStore, StorageError, TaskError, TaskId, TaskOutcome,
    TaskStatusPort, TrackingPhase, reduce,
};
use futures_core::Stream;
use futures_util::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::TransportError;
use crate::http::{HttpEventSource, HttpStatusClient};
use crate::poller::{PollUpdate, StatusPoller, TerminalStatus};
use crate::stream_client::{EventStreamClient, StreamHandle, StreamSignal, StreamSignals};

const DEFAULT_FAILURE_MESSAGE: &str = "Course generation failed";

type SnapshotCallback = Box<dyn Fn(Arc<Snapshot>) + Send + Sync>;
type PollStream = Pin<Box<dyn Stream<Item = PollUpdate> + Send>>;

/// Entry point for tracking live builds.
#[derive(Clone)]
pub struct ProgressCoordinator {
    streams: EventStreamClient,
    poller: StatusPoller,
    store: SnapshotStore,
}

impl ProgressCoordinator {
    pub fn new(
        events: Arc<dyn EventSourcePort>,
        status: Arc<dyn TaskStatusPort>,
        store: SnapshotStore,
        config: &SyncConfig,
    ) -> Self {
        Self {
            streams: EventStreamClient::new(events, config.reconnect_delay),
            poller: StatusPoller::new(status, config.poll_interval),
            store,
        }
    }

    /// Coordinator over the HTTP transports described by `config`.
    pub fn with_http(config: &SyncConfig, store: SnapshotStore) -> Result<Self, TransportError> {
        let events = Arc::new(HttpEventSource::new(config)?);
        let status = Arc::new(HttpStatusClient::new(config)?);
        Ok(Self::new(events, status, store, config))
    }

    /// Start tracking `task_id`.
    ///
    /// A cached snapshot, if any, is emitted before any network activity.
    /// `on_complete` runs at most once. Must be called from within a Tokio
    /// runtime.
    pub fn track<S, C>(&self, task_id: TaskId, on_snapshot: S, on_complete: C) -> TrackingHandle
    where
        S: Fn(Arc<Snapshot>) + Send + Sync + 'static,
        C: FnOnce(TaskOutcome) + Send + 'static,
    {
        let (phase, phase_rx) = PhaseTracker::new();
        let cancel = CancellationToken::new();
        let latch = Arc::new(CompletionLatch::new(on_complete));

        let session = TrackingSession {
            task_id: task_id.clone(),
            streams: self.streams.clone(),
            poller: self.poller.clone(),
            store: self.store.clone(),
            phase,
            cancel: cancel.clone(),
            latch: Arc::clone(&latch),
            on_snapshot: Box::new(on_snapshot),
            snapshot: Arc::new(Snapshot::empty()),
            last_offset: None,
            persist: true,
        };
        let join = tokio::spawn(session.run());

        TrackingHandle {
            task_id,
            cancel,
            latch,
            phase: phase_rx,
            join,
        }
    }

    /// Drop everything stored for a task the user gave up on.
    pub async fn abandon(&self, task_id: &TaskId) -> Result<(), StorageError> {
        info!(task_id = %task_id, "Abandoning task");
        self.store.clear(task_id).await
    }
}

/// Handle to one tracked task.
///
/// Dropping the handle does not stop tracking; call [`cancel`](Self::cancel).
#[derive(Debug)]
pub struct TrackingHandle {
    task_id: TaskId,
    cancel: CancellationToken,
    latch: Arc<CompletionLatch<TaskOutcome>>,
    phase: watch::Receiver<TrackingPhase>,
    join: JoinHandle<()>,
}

impl TrackingHandle {
    pub const fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Stop tracking and close both transports.
    ///
    /// Idempotent. The completion callback never runs after this returns,
    /// and no new snapshot callback starts.
    pub fn cancel(&self) {
        if self.latch.disarm() {
            debug!(task_id = %self.task_id, "Tracking cancelled before completion");
        }
        self.cancel.cancel();
    }

    pub fn phase(&self) -> TrackingPhase {
        *self.phase.borrow()
    }

    /// Receiver observing every phase change.
    pub fn phase_changes(&self) -> watch::Receiver<TrackingPhase> {
        self.phase.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait until the session has wound down.
    pub async fn finished(self) {
        if let Err(e) = self.join.await {
            warn!(task_id = %self.task_id, error = %e, "Tracking task aborted");
        }
    }
}

struct TrackingSession {
    task_id: TaskId,
    streams: EventStreamClient,
    poller: StatusPoller,
    store: SnapshotStore,
    phase: PhaseTracker,
    cancel: CancellationToken,
    latch: Arc<CompletionLatch<TaskOutcome>>,
    on_snapshot: SnapshotCallback,
    snapshot: Arc<Snapshot>,
    last_offset: Option<u64>,
    /// Cleared after the first storage failure.
    persist: bool,
}

impl TrackingSession {
    async fn run(mut self) {
        self.restore().await;

        let poll_cancel = self.cancel.child_token();
        let mut stream: Option<StreamHandle> = None;
        let mut signals: Option<StreamSignals> = None;
        let mut polling: Option<PollStream> = None;

        if self.snapshot.is_terminal() {
            debug!(task_id = %self.task_id, "Cached snapshot is terminal, confirming via status endpoint");
            polling = Some(self.start_polling(&poll_cancel));
        } else {
            let (handle, rx) = self.streams.open(self.task_id.clone(), self.last_offset);
            stream = Some(handle);
            signals = Some(rx);
        }

        let outcome = loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break None,
                signal = next_signal(&mut signals) => match signal {
                    Some(StreamSignal::Connected { resumed_from }) => {
                        debug!(task_id = %self.task_id, ?resumed_from, "Streaming");
                        self.enter(TrackingPhase::Streaming);
                    }
                    Some(StreamSignal::Event(envelope)) => {
                        if let Some(outcome) = self.apply(&envelope).await {
                            break Some(outcome);
                        }
                    }
                    Some(StreamSignal::TransientError(error)) => {
                        debug!(task_id = %self.task_id, error = %error, "Push channel reconnecting");
                    }
                    Some(StreamSignal::Closed(reason)) => {
                        info!(task_id = %self.task_id, ?reason, "Push channel closed, falling back to polling");
                        signals = None;
                        if polling.is_none() {
                            polling = Some(self.start_polling(&poll_cancel));
                        }
                    }
                    None => {
                        signals = None;
                        if polling.is_none() {
                            polling = Some(self.start_polling(&poll_cancel));
                        }
                    }
                },
                update = next_update(&mut polling) => match update {
                    Some(PollUpdate::Status(report)) => {
                        let envelope = EventEnvelope::progress(report.progress, report.message);
                        self.apply(&envelope).await;
                    }
                    Some(PollUpdate::Terminal(terminal)) => break Some(self.conclude(terminal).await),
                    None => {
                        warn!(task_id = %self.task_id, "Status poller ended without a terminal status");
                        break Some(self.transport_failure());
                    }
                },
            }
        };

        if let Some(handle) = &stream {
            handle.close();
        }
        poll_cancel.cancel();
        self.finish(outcome).await;
    }

    async fn restore(&mut self) {
        let Some(stored) = self.store.load(&self.task_id).await else {
            return;
        };
        info!(
            task_id = %self.task_id,
            last_offset = ?stored.last_offset,
            saved_at = %stored.saved_at,
            progress = stored.snapshot.overall_progress,
            "Restored cached progress"
        );
        self.snapshot = Arc::new(stored.snapshot);
        self.last_offset = stored.last_offset;
        self.publish();
    }

    /// Fold one event in. Returns the outcome if it made the task terminal.
    async fn apply(&mut self, envelope: &EventEnvelope) -> Option<TaskOutcome> {
        let was_terminal = self.snapshot.is_terminal();
        let next = reduce(&self.snapshot, envelope);
        let changed = !Arc::ptr_eq(&next, &self.snapshot);
        self.snapshot = next;
        let advanced = self.advance_offset(envelope.offset);

        if changed || advanced {
            self.persist().await;
        }
        if changed {
            self.publish();
        }

        (!was_terminal && self.snapshot.is_terminal()).then(|| self.outcome_from_snapshot())
    }

    /// Fold a polled terminal status in and turn it into the outcome.
    async fn conclude(&mut self, terminal: TerminalStatus) -> TaskOutcome {
        let event = match &terminal {
            TerminalStatus::Completed { .. } => LiveBuildEvent::CourseCompleted,
            TerminalStatus::Failed(error) => LiveBuildEvent::TaskFailed(error.clone()),
        };
        self.apply(&EventEnvelope::bare(event)).await;

        let task_id = self.task_id.clone();
        match terminal {
            TerminalStatus::Completed { result } => TaskOutcome::Completed { task_id, result },
            TerminalStatus::Failed(error) => TaskOutcome::Failed { task_id, error },
        }
    }

    fn advance_offset(&mut self, offset: Option<u64>) -> bool {
        match offset {
            Some(offset) if self.last_offset.is_none_or(|last| offset > last) => {
                self.last_offset = Some(offset);
                true
            }
            _ => false,
        }
    }

    fn outcome_from_snapshot(&self) -> TaskOutcome {
        let task_id = self.task_id.clone();
        match self.snapshot.status {
            BuildStatus::Failed => TaskOutcome::Failed {
                task_id,
                error: self
                    .snapshot
                    .error
                    .clone()
                    .unwrap_or_else(|| TaskError::reported(DEFAULT_FAILURE_MESSAGE)),
            },
            BuildStatus::Completed | BuildStatus::Building => TaskOutcome::Completed {
                task_id,
                result: None,
            },
        }
    }

    fn transport_failure(&self) -> TaskOutcome {
        TaskOutcome::Failed {
            task_id: self.task_id.clone(),
            error: TaskError::transport("lost contact with the server"),
        }
    }

    async fn persist(&mut self) {
        if !self.persist {
            return;
        }
        if let Err(e) = self
            .store
            .save(&self.task_id, &self.snapshot, self.last_offset)
            .await
        {
            warn!(task_id = %self.task_id, error = %e, "Snapshot persistence failed, continuing in memory only");
            self.persist = false;
        }
    }

    fn publish(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        (self.on_snapshot)(Arc::clone(&self.snapshot));
    }

    fn enter(&self, next: TrackingPhase) {
        match self.phase.advance(next) {
            Ok(from) if from != next => {
                debug!(task_id = %self.task_id, %from, to = %next, "Tracking phase changed");
            }
            Ok(_) => {}
            Err(e) => debug!(task_id = %self.task_id, error = %e, "Ignoring phase transition"),
        }
    }

    fn start_polling(&self, cancel: &CancellationToken) -> PollStream {
        self.enter(TrackingPhase::Polling);
        Box::pin(self.poller.poll(self.task_id.clone(), cancel.clone()))
    }

    async fn finish(self, outcome: Option<TaskOutcome>) {
        self.enter(TrackingPhase::Done);

        let Some(outcome) = outcome else {
            info!(task_id = %self.task_id, "Tracking cancelled");
            return;
        };

        info!(task_id = %self.task_id, success = outcome.is_success(), "Task finished");
        if let Err(e) = self.store.clear(&self.task_id).await {
            warn!(task_id = %self.task_id, error = %e, "Failed to clear cached progress");
        }
        if !self.cancel.is_cancelled() {
            self.latch.fire(outcome);
        }
    }
}

async fn next_signal(signals: &mut Option<StreamSignals>) -> Option<StreamSignal> {
    match signals {
        Some(signals) => signals.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_update(polling: &mut Option<PollStream>) -> Option<PollUpdate> {
    match polling {
        Some(updates) => updates.next().await,
        None => std::future::pending().await,
    }
}
