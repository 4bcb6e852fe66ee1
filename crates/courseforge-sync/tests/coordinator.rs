//! End-to-end tracking scenarios against scripted transports.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use courseforge_core::{
    BuildStatus, EventSourcePort, FailureReason, KeyValueStore, MemoryKeyValueStore,
    MessageStream, Snapshot, SnapshotStore, StatusError, StorageError, StreamMessage, SyncError,
    TaskError, TaskId, TaskOutcome, TaskStatus, TaskStatusPort, TaskStatusReport, TrackingPhase,
};
use courseforge_sync::{ProgressCoordinator, SyncConfig, TrackingHandle};
use futures_util::{StreamExt, stream};
use mockall::mock;
use serde_json::json;

// ============================================================================
// Scripted transports
// ============================================================================

enum Connection {
    Fail(SyncError),
    /// Deliver the messages, then close cleanly.
    Deliver(Vec<serde_json::Value>),
    /// Deliver the messages, then stay open forever.
    DeliverThenHang(Vec<serde_json::Value>),
    /// Deliver the messages, then drop the connection.
    DeliverThenDrop(Vec<serde_json::Value>),
}

#[derive(Default)]
struct ScriptedEvents {
    connections: Mutex<VecDeque<Connection>>,
    offsets: Mutex<Vec<Option<u64>>>,
}

impl ScriptedEvents {
    fn new(connections: Vec<Connection>) -> Arc<Self> {
        Arc::new(Self {
            connections: Mutex::new(connections.into()),
            offsets: Mutex::default(),
        })
    }

    fn offsets(&self) -> Vec<Option<u64>> {
        self.offsets.lock().unwrap().clone()
    }
}

fn messages(values: Vec<serde_json::Value>) -> Vec<Result<StreamMessage, SyncError>> {
    values
        .into_iter()
        .map(|v| Ok(serde_json::from_value(v).unwrap()))
        .collect()
}

#[async_trait]
impl EventSourcePort for ScriptedEvents {
    async fn connect(
        &self,
        _task_id: &TaskId,
        last_offset: Option<u64>,
    ) -> Result<MessageStream, SyncError> {
        self.offsets.lock().unwrap().push(last_offset);
        let next = self.connections.lock().unwrap().pop_front();
        match next {
            Some(Connection::Fail(e)) => Err(e),
            Some(Connection::Deliver(values)) => Ok(Box::pin(stream::iter(messages(values)))),
            Some(Connection::DeliverThenHang(values)) => Ok(Box::pin(
                stream::iter(messages(values)).chain(stream::pending()),
            )),
            Some(Connection::DeliverThenDrop(values)) => {
                let mut items = messages(values);
                items.push(Err(SyncError::TransientTransport("connection reset".into())));
                Ok(Box::pin(stream::iter(items)))
            }
            None => Err(SyncError::TerminalTransport("no more connections".into())),
        }
    }
}

struct ScriptedStatus {
    responses: Mutex<VecDeque<Result<TaskStatusReport, StatusError>>>,
    calls: AtomicUsize,
    latency: Duration,
}

impl ScriptedStatus {
    fn new(responses: Vec<Result<TaskStatusReport, StatusError>>) -> Arc<Self> {
        Self::slow(responses, Duration::ZERO)
    }

    fn slow(responses: Vec<Result<TaskStatusReport, StatusError>>, latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
            latency,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskStatusPort for ScriptedStatus {
    async fn fetch_status(&self, _task_id: &TaskId) -> Result<TaskStatusReport, StatusError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(TaskStatusReport::new(TaskStatus::Running)))
    }
}

mock! {
    Backend {}

    #[async_trait]
    impl KeyValueStore for Backend {
        async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
        async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
        async fn remove(&self, key: &str) -> Result<(), StorageError>;
        async fn keys(&self) -> Result<Vec<String>, StorageError>;
    }
}

// ============================================================================
// Harness
// ============================================================================

#[derive(Clone, Default)]
struct Recorder {
    snapshots: Arc<Mutex<Vec<Arc<Snapshot>>>>,
    outcomes: Arc<Mutex<Vec<TaskOutcome>>>,
}

impl Recorder {
    fn track(&self, coordinator: &ProgressCoordinator, task_id: &str) -> TrackingHandle {
        let snapshots = Arc::clone(&self.snapshots);
        let outcomes = Arc::clone(&self.outcomes);
        coordinator.track(
            TaskId::new(task_id),
            move |snapshot| snapshots.lock().unwrap().push(snapshot),
            move |outcome| outcomes.lock().unwrap().push(outcome),
        )
    }

    fn snapshots(&self) -> Vec<Arc<Snapshot>> {
        self.snapshots.lock().unwrap().clone()
    }

    fn outcomes(&self) -> Vec<TaskOutcome> {
        self.outcomes.lock().unwrap().clone()
    }

    fn assert_monotonic(&self) {
        let snapshots = self.snapshots();
        for pair in snapshots.windows(2) {
            assert!(
                pair[1].overall_progress >= pair[0].overall_progress,
                "progress went from {} to {}",
                pair[0].overall_progress,
                pair[1].overall_progress
            );
        }
    }
}

fn coordinator(
    events: Arc<ScriptedEvents>,
    status: Arc<ScriptedStatus>,
    backend: Arc<dyn KeyValueStore>,
) -> ProgressCoordinator {
    ProgressCoordinator::new(
        events,
        status,
        SnapshotStore::new(backend),
        &SyncConfig::new(),
    )
}

async fn finished(handle: TrackingHandle) {
    tokio::time::timeout(Duration::from_secs(600), handle.finished())
        .await
        .expect("tracking did not finish");
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

fn modules_defined(id: u64, progress: f64) -> serde_json::Value {
    json!({
        "id": id,
        "overall_progress": progress,
        "message": "Outline ready",
        "preview_data": {
            "type": "MODULES_DEFINED",
            "data": {"modules": [{"id": "m1", "title": "Ownership"}, {"id": "m2", "title": "Traits"}]}
        }
    })
}

fn progress(id: u64, value: f64) -> serde_json::Value {
    json!({"id": id, "overall_progress": value})
}

fn completed(id: u64) -> serde_json::Value {
    json!({"id": id, "action": "completed", "message": "Course ready"})
}

fn transient() -> SyncError {
    SyncError::TransientTransport("connection reset".into())
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test(start_paused = true)]
async fn completes_from_stream_exactly_once() {
    let events = ScriptedEvents::new(vec![Connection::Deliver(vec![
        modules_defined(1, 0.2),
        progress(2, 0.6),
        completed(3),
    ])]);
    let status = ScriptedStatus::new(vec![Ok(TaskStatusReport::new(TaskStatus::Completed))]);
    let backend = Arc::new(MemoryKeyValueStore::new());
    let recorder = Recorder::default();

    let handle = recorder.track(&coordinator(events, status.clone(), backend.clone()), "t1");
    let phases = handle.phase_changes();
    finished(handle).await;

    assert_eq!(
        recorder.outcomes(),
        vec![TaskOutcome::Completed {
            task_id: TaskId::new("t1"),
            result: None
        }]
    );
    assert_eq!(*phases.borrow(), TrackingPhase::Done);
    assert_eq!(status.calls(), 0);
    assert!(backend.is_empty().await);

    recorder.assert_monotonic();
    let last = recorder.snapshots().pop().unwrap();
    assert_eq!(last.status, BuildStatus::Completed);
    assert!((last.overall_progress - 1.0).abs() < f64::EPSILON);
    assert_eq!(last.modules.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn resumes_from_cached_snapshot_without_dipping() {
    let backend = Arc::new(MemoryKeyValueStore::new());
    let cached = Snapshot {
        topic: "Rust".into(),
        overall_progress: 0.4,
        ..Snapshot::empty()
    };
    SnapshotStore::new(backend.clone())
        .save(&TaskId::new("t1"), &cached, Some(17))
        .await
        .unwrap();

    let events = ScriptedEvents::new(vec![Connection::Deliver(vec![
        progress(18, 0.3),
        progress(19, 0.35),
        completed(20),
    ])]);
    let recorder = Recorder::default();

    let handle = recorder.track(
        &coordinator(events.clone(), ScriptedStatus::new(vec![]), backend),
        "t1",
    );
    finished(handle).await;

    assert_eq!(events.offsets(), vec![Some(17)]);
    let snapshots = recorder.snapshots();
    assert_eq!(snapshots[0].overall_progress, 0.4);
    assert_eq!(snapshots[0].topic, "Rust");
    assert!(snapshots.iter().all(|s| s.overall_progress >= 0.4));
    recorder.assert_monotonic();
    assert_eq!(recorder.outcomes().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn dropped_connection_resumes_from_last_offset() {
    let events = ScriptedEvents::new(vec![
        Connection::DeliverThenDrop(vec![modules_defined(1, 0.2), progress(2, 0.4)]),
        Connection::Deliver(vec![progress(3, 0.8), completed(4)]),
    ]);
    let status = ScriptedStatus::new(vec![]);
    let recorder = Recorder::default();

    let handle = recorder.track(
        &coordinator(events.clone(), status.clone(), Arc::new(MemoryKeyValueStore::new())),
        "t1",
    );
    finished(handle).await;

    assert_eq!(events.offsets(), vec![None, Some(2)]);
    assert_eq!(status.calls(), 0);
    assert_eq!(recorder.snapshots().len(), 4);
    assert!(recorder.outcomes()[0].is_success());
    recorder.assert_monotonic();
}

#[tokio::test(start_paused = true)]
async fn fails_over_to_polling_after_second_failure() {
    let events = ScriptedEvents::new(vec![
        Connection::Fail(transient()),
        Connection::Fail(transient()),
    ]);
    let status = ScriptedStatus::new(vec![
        Ok(TaskStatusReport {
            progress: Some(0.5),
            message: Some("Writing quizzes".into()),
            ..TaskStatusReport::new(TaskStatus::Running)
        }),
        Ok(TaskStatusReport {
            result: Some(json!({"courseId": "c-1"})),
            ..TaskStatusReport::new(TaskStatus::Completed)
        }),
    ]);
    let recorder = Recorder::default();

    let handle = recorder.track(
        &coordinator(events.clone(), status.clone(), Arc::new(MemoryKeyValueStore::new())),
        "t1",
    );
    finished(handle).await;

    assert_eq!(events.offsets().len(), 2);
    assert_eq!(status.calls(), 2);
    assert_eq!(
        recorder.outcomes(),
        vec![TaskOutcome::Completed {
            task_id: TaskId::new("t1"),
            result: Some(json!({"courseId": "c-1"}))
        }]
    );
    let snapshots = recorder.snapshots();
    assert!(
        snapshots
            .iter()
            .any(|s| s.overall_status_message == "Writing quizzes" && s.overall_progress == 0.5)
    );
    assert_eq!(snapshots.last().unwrap().status, BuildStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn server_close_without_terminal_falls_back_to_polling() {
    let events = ScriptedEvents::new(vec![Connection::Deliver(vec![modules_defined(1, 0.3)])]);
    let status = ScriptedStatus::new(vec![Ok(TaskStatusReport::new(TaskStatus::Completed))]);
    let recorder = Recorder::default();

    let handle = recorder.track(
        &coordinator(events.clone(), status.clone(), Arc::new(MemoryKeyValueStore::new())),
        "t1",
    );
    finished(handle).await;

    assert_eq!(events.offsets().len(), 1);
    assert_eq!(status.calls(), 1);
    assert_eq!(recorder.outcomes().len(), 1);
    assert!(recorder.outcomes()[0].is_success());
}

#[tokio::test(start_paused = true)]
async fn zero_poll_interval_still_completes() {
    let events = ScriptedEvents::new(vec![Connection::Deliver(vec![modules_defined(1, 0.3)])]);
    let status = ScriptedStatus::new(vec![Ok(TaskStatusReport::new(TaskStatus::Completed))]);
    let recorder = Recorder::default();
    let coordinator = ProgressCoordinator::new(
        events,
        status.clone(),
        SnapshotStore::new(Arc::new(MemoryKeyValueStore::new())),
        &SyncConfig::new().with_poll_interval(Duration::ZERO),
    );

    let handle = recorder.track(&coordinator, "t1");
    let phases = handle.phase_changes();
    finished(handle).await;

    assert_eq!(*phases.borrow(), TrackingPhase::Done);
    assert_eq!(status.calls(), 1);
    assert_eq!(recorder.outcomes().len(), 1);
    assert!(recorder.outcomes()[0].is_success());
}

#[tokio::test(start_paused = true)]
async fn unreachable_status_endpoint_ends_in_transport_failure() {
    let events = ScriptedEvents::new(vec![Connection::Fail(transient()), Connection::Fail(transient())]);
    let script = (0..courseforge_sync::MAX_CONSECUTIVE_FAILURES)
        .map(|_| Err(StatusError::Transport("connection refused".into())))
        .collect();
    let status = ScriptedStatus::new(script);
    let recorder = Recorder::default();

    let handle = recorder.track(
        &coordinator(events, status.clone(), Arc::new(MemoryKeyValueStore::new())),
        "t1",
    );
    finished(handle).await;

    let outcomes = recorder.outcomes();
    assert_eq!(outcomes.len(), 1);
    let TaskOutcome::Failed { error, .. } = &outcomes[0] else {
        panic!("expected failure, got {:?}", outcomes[0]);
    };
    assert_eq!(error.reason, FailureReason::Transport);
    assert_eq!(
        status.calls(),
        courseforge_sync::MAX_CONSECUTIVE_FAILURES as usize
    );
}

#[tokio::test(start_paused = true)]
async fn missing_task_is_reported_as_failure() {
    let events = ScriptedEvents::new(vec![Connection::Fail(SyncError::TerminalTransport(
        "404".into(),
    ))]);
    let status = ScriptedStatus::new(vec![Err(StatusError::NotFound(TaskId::new("t1")))]);
    let recorder = Recorder::default();

    let handle = recorder.track(
        &coordinator(events, status, Arc::new(MemoryKeyValueStore::new())),
        "t1",
    );
    finished(handle).await;

    let outcomes = recorder.outcomes();
    assert_eq!(outcomes.len(), 1);
    let TaskOutcome::Failed { error, .. } = &outcomes[0] else {
        panic!("expected failure, got {:?}", outcomes[0]);
    };
    assert_eq!(error.reason, FailureReason::NotFound);

    let last = recorder.snapshots().pop().unwrap();
    assert_eq!(last.status, BuildStatus::Failed);
    assert_eq!(last.error, Some(TaskError::not_found(&TaskId::new("t1"))));
}

#[tokio::test(start_paused = true)]
async fn stream_failure_event_reports_server_message() {
    let events = ScriptedEvents::new(vec![Connection::DeliverThenHang(vec![
        modules_defined(1, 0.2),
        json!({"id": 2, "action": "error", "message": "LLM quota exhausted"}),
    ])]);
    let recorder = Recorder::default();

    let handle = recorder.track(
        &coordinator(events, ScriptedStatus::new(vec![]), Arc::new(MemoryKeyValueStore::new())),
        "t1",
    );
    finished(handle).await;

    assert_eq!(
        recorder.outcomes(),
        vec![TaskOutcome::Failed {
            task_id: TaskId::new("t1"),
            error: TaskError::reported("LLM quota exhausted"),
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn cancel_suppresses_all_callbacks() {
    let events = ScriptedEvents::new(vec![Connection::DeliverThenHang(vec![progress(1, 0.1)])]);
    let backend = Arc::new(MemoryKeyValueStore::new());
    let recorder = Recorder::default();

    let handle = recorder.track(
        &coordinator(events, ScriptedStatus::new(vec![]), backend.clone()),
        "t1",
    );
    settle().await;
    assert_eq!(handle.phase(), TrackingPhase::Streaming);
    assert_eq!(recorder.snapshots().len(), 1);

    handle.cancel();
    handle.cancel();
    let phases = handle.phase_changes();
    finished(handle).await;

    assert!(recorder.outcomes().is_empty());
    assert_eq!(recorder.snapshots().len(), 1);
    assert_eq!(*phases.borrow(), TrackingPhase::Done);

    // Cancelled tasks stay resumable.
    let stored = SnapshotStore::new(backend).load(&TaskId::new("t1")).await.unwrap();
    assert_eq!(stored.last_offset, Some(1));
}

#[tokio::test(start_paused = true)]
async fn cancel_while_polling_stops_requests() {
    let events = ScriptedEvents::new(vec![Connection::Fail(SyncError::TerminalTransport(
        "gone".into(),
    ))]);
    let status = ScriptedStatus::slow(
        vec![Ok(TaskStatusReport::new(TaskStatus::Completed))],
        Duration::from_secs(60),
    );
    let recorder = Recorder::default();

    let handle = recorder.track(
        &coordinator(events, status.clone(), Arc::new(MemoryKeyValueStore::new())),
        "t1",
    );
    settle().await;
    assert_eq!(handle.phase(), TrackingPhase::Polling);
    assert_eq!(status.calls(), 1);

    handle.cancel();
    finished(handle).await;
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert!(recorder.outcomes().is_empty());
    assert_eq!(status.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn unchanged_snapshots_are_not_emitted() {
    let events = ScriptedEvents::new(vec![Connection::Deliver(vec![
        modules_defined(1, 0.1),
        json!({"id": 2, "preview_data": {"type": "QUIZ_REGENERATED", "data": {}}}),
        modules_defined(3, 0.1),
        json!({"id": 4, "preview_data": {"type": "modules_defined", "data": {"nope": 1}}}),
        completed(5),
    ])]);
    let recorder = Recorder::default();

    let handle = recorder.track(
        &coordinator(events, ScriptedStatus::new(vec![]), Arc::new(MemoryKeyValueStore::new())),
        "t1",
    );
    finished(handle).await;

    assert_eq!(recorder.snapshots().len(), 2);
    assert_eq!(recorder.outcomes().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn storage_failure_degrades_to_memory_only() {
    let mut backend = MockBackend::new();
    backend.expect_get().returning(|_| Ok(None));
    backend.expect_keys().returning(|| Ok(Vec::new()));
    backend
        .expect_set()
        .times(1)
        .returning(|_, _| Err(StorageError::Backend("quota exceeded".into())));
    backend.expect_remove().returning(|_| Ok(()));

    let events = ScriptedEvents::new(vec![Connection::Deliver(vec![
        modules_defined(1, 0.2),
        progress(2, 0.5),
        progress(3, 0.7),
        completed(4),
    ])]);
    let recorder = Recorder::default();

    let handle = recorder.track(
        &coordinator(events, ScriptedStatus::new(vec![]), Arc::new(backend)),
        "t1",
    );
    finished(handle).await;

    assert_eq!(recorder.snapshots().len(), 4);
    assert_eq!(recorder.outcomes().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn terminal_cache_is_confirmed_by_polling() {
    let backend = Arc::new(MemoryKeyValueStore::new());
    let cached = Snapshot {
        overall_progress: 1.0,
        status: BuildStatus::Completed,
        ..Snapshot::empty()
    };
    SnapshotStore::new(backend.clone())
        .save(&TaskId::new("t1"), &cached, Some(40))
        .await
        .unwrap();

    let events = ScriptedEvents::new(vec![]);
    let status = ScriptedStatus::new(vec![Ok(TaskStatusReport {
        result: Some(json!({"courseId": "c-7"})),
        ..TaskStatusReport::new(TaskStatus::Completed)
    })]);
    let recorder = Recorder::default();

    let handle = recorder.track(&coordinator(events.clone(), status, backend.clone()), "t1");
    finished(handle).await;

    assert!(events.offsets().is_empty());
    assert_eq!(recorder.snapshots().len(), 1);
    assert_eq!(
        recorder.outcomes(),
        vec![TaskOutcome::Completed {
            task_id: TaskId::new("t1"),
            result: Some(json!({"courseId": "c-7"}))
        }]
    );
    assert!(backend.is_empty().await);
}

#[tokio::test]
async fn abandon_clears_cached_progress() {
    let backend = Arc::new(MemoryKeyValueStore::new());
    let store = SnapshotStore::new(backend.clone());
    store
        .save(&TaskId::new("t1"), &Snapshot::empty(), Some(3))
        .await
        .unwrap();

    let coordinator = coordinator(
        ScriptedEvents::new(vec![]),
        ScriptedStatus::new(vec![]),
        backend.clone(),
    );
    coordinator.abandon(&TaskId::new("t1")).await.unwrap();

    assert!(backend.is_empty().await);
}
