//! Push-channel client with resume and a single reconnect.
//!
//! # Reconnect policy
//!
//! A transient failure (connect error, dropped connection) is retried once
//! after a fixed delay, resuming from the last offset seen. A second failure
//! in a row closes the stream with an error. The failure streak resets as
//! soon as an event arrives. Non-transient errors close immediately.

use std::sync::Arc;
use std::time::Duration;

use courseforge_core::{EventEnvelope, EventSourcePort, MessageStream, SyncError, TaskId};
use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Consecutive failures tolerated before giving up.
const MAX_CONSECUTIVE_FAILURES: u32 = 1;

/// Why a stream stopped for good.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The server ended the connection cleanly.
    ServerClosed,
    /// Reconnecting failed or cannot help.
    Failed(SyncError),
}

/// Everything a stream reports to its consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamSignal {
    /// A connection was established.
    Connected { resumed_from: Option<u64> },
    /// One normalized event.
    Event(EventEnvelope),
    /// The connection dropped; one reconnect is scheduled.
    TransientError(SyncError),
    /// No further signals follow.
    Closed(CloseReason),
}

/// Opens push connections for tasks.
#[derive(Clone)]
pub struct EventStreamClient {
    source: Arc<dyn EventSourcePort>,
    reconnect_delay: Duration,
}

impl EventStreamClient {
    pub fn new(source: Arc<dyn EventSourcePort>, reconnect_delay: Duration) -> Self {
        Self {
            source,
            reconnect_delay,
        }
    }

    /// Start streaming events for `task_id`, resuming after `last_offset`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn open(&self, task_id: TaskId, last_offset: Option<u64>) -> (StreamHandle, StreamSignals) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (offset_tx, offset_rx) = watch::channel(last_offset);
        let cancel = CancellationToken::new();

        let worker = StreamWorker {
            source: Arc::clone(&self.source),
            task_id,
            reconnect_delay: self.reconnect_delay,
            tx,
            offset: offset_tx,
            cancel: cancel.clone(),
        };
        tokio::spawn(worker.run());

        let handle = StreamHandle {
            cancel: cancel.clone(),
            offset: offset_rx,
        };
        (handle, StreamSignals { rx, cancel })
    }
}

/// Controls one open stream.
#[derive(Debug, Clone)]
pub struct StreamHandle {
    cancel: CancellationToken,
    offset: watch::Receiver<Option<u64>>,
}

impl StreamHandle {
    /// Stop the stream. Idempotent; no signal is observed afterwards.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Highest offset received so far.
    pub fn last_offset(&self) -> Option<u64> {
        *self.offset.borrow()
    }
}

/// Receiving side of a stream.
#[derive(Debug)]
pub struct StreamSignals {
    rx: mpsc::UnboundedReceiver<StreamSignal>,
    cancel: CancellationToken,
}

impl StreamSignals {
    /// Next signal, or `None` once the stream is closed or finished.
    pub async fn recv(&mut self) -> Option<StreamSignal> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            signal = self.rx.recv() => signal,
        }
    }
}

enum ConnectionEnd {
    ServerClosed,
    Dropped(SyncError),
    Cancelled,
}

struct StreamWorker {
    source: Arc<dyn EventSourcePort>,
    task_id: TaskId,
    reconnect_delay: Duration,
    tx: mpsc::UnboundedSender<StreamSignal>,
    offset: watch::Sender<Option<u64>>,
    cancel: CancellationToken,
}

impl StreamWorker {
    async fn run(self) {
        let mut failures = 0u32;

        loop {
            let last_offset = *self.offset.borrow();
            let connected = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return,
                result = self.source.connect(&self.task_id, last_offset) => result,
            };

            let end = match connected {
                Ok(messages) => {
                    self.send(StreamSignal::Connected {
                        resumed_from: last_offset,
                    });
                    self.pump(messages, &mut failures).await
                }
                Err(e) => ConnectionEnd::Dropped(e),
            };

            let error = match end {
                ConnectionEnd::Cancelled => return,
                ConnectionEnd::ServerClosed => {
                    info!(task_id = %self.task_id, "Push channel closed by server");
                    self.send(StreamSignal::Closed(CloseReason::ServerClosed));
                    return;
                }
                ConnectionEnd::Dropped(error) => error,
            };

            if !error.is_transient() {
                warn!(task_id = %self.task_id, error = %error, "Push channel failed");
                self.send(StreamSignal::Closed(CloseReason::Failed(error)));
                return;
            }

            failures += 1;
            if failures > MAX_CONSECUTIVE_FAILURES {
                warn!(task_id = %self.task_id, error = %error, "Push channel failed again, giving up");
                let terminal = SyncError::TerminalTransport(format!("reconnect failed: {error}"));
                self.send(StreamSignal::Closed(CloseReason::Failed(terminal)));
                return;
            }

            warn!(
                task_id = %self.task_id,
                error = %error,
                delay = ?self.reconnect_delay,
                "Push channel dropped, reconnecting"
            );
            self.send(StreamSignal::TransientError(error));

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return,
                () = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }
    }

    async fn pump(&self, mut messages: MessageStream, failures: &mut u32) -> ConnectionEnd {
        loop {
            let next = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return ConnectionEnd::Cancelled,
                next = messages.next() => next,
            };

            match next {
                None => return ConnectionEnd::ServerClosed,
                Some(Err(e @ SyncError::MalformedEvent { .. })) => {
                    warn!(task_id = %self.task_id, error = %e, "Dropping malformed event");
                }
                Some(Err(e)) => return ConnectionEnd::Dropped(e),
                Some(Ok(message)) => match message.into_envelope() {
                    Ok(envelope) => {
                        *failures = 0;
                        self.record_offset(envelope.offset);
                        if !self.send(StreamSignal::Event(envelope)) {
                            return ConnectionEnd::Cancelled;
                        }
                    }
                    Err(e) => {
                        warn!(task_id = %self.task_id, error = %e, "Dropping malformed event");
                    }
                },
            }
        }
    }

    fn record_offset(&self, offset: Option<u64>) {
        let Some(offset) = offset else { return };
        self.offset.send_if_modified(|current| {
            if current.is_none_or(|last| offset > last) {
                *current = Some(offset);
                true
            } else {
                debug!(offset, "Offset did not advance");
                false
            }
        });
    }

    /// Deliver a signal unless the stream was closed. A dropped receiver
    /// closes the stream.
    fn send(&self, signal: StreamSignal) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        if self.tx.send(signal).is_err() {
            self.cancel.cancel();
            return false;
        }
        true
    }
}
