//! Tracking state machine and the completion latch.
//!
//! ```text
//! INIT ──▶ STREAMING ⇄ (reconnect) ──▶ POLLING ──▶ DONE
//!   │          │                                    ▲
//!   └──────────┴───────────────▶ POLLING / DONE ────┘
//! ```
//!
//! `DONE` is terminal. Exactly one completion is delivered per task, no
//! matter how many transports report a terminal status.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

/// Phase of one tracked task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingPhase {
    /// Restoring cached state, no transport open yet.
    Init,
    /// Push channel connected.
    Streaming,
    /// Push channel gone; pulling status.
    Polling,
    /// Completed, failed or cancelled.
    Done,
}

impl TrackingPhase {
    /// Whether `self -> next` is a legal transition.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Init, Self::Streaming | Self::Polling | Self::Done)
                | (Self::Streaming, Self::Streaming | Self::Polling | Self::Done)
                | (Self::Polling, Self::Done)
        )
    }

    pub const fn is_done(self) -> bool {
        matches!(self, Self::Done)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Streaming => "streaming",
            Self::Polling => "polling",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for TrackingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected phase transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid tracking transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: TrackingPhase,
    pub to: TrackingPhase,
}

/// Owns the current phase and publishes every change.
#[derive(Debug)]
pub struct PhaseTracker {
    tx: watch::Sender<TrackingPhase>,
}

impl PhaseTracker {
    /// Start in `INIT`. The receiver observes every later transition.
    pub fn new() -> (Self, watch::Receiver<TrackingPhase>) {
        let (tx, rx) = watch::channel(TrackingPhase::Init);
        (Self { tx }, rx)
    }

    pub fn current(&self) -> TrackingPhase {
        *self.tx.borrow()
    }

    /// Move to `next`, refusing illegal transitions.
    pub fn advance(&self, next: TrackingPhase) -> Result<TrackingPhase, InvalidTransition> {
        let from = self.current();
        if !from.can_transition_to(next) {
            return Err(InvalidTransition { from, to: next });
        }
        self.tx.send_replace(next);
        Ok(from)
    }

    /// Another receiver for the same phase.
    pub fn subscribe(&self) -> watch::Receiver<TrackingPhase> {
        self.tx.subscribe()
    }
}

type Callback<T> = Box<dyn FnOnce(T) + Send>;

/// Guards a completion callback so it runs at most once.
///
/// Whoever takes the callback first wins: `fire` delivers, `disarm`
/// discards. Both are safe to call from any task, any number of times.
pub struct CompletionLatch<T> {
    callback: Mutex<Option<Callback<T>>>,
}

impl<T> CompletionLatch<T> {
    pub fn new(callback: impl FnOnce(T) + Send + 'static) -> Self {
        Self {
            callback: Mutex::new(Some(Box::new(callback))),
        }
    }

    fn take(&self) -> Option<Callback<T>> {
        self.callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Deliver `value` if nobody fired or disarmed the latch before.
    ///
    /// Returns whether the callback ran.
    pub fn fire(&self, value: T) -> bool {
        match self.take() {
            Some(callback) => {
                callback(value);
                true
            }
            None => false,
        }
    }

    /// Drop the callback without running it.
    pub fn disarm(&self) -> bool {
        self.take().is_some()
    }

    /// Whether the callback has been consumed either way.
    pub fn is_spent(&self) -> bool {
        self.callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl<T> fmt::Debug for CompletionLatch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionLatch")
            .field("spent", &self.is_spent())
            .finish()
    }
}
