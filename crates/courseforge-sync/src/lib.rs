//! Transports and orchestration for the courseforge live-build engine.
//!
//! Wires the pure core to the outside world:
//!
//! - `http` - server-sent events and status endpoint adapters (reqwest)
//! - `sse` - SSE framing over the response byte stream
//! - `stream_client` - push channel with resume and a single reconnect
//! - `poller` - fixed-period status polling, one request in flight
//! - `coordinator` - per-task tracking: restore, stream, fail over, complete
//! - `storage` - durable key-value backends for the snapshot store
#![deny(unused_crate_dependencies)]

mod config;
mod coordinator;
mod error;
mod http;
mod poller;
pub mod sse;
pub mod storage;
mod stream_client;

// ============================================================================
// Public API
// ============================================================================

pub use config::SyncConfig;
pub use coordinator::{ProgressCoordinator, TrackingHandle};
pub use error::TransportError;
pub use http::{HttpEventSource, HttpStatusClient};
pub use poller::{MAX_CONSECUTIVE_FAILURES, PollUpdate, StatusPoller, TerminalStatus};
pub use storage::FileKeyValueStore;
pub use stream_client::{CloseReason, EventStreamClient, StreamHandle, StreamSignal, StreamSignals};

// Silence unused dev-dependency warnings
#[cfg(test)]
use mockall as _;
