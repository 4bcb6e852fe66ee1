//! Push-channel port.

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::domain::TaskId;
use crate::errors::SyncError;
use crate::events::StreamMessage;

/// Messages of one push connection, in arrival order.
///
/// Item semantics:
/// - `Ok(message)` - one wire message
/// - `Err(SyncError::MalformedEvent { .. })` - one unparseable message; the
///   connection is still usable
/// - any other `Err` - the connection dropped
/// - end of stream - the server closed the connection cleanly
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<StreamMessage, SyncError>> + Send>>;

/// Opens push connections scoped to a task.
///
/// Implementations only connect; reconnect policy belongs to the caller.
#[async_trait]
pub trait EventSourcePort: Send + Sync {
    /// Connect, asking the server to replay everything after `last_offset`.
    ///
    /// Returns `TerminalTransport` when retrying cannot help (unknown task,
    /// rejected request) and `TransientTransport` otherwise.
    async fn connect(
        &self,
        task_id: &TaskId,
        last_offset: Option<u64>,
    ) -> Result<MessageStream, SyncError>;
}
