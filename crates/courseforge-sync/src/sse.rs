//! Server-sent events framing.
//!
//! Turns the push channel's byte stream into [`StreamMessage`]s:
//!
//! ```text
//! id: 18
//! data: {"message":"Planning module 2","overall_progress":0.42, ...}
//!
//! ```
//!
//! Comment lines (keep-alives) are skipped, multi-line `data` is joined with
//! `\n`, and a frame's `id` fills in the message offset when the JSON body
//! carries none.

use bytes::{Bytes, BytesMut};
use courseforge_core::{StreamMessage, SyncError};
use futures_core::Stream;
use futures_util::StreamExt;
use tracing::{debug, warn};

/// One dispatched SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub id: Option<String>,
    pub event: Option<String>,
    pub data: String,
}

impl SseFrame {
    /// Parse the frame body as a stream message.
    pub fn into_message(self) -> Result<StreamMessage, SyncError> {
        let mut message = StreamMessage::parse(&self.data)?;
        if message.sequence().is_none() {
            message.id = self.id.as_deref().and_then(|id| id.trim().parse().ok());
        }
        Ok(message)
    }
}

/// Incremental SSE decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: BytesMut,
    data: Vec<String>,
    id: Option<String>,
    event: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes from the wire.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Next complete frame, if the buffer holds one.
    pub fn next_frame(&mut self) -> Option<SseFrame> {
        while let Some(line_end) = find_newline(&self.buf) {
            let raw = self.buf.split_to(line_end + 1);
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if let Some(frame) = self.dispatch() {
                    return Some(frame);
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "data" => self.data.push(value.to_string()),
                "id" => self.id = Some(value.to_string()),
                "event" => self.event = Some(value.to_string()),
                _ => {}
            }
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let id = self.id.take();
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame { id, event, data })
    }
}

fn find_newline(buf: &[u8]) -> Option<usize> {
    buf.iter().position(|&b| b == b'\n')
}

struct DecodeState<S> {
    stream: S,
    decoder: SseDecoder,
    done: bool,
}

/// Decode an SSE byte stream into push-channel messages.
///
/// A read error ends the stream with a transient error; a clean end of the
/// body ends it without one. A trailing frame with no blank line after it
/// is discarded.
pub fn decode_messages<S, E>(
    byte_stream: S,
) -> impl Stream<Item = Result<StreamMessage, SyncError>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = DecodeState {
        stream: byte_stream.boxed(),
        decoder: SseDecoder::new(),
        done: false,
    };

    futures_util::stream::unfold(state, |mut st| async move {
        if st.done {
            return None;
        }

        loop {
            if let Some(frame) = st.decoder.next_frame() {
                if frame.event.as_deref().is_some_and(|e| e != "message") {
                    debug!(event = ?frame.event, "Decoding named SSE event as a message");
                }
                return Some((frame.into_message(), st));
            }

            match st.stream.next().await {
                Some(Ok(chunk)) => st.decoder.push(&chunk),
                Some(Err(e)) => {
                    warn!("Push channel read error: {e}");
                    st.done = true;
                    return Some((Err(SyncError::TransientTransport(e.to_string())), st));
                }
                None => return None,
            }
        }
    })
}
