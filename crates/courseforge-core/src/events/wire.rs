//! Push-channel wire format and its normalization into [`EventEnvelope`].
//!
//! ```json
//! { "id": 18, "message": "Planning module 2", "overall_progress": 0.42,
//!   "preview_data": { "type": "MODULE_SUBMODULES_PLANNED", "data": { ... } } }
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::names::EventKind;
use super::{EventEnvelope, LiveBuildEvent};
use crate::domain::TaskError;
use crate::errors::SyncError;

const DEFAULT_FAILURE_MESSAGE: &str = "Course generation failed";

/// Terminal marker some messages carry instead of (or next to) a preview.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamAction {
    Completed,
    Error,
}

impl StreamAction {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "completed" | "complete" | "done" => Some(Self::Completed),
            "error" | "failed" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Typed preview carried by most messages.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PreviewData {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// One message as sent on the push channel.
///
/// Older servers name the sequence number `offset` instead of `id`. Both
/// may appear on the same message; `id` then wins.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Legacy spelling of `id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(
        default,
        alias = "overallProgress",
        skip_serializing_if = "Option::is_none"
    )]
    pub overall_progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, alias = "previewData", skip_serializing_if = "Option::is_none")]
    pub preview_data: Option<PreviewData>,
}

impl StreamMessage {
    /// Parse one message body.
    pub fn parse(raw: &str) -> Result<Self, SyncError> {
        serde_json::from_str(raw).map_err(|e| SyncError::malformed("<message>", e.to_string()))
    }

    /// Server sequence number under either spelling.
    pub const fn sequence(&self) -> Option<u64> {
        match self.id {
            Some(id) => Some(id),
            None => self.offset,
        }
    }

    /// Normalize into the canonical envelope.
    ///
    /// An `action` wins over `preview_data`: a message marked `completed`
    /// or `error` is terminal whatever preview rides along. Messages with
    /// neither become generic progress updates.
    pub fn into_envelope(self) -> Result<EventEnvelope, SyncError> {
        let offset = self.sequence();
        let action = self.action.as_deref().and_then(|raw| {
            let parsed = StreamAction::parse(raw);
            if parsed.is_none() {
                warn!(action = raw, "Ignoring unknown stream action");
            }
            parsed
        });

        let event = match (action, self.preview_data) {
            (Some(StreamAction::Completed), _) => LiveBuildEvent::CourseCompleted,
            (Some(StreamAction::Error), _) => LiveBuildEvent::TaskFailed(TaskError::reported(
                self.message
                    .clone()
                    .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string()),
            )),
            (None, None) => LiveBuildEvent::ProgressUpdate,
            (None, Some(preview)) => decode_preview(preview)?,
        };

        Ok(EventEnvelope {
            offset,
            message: self.message,
            overall_progress: self.overall_progress,
            event,
        })
    }
}

fn decode_preview(preview: PreviewData) -> Result<LiveBuildEvent, SyncError> {
    let Some(kind) = EventKind::from_wire(&preview.kind) else {
        return Ok(LiveBuildEvent::Unrecognized {
            event_type: preview.kind,
        });
    };

    let data = preview.data;
    let event = match kind {
        EventKind::GenerationStarted => LiveBuildEvent::GenerationStarted,
        EventKind::TopicSet => LiveBuildEvent::TopicSet(payload(kind, data)?),
        EventKind::OverallProgressUpdate => LiveBuildEvent::ProgressUpdate,
        EventKind::SearchQueriesGenerated => {
            LiveBuildEvent::SearchQueriesGenerated(payload(kind, data)?)
        }
        EventKind::ModulesDefined => LiveBuildEvent::ModulesDefined(payload(kind, data)?),
        EventKind::ModuleSubmodulesPlanned => {
            LiveBuildEvent::ModuleSubmodulesPlanned(payload(kind, data)?)
        }
        EventKind::AllSubmodulesPlanned => LiveBuildEvent::AllSubmodulesPlanned,
        EventKind::SubmoduleProcessingStarted => {
            LiveBuildEvent::SubmoduleProcessingStarted(payload(kind, data)?)
        }
        EventKind::SubmoduleStatusUpdate => {
            LiveBuildEvent::SubmoduleStatusUpdate(payload(kind, data)?)
        }
        EventKind::SubmoduleCompleted => LiveBuildEvent::SubmoduleCompleted(payload(kind, data)?),
        EventKind::SubmoduleError => LiveBuildEvent::SubmoduleFailed(payload(kind, data)?),
        EventKind::TopicResourcesStarted => LiveBuildEvent::TopicResourcesStarted,
        EventKind::TopicResourcesUpdate => {
            LiveBuildEvent::TopicResourcesUpdate(payload(kind, data)?)
        }
        EventKind::ModuleResourcesStarted => {
            LiveBuildEvent::ModuleResourcesStarted(payload(kind, data)?)
        }
        EventKind::ModuleResourcesUpdate => {
            LiveBuildEvent::ModuleResourcesUpdate(payload(kind, data)?)
        }
        EventKind::SubmoduleResourcesStarted => {
            LiveBuildEvent::SubmoduleResourcesStarted(payload(kind, data)?)
        }
        EventKind::SubmoduleResourcesUpdate => {
            LiveBuildEvent::SubmoduleResourcesUpdate(payload(kind, data)?)
        }
        EventKind::CourseCompleted => LiveBuildEvent::CourseCompleted,
    };
    Ok(event)
}

fn payload<T: DeserializeOwned>(kind: EventKind, data: serde_json::Value) -> Result<T, SyncError> {
    serde_json::from_value(data).map_err(|e| SyncError::malformed(kind.as_str(), e.to_string()))
}
