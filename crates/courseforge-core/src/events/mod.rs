//! Canonical live-build events.
//!
//! The transport boundary turns every wire message into exactly one
//! [`EventEnvelope`]. The reducer only ever sees this closed union; name
//! variants and loosely-typed payloads never get past [`wire`].
//!
//! # Structure
//!
//! - `names` - wire name normalization (`EventKind`)
//! - `payloads` - typed payload structs
//! - `wire` - the raw push-channel message and its normalization

mod names;
mod payloads;
mod wire;

pub use names::EventKind;
pub use payloads::{
    ModuleOutline, ModuleRef, ModuleResourcePatch, ModuleSubmodulesPlanned, ModulesDefined,
    QueryEntry, ResourcePatch, SearchQueriesGenerated, SubmoduleFailure, SubmoduleOutline,
    SubmodulePatch, SubmoduleRef, SubmoduleResourcePatch, TopicSet,
};
pub use wire::{PreviewData, StreamAction, StreamMessage};

use crate::domain::TaskError;

/// One logical event, after normalization.
#[derive(Clone, Debug, PartialEq)]
pub enum LiveBuildEvent {
    GenerationStarted,
    TopicSet(TopicSet),
    /// Carries nothing beyond the envelope's progress and message.
    ProgressUpdate,
    SearchQueriesGenerated(SearchQueriesGenerated),
    ModulesDefined(ModulesDefined),
    ModuleSubmodulesPlanned(ModuleSubmodulesPlanned),
    AllSubmodulesPlanned,
    SubmoduleProcessingStarted(SubmoduleRef),
    SubmoduleStatusUpdate(SubmodulePatch),
    SubmoduleCompleted(SubmodulePatch),
    SubmoduleFailed(SubmoduleFailure),
    TopicResourcesStarted,
    TopicResourcesUpdate(ResourcePatch),
    ModuleResourcesStarted(ModuleRef),
    ModuleResourcesUpdate(ModuleResourcePatch),
    SubmoduleResourcesStarted(SubmoduleRef),
    SubmoduleResourcesUpdate(SubmoduleResourcePatch),
    CourseCompleted,
    TaskFailed(TaskError),
    /// A type tag outside the closed set. Ignored by the reducer.
    Unrecognized {
        event_type: String,
    },
}

impl LiveBuildEvent {
    /// Whether this event ends the task.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::CourseCompleted | Self::TaskFailed(_))
    }

    /// Name used in logs.
    pub fn name(&self) -> &str {
        match self {
            Self::GenerationStarted => EventKind::GenerationStarted.as_str(),
            Self::TopicSet(_) => EventKind::TopicSet.as_str(),
            Self::ProgressUpdate => EventKind::OverallProgressUpdate.as_str(),
            Self::SearchQueriesGenerated(_) => EventKind::SearchQueriesGenerated.as_str(),
            Self::ModulesDefined(_) => EventKind::ModulesDefined.as_str(),
            Self::ModuleSubmodulesPlanned(_) => EventKind::ModuleSubmodulesPlanned.as_str(),
            Self::AllSubmodulesPlanned => EventKind::AllSubmodulesPlanned.as_str(),
            Self::SubmoduleProcessingStarted(_) => EventKind::SubmoduleProcessingStarted.as_str(),
            Self::SubmoduleStatusUpdate(_) => EventKind::SubmoduleStatusUpdate.as_str(),
            Self::SubmoduleCompleted(_) => EventKind::SubmoduleCompleted.as_str(),
            Self::SubmoduleFailed(_) => EventKind::SubmoduleError.as_str(),
            Self::TopicResourcesStarted => EventKind::TopicResourcesStarted.as_str(),
            Self::TopicResourcesUpdate(_) => EventKind::TopicResourcesUpdate.as_str(),
            Self::ModuleResourcesStarted(_) => EventKind::ModuleResourcesStarted.as_str(),
            Self::ModuleResourcesUpdate(_) => EventKind::ModuleResourcesUpdate.as_str(),
            Self::SubmoduleResourcesStarted(_) => EventKind::SubmoduleResourcesStarted.as_str(),
            Self::SubmoduleResourcesUpdate(_) => EventKind::SubmoduleResourcesUpdate.as_str(),
            Self::CourseCompleted => EventKind::CourseCompleted.as_str(),
            Self::TaskFailed(_) => "task_failed",
            Self::Unrecognized { event_type } => event_type,
        }
    }
}

/// An event plus the fields that ride alongside any event on the wire.
#[derive(Clone, Debug, PartialEq)]
pub struct EventEnvelope {
    /// Server-assigned sequence number. Absent on some legacy events.
    pub offset: Option<u64>,
    /// Status line for the whole build.
    pub message: Option<String>,
    /// Overall progress in `0.0..=1.0`.
    pub overall_progress: Option<f64>,
    pub event: LiveBuildEvent,
}

impl EventEnvelope {
    /// Wrap an event with no offset, message or progress.
    pub const fn bare(event: LiveBuildEvent) -> Self {
        Self {
            offset: None,
            message: None,
            overall_progress: None,
            event,
        }
    }

    /// A generic progress event, as produced by the status poller.
    pub const fn progress(overall_progress: Option<f64>, message: Option<String>) -> Self {
        Self {
            offset: None,
            message,
            overall_progress,
            event: LiveBuildEvent::ProgressUpdate,
        }
    }

    #[must_use]
    pub const fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    #[must_use]
    pub const fn with_progress(mut self, progress: f64) -> Self {
        self.overall_progress = Some(progress);
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}
