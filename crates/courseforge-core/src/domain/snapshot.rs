//! The live-build snapshot: a materialized view of the event log so far.
//!
//! Consumers receive snapshots behind an `Arc` and must treat them as
//! immutable. Only the reducer produces new ones.

use serde::{Deserialize, Serialize};

use super::task::TaskError;

/// Status of a single item in the progress tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Known but not started.
    #[default]
    Pending,
    /// Work is in flight.
    #[serde(alias = "in_progress", alias = "processing", alias = "running")]
    Loading,
    /// Finished successfully.
    #[serde(alias = "done", alias = "success")]
    Completed,
    /// Finished with an error.
    #[serde(alias = "failed")]
    Error,
}

impl ItemStatus {
    /// `pending` or `loading`.
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Pending | Self::Loading)
    }

    /// `completed` or `error`.
    pub const fn is_settled(self) -> bool {
        !self.is_open()
    }

    /// Collapse an open status to `completed`, leaving settled ones alone.
    pub(crate) const fn settle(&mut self) {
        if self.is_open() {
            *self = Self::Completed;
        }
    }
}

/// Overall lifecycle of the build as seen by the reducer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    #[default]
    Building,
    Completed,
    Failed,
}

impl BuildStatus {
    /// Whether a terminal event has been applied.
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Building)
    }
}

/// One generated search query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub text: String,
    pub status: ItemStatus,
}

/// Short description of a discovered resource, used for previews.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSummary {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(
        default,
        alias = "resource_type",
        alias = "type",
        skip_serializing_if = "Option::is_none"
    )]
    pub resource_type: Option<String>,
}

/// Resources collected for the topic as a whole.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicResources {
    pub status: ItemStatus,
    pub count: u32,
    pub preview: Vec<ResourceSummary>,
}

/// A submodule node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmoduleProgress {
    pub id: String,
    pub title: String,
    pub order: u32,
    pub status: ItemStatus,
    pub resource_status: ItemStatus,
    pub resource_count: u32,
    pub quiz_question_count: u32,
    pub search_result_count: u32,
    pub error: Option<String>,
}

impl SubmoduleProgress {
    /// A freshly planned submodule.
    pub fn new(id: impl Into<String>, title: impl Into<String>, order: u32) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            order,
            status: ItemStatus::Pending,
            resource_status: ItemStatus::Pending,
            resource_count: 0,
            quiz_question_count: 0,
            search_result_count: 0,
            error: None,
        }
    }
}

/// A module node with its ordered submodules.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleProgress {
    pub id: String,
    pub title: String,
    pub order: u32,
    pub status: ItemStatus,
    pub resource_status: ItemStatus,
    pub resource_count: u32,
    pub resource_preview: Vec<ResourceSummary>,
    pub submodules: Vec<SubmoduleProgress>,
}

impl ModuleProgress {
    /// A freshly defined module with no submodules yet.
    pub fn new(id: impl Into<String>, title: impl Into<String>, order: u32) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            order,
            status: ItemStatus::Pending,
            resource_status: ItemStatus::Pending,
            resource_count: 0,
            resource_preview: Vec::new(),
            submodules: Vec::new(),
        }
    }

    /// Look up a submodule by id.
    pub fn submodule(&self, id: &str) -> Option<&SubmoduleProgress> {
        self.submodules.iter().find(|s| s.id == id)
    }

    pub(crate) fn submodule_mut(&mut self, id: &str) -> Option<&mut SubmoduleProgress> {
        self.submodules.iter_mut().find(|s| s.id == id)
    }
}

/// The materialized progress tree.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub topic: String,
    pub overall_status_message: String,
    /// Always within `0.0..=1.0` and never decreasing.
    pub overall_progress: f64,
    pub search_queries: Vec<SearchQuery>,
    pub topic_resources: TopicResources,
    pub modules: Vec<ModuleProgress>,
    #[serde(default)]
    pub status: BuildStatus,
    pub error: Option<TaskError>,
}

impl Snapshot {
    /// The empty snapshot every task starts from.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether a terminal event has been applied.
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Look up a module by id.
    pub fn module(&self, id: &str) -> Option<&ModuleProgress> {
        self.modules.iter().find(|m| m.id == id)
    }

    pub(crate) fn module_mut(&mut self, id: &str) -> Option<&mut ModuleProgress> {
        self.modules.iter_mut().find(|m| m.id == id)
    }

    /// Look up a submodule by its module and submodule ids.
    pub fn submodule(&self, module_id: &str, submodule_id: &str) -> Option<&SubmoduleProgress> {
        self.module(module_id)?.submodule(submodule_id)
    }

    /// Total number of submodules across all modules.
    pub fn submodule_count(&self) -> usize {
        self.modules.iter().map(|m| m.submodules.len()).sum()
    }
}
