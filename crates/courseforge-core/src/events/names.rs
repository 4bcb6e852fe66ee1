//! Event-name normalization.
//!
//! The push channel has carried several spellings of the same event over
//! time (`MODULES_DEFINED`, `modulesDefined`, `module-submodules-planned`,
//! historical aliases). Every spelling resolves here to one [`EventKind`].

/// Closed set of event type tags carried in `preview_data.type`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    GenerationStarted,
    TopicSet,
    OverallProgressUpdate,
    SearchQueriesGenerated,
    ModulesDefined,
    ModuleSubmodulesPlanned,
    AllSubmodulesPlanned,
    SubmoduleProcessingStarted,
    SubmoduleStatusUpdate,
    SubmoduleCompleted,
    SubmoduleError,
    TopicResourcesStarted,
    TopicResourcesUpdate,
    ModuleResourcesStarted,
    ModuleResourcesUpdate,
    SubmoduleResourcesStarted,
    SubmoduleResourcesUpdate,
    CourseCompleted,
}

impl EventKind {
    /// Every kind, in canonical order.
    pub const ALL: [Self; 18] = [
        Self::GenerationStarted,
        Self::TopicSet,
        Self::OverallProgressUpdate,
        Self::SearchQueriesGenerated,
        Self::ModulesDefined,
        Self::ModuleSubmodulesPlanned,
        Self::AllSubmodulesPlanned,
        Self::SubmoduleProcessingStarted,
        Self::SubmoduleStatusUpdate,
        Self::SubmoduleCompleted,
        Self::SubmoduleError,
        Self::TopicResourcesStarted,
        Self::TopicResourcesUpdate,
        Self::ModuleResourcesStarted,
        Self::ModuleResourcesUpdate,
        Self::SubmoduleResourcesStarted,
        Self::SubmoduleResourcesUpdate,
        Self::CourseCompleted,
    ];

    /// Canonical snake_case name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GenerationStarted => "generation_started",
            Self::TopicSet => "topic_set",
            Self::OverallProgressUpdate => "overall_progress_update",
            Self::SearchQueriesGenerated => "search_queries_generated",
            Self::ModulesDefined => "modules_defined",
            Self::ModuleSubmodulesPlanned => "module_submodules_planned",
            Self::AllSubmodulesPlanned => "all_submodules_planned",
            Self::SubmoduleProcessingStarted => "submodule_processing_started",
            Self::SubmoduleStatusUpdate => "submodule_status_update",
            Self::SubmoduleCompleted => "submodule_completed",
            Self::SubmoduleError => "submodule_error",
            Self::TopicResourcesStarted => "topic_resources_started",
            Self::TopicResourcesUpdate => "topic_resources_update",
            Self::ModuleResourcesStarted => "module_resources_started",
            Self::ModuleResourcesUpdate => "module_resources_update",
            Self::SubmoduleResourcesStarted => "submodule_resources_started",
            Self::SubmoduleResourcesUpdate => "submodule_resources_update",
            Self::CourseCompleted => "course_completed",
        }
    }

    /// Resolve any known spelling of an event name.
    ///
    /// Returns `None` for names outside the closed set; callers treat
    /// those as unrecognized rather than fatal.
    pub fn from_wire(raw: &str) -> Option<Self> {
        let canonical = canonicalize(raw);
        if let Some(kind) = Self::ALL.into_iter().find(|k| k.as_str() == canonical) {
            return Some(kind);
        }

        let kind = match canonical.as_str() {
            "started" | "course_generation_started" => Self::GenerationStarted,
            "topic" | "topic_defined" => Self::TopicSet,
            "progress" | "progress_update" => Self::OverallProgressUpdate,
            "search_queries" => Self::SearchQueriesGenerated,
            "submodules_planned" => Self::ModuleSubmodulesPlanned,
            "submodule_started" => Self::SubmoduleProcessingStarted,
            "submodule_update" | "submodule_status" => Self::SubmoduleStatusUpdate,
            "submodule_failed" => Self::SubmoduleError,
            "topic_resource_started" => Self::TopicResourcesStarted,
            "topic_resource_update" => Self::TopicResourcesUpdate,
            "module_resource_started" => Self::ModuleResourcesStarted,
            "module_resource_update" => Self::ModuleResourcesUpdate,
            "submodule_resource_started" => Self::SubmoduleResourcesStarted,
            "submodule_resource_update" => Self::SubmoduleResourcesUpdate,
            "generation_completed" | "completed" => Self::CourseCompleted,
            _ => return None,
        };
        Some(kind)
    }
}

/// Fold casing and separator variants into snake_case.
fn canonicalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 4);
    let mut prev_lower = false;
    for c in raw.trim().chars() {
        if c == '-' || c == ' ' || c == '.' || c == '_' {
            if !out.ends_with('_') && !out.is_empty() {
                out.push('_');
            }
            prev_lower = false;
        } else if c.is_ascii_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else {
            out.push(c);
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}
