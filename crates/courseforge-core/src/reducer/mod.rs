//! The progress reducer: folds one event into the previous snapshot.
//!
//! # Rules
//!
//! - Pure and synchronous. No clocks, no I/O, no ambient state, so replaying
//!   the same ordered log always yields the same snapshot.
//! - Total. Unknown events and references to unknown ids are no-ops.
//! - Progress never decreases; a regressing value is dropped together with
//!   the status message it came with.
//! - Structural events replace their sub-tree's shape but carry over the
//!   progress of ids that survive, so a duplicate delivery is a no-op.
//! - Patch events only touch the fields they carry.
//! - After a terminal event nothing changes.
//!
//! When an event changes nothing, the previous `Arc` is returned as is.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::domain::{
    BuildStatus, ItemStatus, ModuleProgress, SearchQuery, Snapshot, SubmoduleProgress,
    TopicResources,
};
use crate::events::{
    EventEnvelope, LiveBuildEvent, ModuleResourcePatch, ModuleSubmodulesPlanned, ModulesDefined,
    QueryEntry, ResourcePatch, SearchQueriesGenerated, SubmoduleFailure, SubmodulePatch,
    SubmoduleRef, SubmoduleResourcePatch,
};

const SUBMODULE_FAILED_MESSAGE: &str = "Submodule generation failed";

/// Apply one event to a snapshot.
pub fn reduce(prev: &Arc<Snapshot>, envelope: &EventEnvelope) -> Arc<Snapshot> {
    if let LiveBuildEvent::Unrecognized { event_type } = &envelope.event {
        debug!(event_type = %event_type, "Ignoring unrecognized event");
        return Arc::clone(prev);
    }

    if prev.is_terminal() {
        trace!(event = envelope.event.name(), "Ignoring event after terminal state");
        return Arc::clone(prev);
    }

    let mut next = Snapshot::clone(prev);
    apply_progress(&mut next, envelope);
    apply_event(&mut next, &envelope.event);

    if next == **prev {
        Arc::clone(prev)
    } else {
        Arc::new(next)
    }
}

/// Fold an ordered log from the empty snapshot.
pub fn replay<'a>(events: impl IntoIterator<Item = &'a EventEnvelope>) -> Arc<Snapshot> {
    replay_onto(Arc::new(Snapshot::empty()), events)
}

/// Fold an ordered log onto an existing snapshot.
pub fn replay_onto<'a>(
    start: Arc<Snapshot>,
    events: impl IntoIterator<Item = &'a EventEnvelope>,
) -> Arc<Snapshot> {
    events
        .into_iter()
        .fold(start, |snapshot, envelope| reduce(&snapshot, envelope))
}

fn apply_progress(snapshot: &mut Snapshot, envelope: &EventEnvelope) {
    match envelope.overall_progress.filter(|p| p.is_finite()) {
        Some(progress) => {
            let progress = progress.clamp(0.0, 1.0);
            if progress < snapshot.overall_progress {
                trace!(
                    current = snapshot.overall_progress,
                    received = progress,
                    "Dropping regressing progress"
                );
                return;
            }
            snapshot.overall_progress = progress;
            if let Some(message) = &envelope.message {
                snapshot.overall_status_message.clone_from(message);
            }
        }
        None => {
            if let Some(message) = &envelope.message {
                snapshot.overall_status_message.clone_from(message);
            }
        }
    }
}

fn apply_event(snapshot: &mut Snapshot, event: &LiveBuildEvent) {
    match event {
        LiveBuildEvent::GenerationStarted
        | LiveBuildEvent::ProgressUpdate
        | LiveBuildEvent::AllSubmodulesPlanned
        | LiveBuildEvent::Unrecognized { .. } => {}
        LiveBuildEvent::TopicSet(payload) => snapshot.topic.clone_from(&payload.topic),
        LiveBuildEvent::SearchQueriesGenerated(payload) => set_search_queries(snapshot, payload),
        LiveBuildEvent::ModulesDefined(payload) => define_modules(snapshot, payload),
        LiveBuildEvent::ModuleSubmodulesPlanned(payload) => plan_submodules(snapshot, payload),
        LiveBuildEvent::SubmoduleProcessingStarted(target) => start_submodule(snapshot, target),
        LiveBuildEvent::SubmoduleStatusUpdate(patch) => patch_submodule(snapshot, patch, None),
        LiveBuildEvent::SubmoduleCompleted(patch) => {
            patch_submodule(snapshot, patch, Some(ItemStatus::Completed));
        }
        LiveBuildEvent::SubmoduleFailed(failure) => fail_submodule(snapshot, failure),
        LiveBuildEvent::TopicResourcesStarted => {
            start_resources(&mut snapshot.topic_resources.status);
        }
        LiveBuildEvent::TopicResourcesUpdate(patch) => {
            patch_topic_resources(&mut snapshot.topic_resources, patch);
        }
        LiveBuildEvent::ModuleResourcesStarted(target) => {
            if let Some(module) = snapshot.module_mut(&target.module_id) {
                start_resources(&mut module.resource_status);
            }
        }
        LiveBuildEvent::ModuleResourcesUpdate(patch) => patch_module_resources(snapshot, patch),
        LiveBuildEvent::SubmoduleResourcesStarted(target) => {
            if let Some(submodule) = find_submodule(snapshot, &target.module_id, &target.submodule_id)
            {
                start_resources(&mut submodule.resource_status);
            }
        }
        LiveBuildEvent::SubmoduleResourcesUpdate(patch) => {
            patch_submodule_resources(snapshot, patch);
        }
        LiveBuildEvent::CourseCompleted => {
            snapshot.overall_progress = 1.0;
            snapshot.status = BuildStatus::Completed;
            settle_all(snapshot);
        }
        LiveBuildEvent::TaskFailed(error) => {
            snapshot.status = BuildStatus::Failed;
            snapshot.error = Some(error.clone());
            settle_all(snapshot);
        }
    }
}

fn set_search_queries(snapshot: &mut Snapshot, payload: &SearchQueriesGenerated) {
    snapshot.search_queries = payload
        .queries
        .iter()
        .map(|entry| match entry {
            QueryEntry::Text(text) => SearchQuery {
                text: text.clone(),
                status: ItemStatus::Completed,
            },
            QueryEntry::Detailed { text, status } => SearchQuery {
                text: text.clone(),
                status: status.unwrap_or(ItemStatus::Completed),
            },
        })
        .collect();
}

fn define_modules(snapshot: &mut Snapshot, payload: &ModulesDefined) {
    let mut existing: HashMap<String, ModuleProgress> = snapshot
        .modules
        .drain(..)
        .map(|m| (m.id.clone(), m))
        .collect();

    let mut modules = Vec::with_capacity(payload.modules.len());
    for (index, outline) in payload.modules.iter().enumerate() {
        if modules.iter().any(|m: &ModuleProgress| m.id == outline.id) {
            debug!(module_id = %outline.id, "Skipping duplicate module id");
            continue;
        }
        let order = outline.order.unwrap_or_else(|| position(index));
        let module = match existing.remove(&outline.id) {
            Some(mut module) => {
                module.title.clone_from(&outline.title);
                module.order = order;
                module
            }
            None => ModuleProgress::new(outline.id.clone(), outline.title.clone(), order),
        };
        modules.push(module);
    }
    modules.sort_by_key(|m| m.order);
    snapshot.modules = modules;
}

fn plan_submodules(snapshot: &mut Snapshot, payload: &ModuleSubmodulesPlanned) {
    let Some(module) = snapshot.module_mut(&payload.module_id) else {
        debug!(module_id = %payload.module_id, "Submodules planned for unknown module");
        return;
    };

    let mut existing: HashMap<String, SubmoduleProgress> = module
        .submodules
        .drain(..)
        .map(|s| (s.id.clone(), s))
        .collect();

    let mut submodules = Vec::with_capacity(payload.submodules.len());
    for (index, outline) in payload.submodules.iter().enumerate() {
        if submodules
            .iter()
            .any(|s: &SubmoduleProgress| s.id == outline.id)
        {
            debug!(submodule_id = %outline.id, "Skipping duplicate submodule id");
            continue;
        }
        let order = outline.order.unwrap_or_else(|| position(index));
        let submodule = match existing.remove(&outline.id) {
            Some(mut submodule) => {
                submodule.title.clone_from(&outline.title);
                submodule.order = order;
                submodule
            }
            None => SubmoduleProgress::new(outline.id.clone(), outline.title.clone(), order),
        };
        submodules.push(submodule);
    }
    submodules.sort_by_key(|s| s.order);
    module.submodules = submodules;

    if module.status == ItemStatus::Pending {
        module.status = ItemStatus::Loading;
    }
    settle_module_if_done(module);
}

fn start_submodule(snapshot: &mut Snapshot, target: &SubmoduleRef) {
    let Some(module) = snapshot.module_mut(&target.module_id) else {
        return;
    };
    if module.status == ItemStatus::Pending {
        module.status = ItemStatus::Loading;
    }
    if let Some(submodule) = module.submodule_mut(&target.submodule_id) {
        if submodule.status == ItemStatus::Pending {
            submodule.status = ItemStatus::Loading;
        }
    }
}

fn patch_submodule(snapshot: &mut Snapshot, patch: &SubmodulePatch, forced: Option<ItemStatus>) {
    let Some(module) = snapshot.module_mut(&patch.module_id) else {
        debug!(module_id = %patch.module_id, "Patch for unknown module");
        return;
    };
    let Some(submodule) = module.submodule_mut(&patch.submodule_id) else {
        debug!(
            module_id = %patch.module_id,
            submodule_id = %patch.submodule_id,
            "Patch for unknown submodule"
        );
        return;
    };

    if let Some(title) = &patch.title {
        submodule.title.clone_from(title);
    }
    if let Some(status) = forced.or(patch.status) {
        submodule.status = status;
    }
    if let Some(status) = patch.resource_status {
        submodule.resource_status = status;
    }
    if let Some(count) = patch.resource_count {
        submodule.resource_count = count;
    }
    if let Some(count) = patch.quiz_question_count {
        submodule.quiz_question_count = count;
    }
    if let Some(count) = patch.search_result_count {
        submodule.search_result_count = count;
    }

    if module.status == ItemStatus::Pending {
        module.status = ItemStatus::Loading;
    }
    settle_module_if_done(module);
}

fn fail_submodule(snapshot: &mut Snapshot, failure: &SubmoduleFailure) {
    let Some(module) = snapshot.module_mut(&failure.module_id) else {
        return;
    };
    let Some(submodule) = module.submodule_mut(&failure.submodule_id) else {
        return;
    };
    submodule.status = ItemStatus::Error;
    submodule.error = Some(
        failure
            .error
            .clone()
            .unwrap_or_else(|| SUBMODULE_FAILED_MESSAGE.to_string()),
    );
    settle_module_if_done(module);
}

fn start_resources(status: &mut ItemStatus) {
    if *status == ItemStatus::Pending {
        *status = ItemStatus::Loading;
    }
}

fn patch_topic_resources(resources: &mut TopicResources, patch: &ResourcePatch) {
    if let Some(status) = patch.status {
        resources.status = status;
    }
    if let Some(count) = patch.count {
        resources.count = count;
    }
    if let Some(preview) = &patch.preview {
        resources.preview.clone_from(preview);
    }
}

fn patch_module_resources(snapshot: &mut Snapshot, payload: &ModuleResourcePatch) {
    let Some(module) = snapshot.module_mut(&payload.module_id) else {
        return;
    };
    let patch = &payload.patch;
    if let Some(status) = patch.status {
        module.resource_status = status;
    }
    if let Some(count) = patch.count {
        module.resource_count = count;
    }
    if let Some(preview) = &patch.preview {
        module.resource_preview.clone_from(preview);
    }
}

fn patch_submodule_resources(snapshot: &mut Snapshot, patch: &SubmoduleResourcePatch) {
    let Some(submodule) = find_submodule(snapshot, &patch.module_id, &patch.submodule_id) else {
        return;
    };
    if let Some(status) = patch.status {
        submodule.resource_status = status;
    }
    if let Some(count) = patch.count {
        submodule.resource_count = count;
    }
}

fn find_submodule<'a>(
    snapshot: &'a mut Snapshot,
    module_id: &str,
    submodule_id: &str,
) -> Option<&'a mut SubmoduleProgress> {
    snapshot.module_mut(module_id)?.submodule_mut(submodule_id)
}

/// A module whose submodules have all settled is itself complete.
fn settle_module_if_done(module: &mut ModuleProgress) {
    if !module.submodules.is_empty()
        && module.submodules.iter().all(|s| s.status.is_settled())
        && module.status.is_open()
    {
        module.status = ItemStatus::Completed;
    }
}

/// No per-item events follow a terminal event, so nothing stays open.
fn settle_all(snapshot: &mut Snapshot) {
    snapshot.topic_resources.status.settle();
    for query in &mut snapshot.search_queries {
        query.status.settle();
    }
    for module in &mut snapshot.modules {
        module.status.settle();
        module.resource_status.settle();
        for submodule in &mut module.submodules {
            submodule.status.settle();
            submodule.resource_status.settle();
        }
    }
}

fn position(index: usize) -> u32 {
    u32::try_from(index).unwrap_or(u32::MAX)
}
