//! Text rendering of progress snapshots.

use std::fmt::Write as _;

use courseforge_core::{BuildStatus, ItemStatus, Snapshot, TaskOutcome};

const BAR_WIDTH: usize = 30;

/// Render a fraction in `0.0..=1.0` as a fixed-width bar.
///
/// ```rust
/// use courseforge_cli::presentation::progress_bar;
///
/// assert_eq!(progress_bar(0.5, 10), "[#####-----]  50%");
/// ```
pub fn progress_bar(fraction: f64, width: usize) -> String {
    let fraction = if fraction.is_finite() {
        fraction.clamp(0.0, 1.0)
    } else {
        0.0
    };
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let filled = ((fraction * width as f64).round() as usize).min(width);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let percent = (fraction * 100.0).round() as u32;
    format!(
        "[{}{}] {percent:>3}%",
        "#".repeat(filled),
        "-".repeat(width - filled)
    )
}

/// One-character marker for an item status.
pub const fn status_marker(status: ItemStatus) -> &'static str {
    match status {
        ItemStatus::Pending => " ",
        ItemStatus::Loading => "~",
        ItemStatus::Completed => "x",
        ItemStatus::Error => "!",
    }
}

/// Multi-line view of a snapshot.
pub fn render_snapshot(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    let topic = if snapshot.topic.is_empty() {
        "(topic pending)"
    } else {
        snapshot.topic.as_str()
    };
    let _ = writeln!(out, "{topic}");
    let _ = writeln!(
        out,
        "{} {}",
        progress_bar(snapshot.overall_progress, BAR_WIDTH),
        snapshot.overall_status_message
    );

    if !snapshot.search_queries.is_empty() {
        let done = snapshot
            .search_queries
            .iter()
            .filter(|q| q.status == ItemStatus::Completed)
            .count();
        let _ = writeln!(
            out,
            "  search queries: {done}/{}",
            snapshot.search_queries.len()
        );
    }
    if snapshot.topic_resources.count > 0 {
        let _ = writeln!(
            out,
            "  [{}] topic resources: {}",
            status_marker(snapshot.topic_resources.status),
            snapshot.topic_resources.count
        );
    }

    for module in &snapshot.modules {
        let _ = writeln!(
            out,
            "  [{}] {}. {}",
            status_marker(module.status),
            module.order + 1,
            module.title
        );
        for submodule in &module.submodules {
            let _ = write!(
                out,
                "      [{}] {}",
                status_marker(submodule.status),
                submodule.title
            );
            if submodule.resource_count > 0 {
                let _ = write!(out, " ({} resources)", submodule.resource_count);
            }
            if let Some(error) = &submodule.error {
                let _ = write!(out, " - {error}");
            }
            out.push('\n');
        }
    }

    match snapshot.status {
        BuildStatus::Building => {}
        BuildStatus::Completed => out.push_str("Build completed\n"),
        BuildStatus::Failed => {
            let reason = snapshot
                .error
                .as_ref()
                .map_or("unknown error", |e| e.message.as_str());
            let _ = writeln!(out, "Build failed: {reason}");
        }
    }
    out
}

/// One-line summary of the terminal outcome.
pub fn render_outcome(outcome: &TaskOutcome) -> String {
    match outcome {
        TaskOutcome::Completed {
            task_id,
            result: Some(result),
        } => format!("Task {task_id} completed: {result}"),
        TaskOutcome::Completed { task_id, .. } => format!("Task {task_id} completed"),
        TaskOutcome::Failed { task_id, error } => {
            format!("Task {task_id} failed: {}", error.message)
        }
    }
}
