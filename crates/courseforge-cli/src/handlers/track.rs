//! Track command handler.
//!
//! Follows a running build until it reaches a terminal outcome. Ctrl-C
//! cancels tracking but keeps the cached progress, so a later `track` of
//! the same task resumes from where this one stopped.

use std::sync::Arc;

use anyhow::{Result, anyhow};
use courseforge_core::{Snapshot, TaskId, TaskOutcome};
use serde_json::json;
use tokio::sync::oneshot;
use tracing::debug;

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::presentation::{render_outcome, render_snapshot};

/// Execute the track command.
///
/// # Errors
///
/// Returns [`CliError::TaskFailed`] when the build ends in failure
/// (including an unknown task id).
pub async fn execute(ctx: &CliContext, task_id: &str, json: bool) -> Result<()> {
    let task_id = TaskId::new(task_id);
    let (outcome_tx, outcome_rx) = oneshot::channel();

    let handle = ctx.coordinator.track(
        task_id.clone(),
        move |snapshot: Arc<Snapshot>| print_snapshot(&snapshot, json),
        move |outcome| {
            let _ = outcome_tx.send(outcome);
        },
    );

    tokio::select! {
        outcome = outcome_rx => {
            // Let the session clear its cache before the process exits
            handle.finished().await;
            let outcome = outcome.map_err(|_| anyhow!("tracking of {task_id} ended without an outcome"))?;
            report(&outcome, json)
        }
        _ = tokio::signal::ctrl_c() => {
            debug!(task_id = %task_id, "Interrupted");
            handle.cancel();
            handle.finished().await;
            eprintln!("Stopped tracking {task_id}. Run `courseforge track {task_id}` to resume.");
            Ok(())
        }
    }
}

fn print_snapshot(snapshot: &Snapshot, json: bool) {
    if json {
        match serde_json::to_string(snapshot) {
            Ok(line) => println!("{line}"),
            Err(e) => debug!(error = %e, "Snapshot not serializable"),
        }
    } else {
        println!("{}", render_snapshot(snapshot));
    }
}

/// JSON form of an outcome, one line per run.
pub fn outcome_json(outcome: &TaskOutcome) -> serde_json::Value {
    match outcome {
        TaskOutcome::Completed { task_id, result } => json!({
            "taskId": task_id.as_str(),
            "status": "completed",
            "result": result,
        }),
        TaskOutcome::Failed { task_id, error } => json!({
            "taskId": task_id.as_str(),
            "status": "failed",
            "error": error,
        }),
    }
}

fn report(outcome: &TaskOutcome, json: bool) -> Result<()> {
    if json {
        println!("{}", outcome_json(outcome));
    } else {
        println!("{}", render_outcome(outcome));
    }

    match outcome {
        TaskOutcome::Completed { .. } => Ok(()),
        TaskOutcome::Failed { error, .. } => Err(CliError::from(error.clone()).into()),
    }
}
