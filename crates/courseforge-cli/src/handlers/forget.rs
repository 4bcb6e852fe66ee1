//! Forget command handler.

use anyhow::Result;
use courseforge_core::TaskId;

use crate::bootstrap::CliContext;
use crate::error::CliError;

/// Discard cached progress for `task_id`.
///
/// Tracking the task again afterwards starts from an empty snapshot and
/// replays the whole event log.
pub async fn execute(ctx: &CliContext, task_id: &str) -> Result<()> {
    let task_id = TaskId::new(task_id);

    if ctx.store.load(&task_id).await.is_none() {
        println!("No cached progress for task {task_id}");
        return Ok(());
    }

    ctx.coordinator
        .abandon(&task_id)
        .await
        .map_err(CliError::from)?;
    println!("Forgot cached progress for task {task_id}");
    Ok(())
}
