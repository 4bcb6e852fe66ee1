//! Replay command handler.
//!
//! Folds a recorded push-channel log into the snapshot a live client would
//! have shown. Each non-empty line holds one JSON message in the push
//! format; unreadable lines are skipped with a warning.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use courseforge_core::{EventEnvelope, Snapshot, StreamMessage, replay};
use tracing::warn;

use crate::error::CliError;
use crate::presentation::render_snapshot;

/// Parse a log into envelopes, dropping lines that do not decode.
pub fn parse_log(contents: &str) -> Vec<EventEnvelope> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(index, line)| {
            match StreamMessage::parse(line).and_then(StreamMessage::into_envelope) {
                Ok(envelope) => Some(envelope),
                Err(e) => {
                    warn!(line = index + 1, error = %e, "Skipping unreadable log line");
                    None
                }
            }
        })
        .collect()
}

/// Read and fold the log at `path`.
pub async fn replay_file(path: &Path) -> Result<Arc<Snapshot>> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(CliError::from)
        .with_context(|| format!("reading {}", path.display()))?;
    let events = parse_log(&contents);
    Ok(replay(&events))
}

/// Execute the replay command.
pub async fn execute(path: &Path, json: bool) -> Result<()> {
    let snapshot = replay_file(path).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&*snapshot)?);
    } else {
        print!("{}", render_snapshot(&snapshot));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use courseforge_core::{BuildStatus, ItemStatus};
    use std::io::Write;

    const LOG: &str = r#"{"id": 1, "message": "Starting", "overall_progress": 0.0, "preview_data": {"type": "generation_started"}}
{"id": 2, "preview_data": {"type": "topic_set", "data": {"topic": "Rust"}}}

{"id": 3, "overall_progress": 0.3, "preview_data": {"type": "modules_defined", "data": {"modules": [{"id": "m1", "title": "Ownership"}]}}}
this line is garbage
{"id": 4, "overall_progress": 0.6, "message": "Almost"}
"#;

    #[test]
    fn garbage_and_blank_lines_are_skipped() {
        let events = parse_log(LOG);
        assert_eq!(events.len(), 4);
        assert_eq!(events.last().and_then(|e| e.offset), Some(4));
    }

    #[tokio::test]
    async fn replays_log_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(LOG.as_bytes()).unwrap();

        let snapshot = replay_file(file.path()).await.unwrap();
        assert_eq!(snapshot.topic, "Rust");
        assert_eq!(snapshot.modules.len(), 1);
        assert_eq!(snapshot.modules[0].status, ItemStatus::Pending);
        assert!((snapshot.overall_progress - 0.6).abs() < f64::EPSILON);
        assert_eq!(snapshot.status, BuildStatus::Building);
    }

    #[tokio::test]
    async fn completed_log_ends_terminal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", r#"{"id": 1, "overall_progress": 0.5}"#).unwrap();
        writeln!(file, "{}", r#"{"id": 2, "action": "completed"}"#).unwrap();

        let snapshot = replay_file(file.path()).await.unwrap();
        assert_eq!(snapshot.status, BuildStatus::Completed);
        assert!((snapshot.overall_progress - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let err = replay_file(Path::new("/definitely/not/here.jsonl"))
            .await
            .unwrap_err();
        assert_eq!(err.downcast_ref::<CliError>().map(CliError::exit_code), Some(74));
    }
}
