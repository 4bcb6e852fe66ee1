//! Snapshot persistence keyed by task.
//!
//! # Layout
//!
//! | key                  | value                              |
//! |----------------------|------------------------------------|
//! | `snapshot:{taskId}`  | JSON `{ savedAt, snapshot }`       |
//! | `lastOffset:{taskId}`| decimal offset                     |
//!
//! Only one task is kept at a time: the first save for a task evicts the
//! entries of every other task.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{Snapshot, TaskId};
use crate::errors::StorageError;
use crate::ports::KeyValueStore;

const SNAPSHOT_PREFIX: &str = "snapshot:";
const OFFSET_PREFIX: &str = "lastOffset:";

/// What a reload gets back.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredProgress {
    pub snapshot: Snapshot,
    pub last_offset: Option<u64>,
    pub saved_at: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotRecordRef<'a> {
    saved_at: DateTime<Utc>,
    snapshot: &'a Snapshot,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotRecord {
    saved_at: DateTime<Utc>,
    snapshot: Snapshot,
}

fn snapshot_key(task_id: &TaskId) -> String {
    format!("{SNAPSHOT_PREFIX}{task_id}")
}

fn offset_key(task_id: &TaskId) -> String {
    format!("{OFFSET_PREFIX}{task_id}")
}

/// Task id a key belongs to, if it is one of ours.
fn task_of(key: &str) -> Option<&str> {
    key.strip_prefix(SNAPSHOT_PREFIX)
        .or_else(|| key.strip_prefix(OFFSET_PREFIX))
}

/// Persists and restores snapshots on top of a [`KeyValueStore`].
#[derive(Clone)]
pub struct SnapshotStore {
    backend: Arc<dyn KeyValueStore>,
    /// Task whose save already evicted the others.
    active: Arc<Mutex<Option<TaskId>>>,
}

impl SnapshotStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            backend,
            active: Arc::new(Mutex::new(None)),
        }
    }

    /// Write-through of the latest snapshot and offset.
    pub async fn save(
        &self,
        task_id: &TaskId,
        snapshot: &Snapshot,
        last_offset: Option<u64>,
    ) -> Result<(), StorageError> {
        self.evict_others(task_id).await?;

        let record = SnapshotRecordRef {
            saved_at: Utc::now(),
            snapshot,
        };
        let json = serde_json::to_string(&record)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.backend.set(&snapshot_key(task_id), &json).await?;

        if let Some(offset) = last_offset {
            self.backend
                .set(&offset_key(task_id), &offset.to_string())
                .await?;
        }
        Ok(())
    }

    /// Restore the cached state for a task.
    ///
    /// Never fails: backend errors and corrupt or foreign data are logged
    /// and reported as a cache miss.
    pub async fn load(&self, task_id: &TaskId) -> Option<StoredProgress> {
        let raw = match self.backend.get(&snapshot_key(task_id)).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "Snapshot read failed, treating as cache miss");
                return None;
            }
        };

        let record: SnapshotRecord = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "Discarding unreadable cached snapshot");
                return None;
            }
        };

        let last_offset = match self.backend.get(&offset_key(task_id)).await {
            Ok(None) => None,
            Ok(Some(raw)) => match raw.trim().parse::<u64>() {
                Ok(offset) => Some(offset),
                Err(e) => {
                    warn!(task_id = %task_id, error = %e, "Discarding cache with corrupt offset");
                    return None;
                }
            },
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "Offset read failed, treating as cache miss");
                return None;
            }
        };

        debug!(task_id = %task_id, ?last_offset, "Restored cached snapshot");
        Some(StoredProgress {
            snapshot: record.snapshot,
            last_offset,
            saved_at: record.saved_at,
        })
    }

    /// Remove everything stored for a task.
    pub async fn clear(&self, task_id: &TaskId) -> Result<(), StorageError> {
        self.backend.remove(&snapshot_key(task_id)).await?;
        self.backend.remove(&offset_key(task_id)).await?;
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if active.as_ref() == Some(task_id) {
            *active = None;
        }
        Ok(())
    }

    async fn evict_others(&self, task_id: &TaskId) -> Result<(), StorageError> {
        {
            let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
            if active.as_ref() == Some(task_id) {
                return Ok(());
            }
        }

        for key in self.backend.keys().await? {
            if task_of(&key).is_some_and(|owner| owner != task_id.as_str()) {
                debug!(key = %key, "Evicting superseded task state");
                self.backend.remove(&key).await?;
            }
        }

        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = Some(task_id.clone());
        Ok(())
    }
}
