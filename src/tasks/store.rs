//! File-backed task record store.
//!
//! One JSON document per task id under `<root>/tasks/`, plus an optional
//! sibling `<id>.state.json` blob holding stage-specific progress data. The
//! store keeps an in-memory index of non-terminal ("active") task ids: a
//! cache over the records, rebuilt from the directory on open and maintained
//! under the same write lock as every mutation — never an independent write
//! path. Admission decisions count this index, not directory entries.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::observability::LatencyTracker;
use crate::storage::{read_json, remove_if_exists, write_json_atomic};
use crate::tasks::model::{Task, TaskFilter};

const RECORD_SUFFIX: &str = ".json";
const STATE_SUFFIX: &str = ".state.json";

pub struct TaskStore {
    tasks_dir: PathBuf,
    /// Ids of tasks whose status is not terminal.
    active: RwLock<HashSet<String>>,
}

impl TaskStore {
    /// Open the store rooted at `storage_root`, creating the tasks directory
    /// and rebuilding the active index from the records already on disk.
    pub async fn open(storage_root: &Path) -> Result<Self> {
        let tasks_dir = storage_root.join("tasks");
        tokio::fs::create_dir_all(&tasks_dir).await?;

        let mut active = HashSet::new();
        let mut entries = tokio::fs::read_dir(&tasks_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.ends_with(RECORD_SUFFIX) || name.ends_with(STATE_SUFFIX) {
                continue;
            }
            match read_json::<Task>(&entry.path()).await {
                Ok(Some(task)) => {
                    if !task.status.is_terminal() {
                        active.insert(task.id);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(file = %entry.path().display(), err = %e, "skipping unreadable task record during index rebuild");
                }
            }
        }

        info!(dir = %tasks_dir.display(), active = active.len(), "task store opened");
        Ok(Self {
            tasks_dir,
            active: RwLock::new(active),
        })
    }

    /// Number of non-terminal tasks.
    pub async fn active_count(&self) -> usize {
        self.active.read().await.len()
    }

    /// Persist a new task if the active count is below `max_active`.
    ///
    /// The write lock is held across the capacity check and the insert so two
    /// concurrent creates cannot both pass the check and exceed the cap.
    pub async fn try_insert(&self, task: Task, max_active: usize) -> Result<Task> {
        let mut active = self.active.write().await;
        if active.len() >= max_active {
            return Err(Error::CapacityExceeded { limit: max_active });
        }
        write_json_atomic(&self.record_path(&task.id), &task).await?;
        if !task.status.is_terminal() {
            active.insert(task.id.clone());
        }
        debug!(task_id = %task.id, active = active.len(), "task record inserted");
        Ok(task)
    }

    /// Read a single record. Absence is `Ok(None)`.
    pub async fn get(&self, id: &str) -> Result<Option<Task>> {
        read_json(&self.record_path(id)).await
    }

    /// Read-modify-write a record under the store lock. The closure validates
    /// and applies the mutation; nothing is persisted if it errors.
    pub async fn update(
        &self,
        id: &str,
        mutate: impl FnOnce(&mut Task) -> Result<()>,
    ) -> Result<Task> {
        let mut active = self.active.write().await;
        let path = self.record_path(id);
        let mut task: Task = read_json(&path)
            .await?
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))?;
        mutate(&mut task)?;
        write_json_atomic(&path, &task).await?;
        if task.status.is_terminal() {
            active.remove(&task.id);
        } else {
            active.insert(task.id.clone());
        }
        Ok(task)
    }

    /// List all records matching `filter`, oldest first. Individually
    /// unreadable records are logged and skipped; they never fail the listing.
    pub async fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let latency = LatencyTracker::start("tasks.list");
        let mut entries = tokio::fs::read_dir(&self.tasks_dir).await?;
        let mut tasks = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.ends_with(RECORD_SUFFIX) || name.ends_with(STATE_SUFFIX) {
                continue;
            }
            match read_json::<Task>(&entry.path()).await {
                Ok(Some(task)) => {
                    if filter.matches(&task) {
                        tasks.push(task);
                    }
                }
                // Removed between the directory scan and the read.
                Ok(None) => {}
                Err(e) => {
                    warn!(file = %entry.path().display(), err = %e, "skipping unreadable task record");
                }
            }
        }
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        latency.finish();
        Ok(tasks)
    }

    /// Overwrite the state blob for `id`. Valid for any status; the blob does
    /// not require the task record to exist.
    pub async fn save_state(&self, id: &str, state: &Value) -> Result<()> {
        let _active = self.active.write().await;
        write_json_atomic(&self.state_path(id), state).await
    }

    /// Read the state blob for `id`, if one was ever saved.
    pub async fn load_state(&self, id: &str) -> Result<Option<Value>> {
        read_json(&self.state_path(id)).await
    }

    /// Delete a record and its state blob (if any).
    pub async fn remove(&self, id: &str) -> Result<()> {
        let mut active = self.active.write().await;
        remove_if_exists(&self.record_path(id)).await?;
        remove_if_exists(&self.state_path(id)).await?;
        active.remove(id);
        Ok(())
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.tasks_dir.join(format!("{id}{RECORD_SUFFIX}"))
    }

    fn state_path(&self, id: &str) -> PathBuf {
        self.tasks_dir.join(format!("{id}{STATE_SUFFIX}"))
    }
}
