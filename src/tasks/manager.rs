//! Admission-controlled task manager.
//!
//! Layers capacity enforcement, status transition validation, and the query
//! API on top of [`TaskStore`]. Every task mutation in the system goes
//! through this type — the workflow engine included.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::tasks::model::{valid_transition, Task, TaskFilter, TaskStatus, TaskType};
use crate::tasks::store::TaskStore;
use crate::tracker::ItemType;
use crate::workflow::model::WorkflowStage;

pub struct TaskManager {
    store: TaskStore,
    max_concurrent_tasks: usize,
}

impl TaskManager {
    /// Open the manager over the store rooted at `storage_root`.
    ///
    /// Tasks counted against `max_concurrent_tasks` are the non-terminal ones
    /// (pending and in_progress both count).
    pub async fn open(storage_root: &Path, max_concurrent_tasks: usize) -> Result<Self> {
        Ok(Self {
            store: TaskStore::open(storage_root).await?,
            max_concurrent_tasks,
        })
    }

    /// Create a standalone task. Fails with
    /// [`Error::CapacityExceeded`] when the active count is at the cap.
    pub async fn create_task(
        &self,
        task_type: TaskType,
        item_id: &str,
        item_type: ItemType,
    ) -> Result<Task> {
        self.admit(Task::new(task_type, item_id, item_type)).await
    }

    /// Create a task linked to a workflow stage. Subject to the same
    /// admission control as [`create_task`](Self::create_task).
    pub async fn create_workflow_task(
        &self,
        task_type: TaskType,
        item_id: &str,
        item_type: ItemType,
        workflow_id: &str,
        stage: WorkflowStage,
    ) -> Result<Task> {
        self.admit(Task::new(task_type, item_id, item_type).for_workflow(workflow_id, stage))
            .await
    }

    async fn admit(&self, task: Task) -> Result<Task> {
        let task = self
            .store
            .try_insert(task, self.max_concurrent_tasks)
            .await?;
        info!(
            task_id = %task.id,
            task_type = %task.task_type,
            item_id = %task.item_id,
            "task created"
        );
        Ok(task)
    }

    /// Read-only admission probe, consistent with
    /// [`create_task`](Self::create_task)'s counted set.
    pub async fn can_create_new_task(&self) -> bool {
        self.store.active_count().await < self.max_concurrent_tasks
    }

    /// Look up a task; absence is a first-class outcome.
    pub async fn get_task(&self, id: &str) -> Result<Option<Task>> {
        self.store.get(id).await
    }

    /// Look up a task; absence fails with [`Error::TaskNotFound`].
    pub async fn require_task(&self, id: &str) -> Result<Task> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))
    }

    /// Move a task to `status`, validating the transition and stamping
    /// `updatedAt` plus the matching first-reach timestamp.
    pub async fn update_task_status(&self, id: &str, status: TaskStatus) -> Result<Task> {
        let task = self
            .store
            .update(id, |task| apply_status(task, status))
            .await?;
        info!(task_id = %id, status = %status, "task status updated");
        Ok(task)
    }

    /// Complete a task, recording its success payload in the same write.
    pub async fn complete_task(&self, id: &str, result: Value) -> Result<Task> {
        let task = self
            .store
            .update(id, |task| {
                apply_status(task, TaskStatus::Completed)?;
                task.result = Some(result);
                Ok(())
            })
            .await?;
        info!(task_id = %id, "task completed");
        Ok(task)
    }

    /// Fail a task, recording the error message in the same write.
    pub async fn fail_task(&self, id: &str, error: impl Into<String>) -> Result<Task> {
        let message = error.into();
        let task = self
            .store
            .update(id, |task| {
                apply_status(task, TaskStatus::Failed)?;
                task.error = Some(message.clone());
                Ok(())
            })
            .await?;
        warn!(task_id = %id, err = %message, "task failed");
        Ok(task)
    }

    /// Overwrite the stage-specific state blob for a task. Independent of the
    /// task's status.
    pub async fn save_task_state(&self, id: &str, state: &Value) -> Result<()> {
        self.store.save_state(id, state).await
    }

    /// Load the stage-specific state blob for a task, if any.
    pub async fn load_task_state(&self, id: &str) -> Result<Option<Value>> {
        self.store.load_state(id).await
    }

    /// All tasks matching `filter`, oldest first.
    pub async fn get_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        self.store.list(filter).await
    }

    /// All tasks whose status is one of `statuses`.
    pub async fn get_tasks_by_status(&self, statuses: &[TaskStatus]) -> Result<Vec<Task>> {
        self.store
            .list(&TaskFilter::by_status(statuses.iter().copied()))
            .await
    }

    /// Retention sweep: remove every terminal-status task whose `updatedAt`
    /// is strictly before `cutoff`, along with its state blob. Returns the
    /// number of tasks removed. Scheduling this is the caller's concern.
    pub async fn cleanup_completed_tasks(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut removed = 0usize;
        for task in self.store.list(&TaskFilter::default()).await? {
            if task.status.is_terminal() && task.updated_at < cutoff {
                self.store.remove(&task.id).await?;
                removed += 1;
            }
        }
        if removed > 0 {
            info!(removed, cutoff = %cutoff, "task retention sweep complete");
        }
        Ok(removed)
    }
}

/// Apply a status change to a record: validate the transition, stamp
/// `updatedAt`, and set the first-reach timestamp for the new status.
fn apply_status(task: &mut Task, status: TaskStatus) -> Result<()> {
    if !valid_transition(task.status, status) {
        return Err(Error::InvalidStatusTransition {
            from: task.status,
            to: status,
        });
    }
    let now = Utc::now();
    task.status = status;
    task.updated_at = now;
    match status {
        TaskStatus::InProgress => {
            if task.started_at.is_none() {
                task.started_at = Some(now);
            }
        }
        TaskStatus::Completed => task.completed_at = Some(now),
        TaskStatus::Failed => task.failed_at = Some(now),
        TaskStatus::Cancelled => task.cancelled_at = Some(now),
        TaskStatus::Pending => {}
    }
    Ok(())
}
