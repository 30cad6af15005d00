//! Task data model types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tracker::ItemType;
use crate::workflow::model::WorkflowStage;

/// Generate a new ULID string for a task record.
pub fn new_task_id() -> String {
    ulid::Ulid::new().to_string()
}

/// What kind of background work a task represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    RequirementAnalysis,
    BugAnalysis,
    CodeImplementation,
    CodeReview,
    Documentation,
    ArchitectureDesign,
    CodeSubmission,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::RequirementAnalysis => "requirement_analysis",
            TaskType::BugAnalysis => "bug_analysis",
            TaskType::CodeImplementation => "code_implementation",
            TaskType::CodeReview => "code_review",
            TaskType::Documentation => "documentation",
            TaskType::ArchitectureDesign => "architecture_design",
            TaskType::CodeSubmission => "code_submission",
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a task.
///
/// `in_progress` is a status flag, not a handle to running work — there is no
/// cancellation of in-flight work here, only the transition to `cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    /// Completed, failed, and cancelled tasks admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Valid task status transitions.
///
/// Statuses only move forward: cancellation is the one terminal status
/// reachable without the task having started.
pub fn valid_transition(from: TaskStatus, to: TaskStatus) -> bool {
    use TaskStatus::*;
    matches!(
        (from, to),
        (Pending, InProgress)
            | (Pending, Cancelled)
            | (InProgress, Completed)
            | (InProgress, Failed)
            | (InProgress, Cancelled)
    )
}

/// A unit of background work linked to a tracker item, optionally belonging
/// to a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Tracker entity this work is for.
    pub item_id: String,
    pub item_type: ItemType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_stage: Option<WorkflowStage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set once, when the task first moves to `in_progress`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Opaque success payload recorded on completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure message, set only on `failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 0–100.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,
}

impl Task {
    /// Build a fresh pending task with a new id and `createdAt == updatedAt`.
    pub fn new(task_type: TaskType, item_id: impl Into<String>, item_type: ItemType) -> Self {
        let now = Utc::now();
        Self {
            id: new_task_id(),
            task_type,
            status: TaskStatus::Pending,
            description: None,
            item_id: item_id.into(),
            item_type,
            workflow_id: None,
            workflow_stage: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            failed_at: None,
            cancelled_at: None,
            result: None,
            error: None,
            progress: None,
            priority: None,
            assigned_to: None,
            metadata: None,
        }
    }

    /// Link this task to a workflow stage.
    pub fn for_workflow(mut self, workflow_id: impl Into<String>, stage: WorkflowStage) -> Self {
        self.workflow_id = Some(workflow_id.into());
        self.workflow_stage = Some(stage);
        self
    }
}

/// Multi-field task query. Set fields are OR within the field (membership),
/// AND across fields; an empty set or `None` means no constraint. Time bounds
/// are inclusive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskFilter {
    pub types: Vec<TaskType>,
    pub statuses: Vec<TaskStatus>,
    pub item_ids: Vec<String>,
    pub item_types: Vec<ItemType>,
    pub workflow_ids: Vec<String>,
    pub assigned_to: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub updated_after: Option<DateTime<Utc>>,
    pub updated_before: Option<DateTime<Utc>>,
}

impl TaskFilter {
    /// Filter on status membership only.
    pub fn by_status(statuses: impl IntoIterator<Item = TaskStatus>) -> Self {
        Self {
            statuses: statuses.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Filter on workflow linkage only.
    pub fn by_workflow(workflow_id: impl Into<String>) -> Self {
        Self {
            workflow_ids: vec![workflow_id.into()],
            ..Self::default()
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        if !self.types.is_empty() && !self.types.contains(&task.task_type) {
            return false;
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&task.status) {
            return false;
        }
        if !self.item_ids.is_empty() && !self.item_ids.contains(&task.item_id) {
            return false;
        }
        if !self.item_types.is_empty() && !self.item_types.contains(&task.item_type) {
            return false;
        }
        if !self.workflow_ids.is_empty() {
            match &task.workflow_id {
                Some(id) if self.workflow_ids.contains(id) => {}
                _ => return false,
            }
        }
        if let Some(assignee) = &self.assigned_to {
            if task.assigned_to.as_ref() != Some(assignee) {
                return false;
            }
        }
        if let Some(after) = self.created_after {
            if task.created_at < after {
                return false;
            }
        }
        if let Some(before) = self.created_before {
            if task.created_at > before {
                return false;
            }
        }
        if let Some(after) = self.updated_after {
            if task.updated_at < after {
                return false;
            }
        }
        if let Some(before) = self.updated_before {
            if task.updated_at > before {
                return false;
            }
        }
        true
    }
}
