// SPDX-License-Identifier: MIT
//! Health report building blocks — status levels, per-component statuses,
//! task counts, and memory sampling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tasks::model::{Task, TaskStatus};

/// Severity level of a component, an integration, or the whole service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    /// Operating normally.
    Healthy,
    /// Functional but impaired (e.g., failed tasks piling up).
    Degraded,
    /// Unavailable or critically broken.
    Unhealthy,
}

impl HealthState {
    /// Returns the worst (highest-severity) of two states.
    pub fn worst(a: HealthState, b: HealthState) -> HealthState {
        match (a, b) {
            (HealthState::Unhealthy, _) | (_, HealthState::Unhealthy) => HealthState::Unhealthy,
            (HealthState::Degraded, _) | (_, HealthState::Degraded) => HealthState::Degraded,
            _ => HealthState::Healthy,
        }
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthState::Healthy => write!(f, "healthy"),
            HealthState::Degraded => write!(f, "degraded"),
            HealthState::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Status of a single component or integration probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentStatus {
    pub status: HealthState,
    pub last_check: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentStatus {
    pub fn healthy() -> Self {
        Self {
            status: HealthState::Healthy,
            last_check: Utc::now(),
            message: None,
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            status: HealthState::Unhealthy,
            last_check: Utc::now(),
            message: Some(message.into()),
        }
    }
}

/// In-process component statuses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentHealth {
    pub server: ComponentStatus,
    pub task_manager: ComponentStatus,
    pub storage: ComponentStatus,
}

/// External collaborator statuses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationHealth {
    pub tracker: ComponentStatus,
}

/// Task population broken down by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCounts {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
}

impl TaskCounts {
    pub fn tally(tasks: &[Task]) -> Self {
        let mut counts = Self {
            total: tasks.len(),
            ..Self::default()
        };
        for task in tasks {
            match task.status {
                TaskStatus::Pending => counts.pending += 1,
                TaskStatus::InProgress => counts.in_progress += 1,
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::Failed => counts.failed += 1,
                TaskStatus::Cancelled => {}
            }
        }
        counts
    }
}

/// Process and system memory figures, in MiB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryReport {
    pub process_mb: u64,
    pub system_total_mb: u64,
    pub system_free_mb: u64,
    pub system_usage_percent: u8,
}

impl MemoryReport {
    /// Sample current memory usage. Blocking — run on a thread-pool thread.
    pub fn sample() -> Self {
        use sysinfo::{ProcessesToUpdate, System};

        let mut sys = System::new();
        sys.refresh_memory();
        let total = sys.total_memory();
        let free = sys.free_memory();
        let used = sys.used_memory();

        let process_mb = sysinfo::get_current_pid()
            .ok()
            .and_then(|pid| {
                sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
                sys.process(pid).map(|p| p.memory() / (1024 * 1024))
            })
            .unwrap_or(0);

        Self {
            process_mb,
            system_total_mb: total / (1024 * 1024),
            system_free_mb: free / (1024 * 1024),
            system_usage_percent: if total == 0 {
                0
            } else {
                (used * 100 / total) as u8
            },
        }
    }
}
