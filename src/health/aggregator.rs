// SPDX-License-Identifier: MIT
//! Health aggregator — one composite snapshot of the whole service.
//!
//! All probes run concurrently, each under its own timeout; a probe that
//! fails or stalls degrades its own component to `unhealthy` instead of
//! aborting the check. Overall status precedence: any unhealthy component or
//! integration wins, then any degraded one or a non-zero failed task count,
//! then healthy.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, error, warn};

use crate::error::{Error, Result};
use crate::health::checks::{
    ComponentHealth, ComponentStatus, HealthState, IntegrationHealth, MemoryReport, TaskCounts,
};
use crate::observability::LatencyTracker;
use crate::tasks::model::TaskFilter;
use crate::tasks::TaskManager;
use crate::tracker::TrackerClient;

/// Composite health snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: HealthState,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub uptime_secs: u64,
    pub components: ComponentHealth,
    pub integrations: IntegrationHealth,
    pub tasks: TaskCounts,
    pub memory: MemoryReport,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthState::Healthy
    }
}

pub struct HealthAggregator {
    version: String,
    started_at: Instant,
    tasks: Arc<TaskManager>,
    tracker: Arc<dyn TrackerClient>,
    probe_timeout: Duration,
}

impl HealthAggregator {
    pub fn new(
        version: impl Into<String>,
        tasks: Arc<TaskManager>,
        tracker: Arc<dyn TrackerClient>,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            version: version.into(),
            started_at: Instant::now(),
            tasks,
            tracker,
            probe_timeout,
        }
    }

    /// Run all probes concurrently and assemble the snapshot.
    ///
    /// Probe failures never propagate — they become `unhealthy` statuses. The
    /// only error a caller sees is a failure of the aggregation itself (a
    /// panicked probe task), which is logged and re-raised.
    pub async fn check(&self) -> Result<HealthStatus> {
        let latency = LatencyTracker::start("health.check");

        // Each probe runs in its own task so a stalled one cannot hold up the
        // rest; the timeout bounds it regardless.
        let storage_probe = {
            let tasks = Arc::clone(&self.tasks);
            let probe_timeout = self.probe_timeout;
            tokio::spawn(async move {
                match timeout(probe_timeout, tasks.get_tasks(&TaskFilter::default())).await {
                    Ok(Ok(_)) => ComponentStatus::healthy(),
                    Ok(Err(e)) => ComponentStatus::unhealthy(format!("task listing failed: {e}")),
                    Err(_) => ComponentStatus::unhealthy("storage probe timed out"),
                }
            })
        };

        let tracker_probe = {
            let tracker = Arc::clone(&self.tracker);
            let probe_timeout = self.probe_timeout;
            tokio::spawn(async move {
                match timeout(probe_timeout, tracker.get_projects()).await {
                    Ok(Ok(projects)) => {
                        debug!(projects = projects.len(), "tracker probe succeeded");
                        ComponentStatus::healthy()
                    }
                    Ok(Err(e)) => ComponentStatus::unhealthy(format!("tracker probe failed: {e}")),
                    Err(_) => ComponentStatus::unhealthy("tracker probe timed out"),
                }
            })
        };

        let counts_probe = {
            let tasks = Arc::clone(&self.tasks);
            let probe_timeout = self.probe_timeout;
            tokio::spawn(async move {
                match timeout(probe_timeout, tasks.get_tasks(&TaskFilter::default())).await {
                    Ok(Ok(tasks)) => (TaskCounts::tally(&tasks), ComponentStatus::healthy()),
                    Ok(Err(e)) => {
                        warn!(err = %e, "task count probe failed");
                        (
                            TaskCounts::default(),
                            ComponentStatus::unhealthy(format!("task count probe failed: {e}")),
                        )
                    }
                    Err(_) => (
                        TaskCounts::default(),
                        ComponentStatus::unhealthy("task count probe timed out"),
                    ),
                }
            })
        };

        let memory_probe = tokio::task::spawn_blocking(MemoryReport::sample);

        let storage = unwrap_probe(storage_probe.await);
        let tracker = unwrap_probe(tracker_probe.await);
        let (task_counts, task_manager) = match counts_probe.await {
            Ok(result) => result,
            Err(e) => (
                TaskCounts::default(),
                ComponentStatus::unhealthy(format!("task count probe panicked: {e}")),
            ),
        };
        let memory = memory_probe.await.map_err(|e| {
            error!(err = %e, "health check aggregation failed");
            Error::Storage(std::io::Error::other(format!(
                "memory sampling task panicked: {e}"
            )))
        })?;

        let components = ComponentHealth {
            server: ComponentStatus::healthy(),
            task_manager,
            storage,
        };
        let integrations = IntegrationHealth { tracker };
        let status = overall_status(&components, &integrations, &task_counts);

        latency.finish();
        Ok(HealthStatus {
            status,
            version: self.version.clone(),
            timestamp: Utc::now(),
            uptime_secs: self.started_at.elapsed().as_secs(),
            components,
            integrations,
            tasks: task_counts,
            memory,
        })
    }
}

fn unwrap_probe(result: std::result::Result<ComponentStatus, tokio::task::JoinError>) -> ComponentStatus {
    result.unwrap_or_else(|e| ComponentStatus::unhealthy(format!("probe panicked: {e}")))
}

/// Any unhealthy component/integration ⇒ unhealthy; else any degraded one,
/// or failed tasks on the books ⇒ degraded; else healthy.
fn overall_status(
    components: &ComponentHealth,
    integrations: &IntegrationHealth,
    tasks: &TaskCounts,
) -> HealthState {
    let combined = [
        components.server.status,
        components.task_manager.status,
        components.storage.status,
        integrations.tracker.status,
    ]
    .into_iter()
    .fold(HealthState::Healthy, HealthState::worst);

    match combined {
        HealthState::Unhealthy => HealthState::Unhealthy,
        HealthState::Degraded => HealthState::Degraded,
        HealthState::Healthy if tasks.failed > 0 => HealthState::Degraded,
        HealthState::Healthy => HealthState::Healthy,
    }
}
