//! Integration tests for the health aggregator: status precedence, task
//! counts, probe failure isolation, and probe timeouts.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use trackd::health::{HealthAggregator, HealthState};
use trackd::tasks::{TaskManager, TaskStatus, TaskType};
use trackd::tracker::{TrackerBug, TrackerClient, TrackerProject, TrackerRequirement};
use trackd::Error;

/// Tracker double whose probe behavior is fixed at construction.
enum ProbeTracker {
    Ok,
    Failing,
    /// Sleeps this long before answering.
    Stalled(Duration),
}

#[async_trait]
impl TrackerClient for ProbeTracker {
    async fn get_projects(&self) -> trackd::Result<Vec<TrackerProject>> {
        match self {
            ProbeTracker::Ok => Ok(Vec::new()),
            ProbeTracker::Failing => Err(Error::upstream("connection refused")),
            ProbeTracker::Stalled(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(Vec::new())
            }
        }
    }

    async fn get_requirements(&self, _project_id: &str) -> trackd::Result<Vec<TrackerRequirement>> {
        Ok(Vec::new())
    }

    async fn get_bugs(&self, _project_id: &str) -> trackd::Result<Vec<TrackerBug>> {
        Ok(Vec::new())
    }

    async fn update_item_status(&self, _item_id: &str, _status: &str) -> trackd::Result<()> {
        Ok(())
    }

    async fn add_comment(&self, _item_id: &str, _content: &str) -> trackd::Result<()> {
        Ok(())
    }
}

async fn seeded_manager(dir: &TempDir) -> Arc<TaskManager> {
    let manager = Arc::new(TaskManager::open(dir.path(), 10).await.unwrap());

    manager
        .create_task(TaskType::RequirementAnalysis, "req-1", trackd::tracker::ItemType::Requirement)
        .await
        .unwrap();
    let running = manager
        .create_task(TaskType::BugAnalysis, "bug-1", trackd::tracker::ItemType::Bug)
        .await
        .unwrap();
    manager
        .update_task_status(&running.id, TaskStatus::InProgress)
        .await
        .unwrap();
    let done = manager
        .create_task(TaskType::CodeReview, "req-2", trackd::tracker::ItemType::Requirement)
        .await
        .unwrap();
    manager
        .update_task_status(&done.id, TaskStatus::InProgress)
        .await
        .unwrap();
    manager
        .update_task_status(&done.id, TaskStatus::Completed)
        .await
        .unwrap();

    manager
}

fn aggregator(tasks: Arc<TaskManager>, tracker: ProbeTracker) -> HealthAggregator {
    HealthAggregator::new(
        env!("CARGO_PKG_VERSION"),
        tasks,
        Arc::new(tracker),
        Duration::from_secs(5),
    )
}

#[tokio::test]
async fn test_all_components_healthy() -> Result<()> {
    let dir = TempDir::new()?;
    let tasks = seeded_manager(&dir).await;

    let report = aggregator(tasks, ProbeTracker::Ok).check().await?;

    assert_eq!(report.status, HealthState::Healthy);
    assert!(report.is_healthy());
    assert_eq!(report.version, env!("CARGO_PKG_VERSION"));
    assert_eq!(report.tasks.total, 3);
    assert_eq!(report.tasks.pending, 1);
    assert_eq!(report.tasks.in_progress, 1);
    assert_eq!(report.tasks.completed, 1);
    assert_eq!(report.tasks.failed, 0);
    assert_eq!(report.components.server.status, HealthState::Healthy);
    assert_eq!(report.components.storage.status, HealthState::Healthy);
    assert_eq!(report.integrations.tracker.status, HealthState::Healthy);
    assert!(report.memory.system_total_mb > 0);
    Ok(())
}

#[tokio::test]
async fn test_failed_task_degrades_the_service() -> Result<()> {
    let dir = TempDir::new()?;
    let tasks = seeded_manager(&dir).await;

    let doomed = tasks
        .create_task(TaskType::CodeSubmission, "req-3", trackd::tracker::ItemType::Requirement)
        .await?;
    tasks.update_task_status(&doomed.id, TaskStatus::InProgress).await?;
    tasks.fail_task(&doomed.id, "push rejected").await?;

    let report = aggregator(tasks, ProbeTracker::Ok).check().await?;

    assert_eq!(report.status, HealthState::Degraded);
    assert_eq!(report.tasks.failed, 1);
    // Components themselves are fine — only the failed count degrades.
    assert_eq!(report.components.storage.status, HealthState::Healthy);
    Ok(())
}

#[tokio::test]
async fn test_tracker_probe_failure_is_isolated() -> Result<()> {
    let dir = TempDir::new()?;
    let tasks = seeded_manager(&dir).await;

    let report = aggregator(tasks, ProbeTracker::Failing).check().await?;

    assert_eq!(report.status, HealthState::Unhealthy);
    assert_eq!(report.integrations.tracker.status, HealthState::Unhealthy);
    // The rest of the report is still populated.
    assert_eq!(report.components.storage.status, HealthState::Healthy);
    assert_eq!(report.tasks.total, 3);
    Ok(())
}

#[tokio::test]
async fn test_stalled_tracker_probe_times_out() -> Result<()> {
    let dir = TempDir::new()?;
    let tasks = seeded_manager(&dir).await;

    let aggregator = HealthAggregator::new(
        env!("CARGO_PKG_VERSION"),
        tasks,
        Arc::new(ProbeTracker::Stalled(Duration::from_secs(30))),
        Duration::from_millis(200),
    );

    let started = std::time::Instant::now();
    let report = aggregator.check().await?;

    // The stalled probe was cut off at its own timeout, not awaited fully.
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(report.integrations.tracker.status, HealthState::Unhealthy);
    assert_eq!(report.status, HealthState::Unhealthy);
    assert_eq!(report.tasks.total, 3);
    Ok(())
}
