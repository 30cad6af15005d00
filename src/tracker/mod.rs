//! External project tracker collaborator interface.
//!
//! The tracker holds the requirements and bugs this core creates tasks and
//! workflows against. Only the interface lives here — transport, retries,
//! and token refresh belong to the concrete client implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Item status markers this core writes back to the tracker.
pub mod item_status {
    /// Set on a requirement whose analysis found it too incomplete to build.
    pub const REQUIREMENT_INCOMPLETE: &str = "requirement_incomplete";
}

/// Kind of tracker entity a task is linked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Requirement,
    Bug,
    Task,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Requirement => "requirement",
            ItemType::Bug => "bug",
            ItemType::Task => "task",
        }
    }
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracker user (creator, assignee, owner).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerUser {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A project in the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerProject {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: String,
    pub owner: TrackerUser,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A requirement work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerRequirement {
    pub id: String,
    pub title: String,
    pub description: String,
    pub priority: String,
    pub status: String,
    pub project_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<TrackerUser>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A bug work item. Same shape as a requirement plus a severity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerBug {
    pub id: String,
    pub title: String,
    pub description: String,
    pub priority: String,
    pub severity: String,
    pub status: String,
    pub project_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<TrackerUser>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Client for the external project tracker.
///
/// The workflow engine calls [`update_item_status`](TrackerClient::update_item_status)
/// and [`add_comment`](TrackerClient::add_comment) as stage side effects; the
/// health aggregator probes [`get_projects`](TrackerClient::get_projects).
/// Every failure maps to [`Error::Upstream`](crate::Error::Upstream).
#[async_trait]
pub trait TrackerClient: Send + Sync {
    async fn get_projects(&self) -> Result<Vec<TrackerProject>>;

    async fn get_requirements(&self, project_id: &str) -> Result<Vec<TrackerRequirement>>;

    async fn get_bugs(&self, project_id: &str) -> Result<Vec<TrackerBug>>;

    /// Set the tracker-side status of a requirement/bug.
    async fn update_item_status(&self, item_id: &str, status: &str) -> Result<()>;

    /// Post a comment on a requirement/bug.
    async fn add_comment(&self, item_id: &str, content: &str) -> Result<()>;
}
