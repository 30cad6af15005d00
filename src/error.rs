//! Error taxonomy shared by the task manager, workflow engine, and health
//! aggregator.

use crate::tasks::model::TaskStatus;
use crate::workflow::model::WorkflowStage;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the orchestration core.
///
/// Persistence and admission failures are never swallowed; listing operations
/// are the one exception (an individual corrupt record is logged and skipped
/// so the rest of the listing still returns).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("maximum concurrent tasks limit reached ({limit})")]
    CapacityExceeded { limit: usize },

    #[error("invalid status transition: {from} -> {to}")]
    InvalidStatusTransition { from: TaskStatus, to: TaskStatus },

    #[error("cannot advance workflow from {stage}: {reason}")]
    InvalidStageAdvance {
        stage: WorkflowStage,
        reason: String,
    },

    #[error("tracker request failed: {0}")]
    Upstream(String),

    #[error("storage failure: {0}")]
    Storage(#[from] std::io::Error),
}

impl Error {
    /// Wrap a serialization problem as a storage failure for the given record
    /// path. Malformed on-disk documents are persistence-layer errors.
    pub(crate) fn corrupt_record(path: &std::path::Path, err: serde_json::Error) -> Self {
        Self::Storage(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("malformed record {}: {err}", path.display()),
        ))
    }

    /// Build an [`Error::Upstream`] from any displayable tracker failure.
    pub fn upstream(err: impl std::fmt::Display) -> Self {
        Self::Upstream(err.to_string())
    }
}
