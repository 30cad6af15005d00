//! Workflow data model types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tasks::model::TaskType;

/// One step of a workflow's fixed forward progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    RequirementAnalysis,
    RequirementClarification,
    ArchitectureDesign,
    CodeImplementation,
    CodeSubmission,
    Completion,
}

impl WorkflowStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStage::RequirementAnalysis => "requirement_analysis",
            WorkflowStage::RequirementClarification => "requirement_clarification",
            WorkflowStage::ArchitectureDesign => "architecture_design",
            WorkflowStage::CodeImplementation => "code_implementation",
            WorkflowStage::CodeSubmission => "code_submission",
            WorkflowStage::Completion => "completion",
        }
    }

    /// The task type spawned when a workflow enters this stage. `Completion`
    /// spawns nothing.
    pub fn task_type(&self) -> Option<TaskType> {
        match self {
            WorkflowStage::RequirementAnalysis | WorkflowStage::RequirementClarification => {
                Some(TaskType::RequirementAnalysis)
            }
            WorkflowStage::ArchitectureDesign => Some(TaskType::ArchitectureDesign),
            WorkflowStage::CodeImplementation => Some(TaskType::CodeImplementation),
            WorkflowStage::CodeSubmission => Some(TaskType::CodeSubmission),
            WorkflowStage::Completion => None,
        }
    }
}

impl std::fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One requirement's progression through the delivery stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowState {
    pub id: String,
    pub requirement_id: String,
    pub current_stage: WorkflowStage,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set only when the workflow reaches `completion`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_result: Option<AnalysisResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub design_result: Option<DesignResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implementation_result: Option<ImplementationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,
}

/// Output of a finished workflow stage, tagged by the stage family that
/// produced it so the engine can validate the shape it expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StageResult {
    Analysis(AnalysisResult),
    Design(DesignResult),
    Implementation(ImplementationResult),
}

impl StageResult {
    pub fn kind(&self) -> &'static str {
        match self {
            StageResult::Analysis(_) => "analysis",
            StageResult::Design(_) => "design",
            StageResult::Implementation(_) => "implementation",
        }
    }
}

/// Requirement completeness assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Whether the requirement is complete enough to design against.
    pub is_complete: bool,
    /// 0–100.
    pub completeness_score: u8,
    pub missing_aspects: Vec<String>,
    pub clarification_questions: Vec<String>,
    pub analysis_report: String,
    pub analysis_timestamp: DateTime<Utc>,
}

/// Architecture design output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignResult {
    pub technical_solution_overview: String,
    pub impact_analysis: ImpactAnalysis,
    pub decision_records: Vec<DecisionRecord>,
    pub design_timestamp: DateTime<Utc>,
}

/// Which parts of the system a design touches, and how risky that is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImpactAnalysis {
    pub affected_components: Vec<String>,
    pub affected_services: Vec<String>,
    pub affected_apis: Vec<String>,
    pub potential_risks: Vec<String>,
    pub mitigation_strategies: Vec<String>,
}

/// A recorded architecture decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRecord {
    pub id: String,
    pub title: String,
    pub decision: String,
    pub rationale: String,
}

/// Code implementation output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImplementationResult {
    pub implemented_files: Vec<ImplementedFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_info: Option<CommitInfo>,
    pub implementation_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImplementedFile {
    pub file_path: String,
    pub language: String,
    pub description: String,
    pub is_new: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitInfo {
    pub repository_url: String,
    pub branch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_id: Option<String>,
    pub commit_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_request_url: Option<String>,
}

/// Workflow query. All set fields combine with AND; time bounds are
/// inclusive. `completed` matches on whether `completedAt` is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkflowFilter {
    pub requirement_id: Option<String>,
    pub current_stage: Option<WorkflowStage>,
    pub started_after: Option<DateTime<Utc>>,
    pub started_before: Option<DateTime<Utc>>,
    pub updated_after: Option<DateTime<Utc>>,
    pub updated_before: Option<DateTime<Utc>>,
    pub completed: Option<bool>,
}

impl WorkflowFilter {
    pub fn matches(&self, workflow: &WorkflowState) -> bool {
        if let Some(requirement_id) = &self.requirement_id {
            if &workflow.requirement_id != requirement_id {
                return false;
            }
        }
        if let Some(stage) = self.current_stage {
            if workflow.current_stage != stage {
                return false;
            }
        }
        if let Some(after) = self.started_after {
            if workflow.started_at < after {
                return false;
            }
        }
        if let Some(before) = self.started_before {
            if workflow.started_at > before {
                return false;
            }
        }
        if let Some(after) = self.updated_after {
            if workflow.updated_at < after {
                return false;
            }
        }
        if let Some(before) = self.updated_before {
            if workflow.updated_at > before {
                return false;
            }
        }
        if let Some(completed) = self.completed {
            if workflow.completed_at.is_some() != completed {
                return false;
            }
        }
        true
    }
}
