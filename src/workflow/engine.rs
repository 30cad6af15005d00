//! Workflow engine — drives one requirement's progression through the
//! delivery stages.
//!
//! Stage order: requirement_analysis → (requirement_clarification →)
//! architecture_design → code_implementation → code_submission → completion.
//! Clarification is entered only when analysis finds the requirement
//! incomplete, and unconditionally advances to design on the next call.
//!
//! The engine owns workflow persistence (`<root>/workflows/<id>.json`) but
//! creates stage tasks exclusively through the [`TaskManager`], so workflow
//! tasks are subject to the same admission control as everything else.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::storage::{read_json, write_json_atomic};
use crate::tasks::TaskManager;
use crate::tracker::{item_status, ItemType, TrackerClient};
use crate::workflow::model::{
    AnalysisResult, StageResult, WorkflowFilter, WorkflowStage, WorkflowState,
};

pub struct WorkflowEngine {
    workflows_dir: PathBuf,
    tasks: Arc<TaskManager>,
    tracker: Arc<dyn TrackerClient>,
    /// Per-workflow advance locks. Overlapping advances on one workflow must
    /// serialize so a stage is neither skipped nor given duplicate tasks.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl WorkflowEngine {
    /// Open the engine over `<storage_root>/workflows`.
    pub async fn open(
        storage_root: &Path,
        tasks: Arc<TaskManager>,
        tracker: Arc<dyn TrackerClient>,
    ) -> Result<Self> {
        let workflows_dir = storage_root.join("workflows");
        tokio::fs::create_dir_all(&workflows_dir).await?;
        info!(dir = %workflows_dir.display(), "workflow engine opened");
        Ok(Self {
            workflows_dir,
            tasks,
            tracker,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Begin a workflow for a requirement: persist a state record at the
    /// analysis stage and create the linked first-stage task.
    pub async fn start_workflow(&self, requirement_id: &str) -> Result<String> {
        let workflow_id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let state = WorkflowState {
            id: workflow_id.clone(),
            requirement_id: requirement_id.to_string(),
            current_stage: WorkflowStage::RequirementAnalysis,
            started_at: now,
            updated_at: now,
            completed_at: None,
            analysis_result: None,
            design_result: None,
            implementation_result: None,
            metadata: None,
        };
        self.save_state(&state).await?;

        let task = self
            .tasks
            .create_workflow_task(
                crate::tasks::TaskType::RequirementAnalysis,
                requirement_id,
                ItemType::Requirement,
                &workflow_id,
                WorkflowStage::RequirementAnalysis,
            )
            .await?;

        info!(
            workflow_id = %workflow_id,
            requirement_id = %requirement_id,
            first_task_id = %task.id,
            "workflow started"
        );
        Ok(workflow_id)
    }

    /// Advance a workflow to its next stage.
    ///
    /// Tracker side effects run before the new state is persisted, so an
    /// upstream failure leaves the workflow unmodified. The follow-up stage
    /// task is created only after the new state is on disk.
    pub async fn advance_workflow(
        &self,
        workflow_id: &str,
        result: Option<StageResult>,
    ) -> Result<WorkflowState> {
        let advance_lock = self.lock_for(workflow_id).await;
        let _guard = advance_lock.lock().await;

        let mut state = self.get_workflow_state(workflow_id).await?;
        let from_stage = state.current_stage;
        let now = Utc::now();

        let next_stage = match from_stage {
            WorkflowStage::RequirementAnalysis => {
                let analysis = match result {
                    Some(StageResult::Analysis(analysis)) => analysis,
                    Some(other) => {
                        return Err(Error::InvalidStageAdvance {
                            stage: from_stage,
                            reason: format!(
                                "expected a requirement analysis result, got {}",
                                other.kind()
                            ),
                        })
                    }
                    None => {
                        return Err(Error::InvalidStageAdvance {
                            stage: from_stage,
                            reason: "a requirement analysis result is required".to_string(),
                        })
                    }
                };

                let next = if analysis.is_complete {
                    WorkflowStage::ArchitectureDesign
                } else {
                    // Push the incompleteness back to the tracker before
                    // touching our own state.
                    self.tracker
                        .update_item_status(
                            &state.requirement_id,
                            item_status::REQUIREMENT_INCOMPLETE,
                        )
                        .await?;
                    self.tracker
                        .add_comment(&state.requirement_id, &clarification_comment(&analysis))
                        .await?;
                    WorkflowStage::RequirementClarification
                };
                state.analysis_result = Some(analysis);
                next
            }

            // Clarification always proceeds to design; any supplied result is
            // ignored rather than re-running analysis.
            WorkflowStage::RequirementClarification => WorkflowStage::ArchitectureDesign,

            WorkflowStage::ArchitectureDesign => {
                match result {
                    Some(StageResult::Design(design)) => state.design_result = Some(design),
                    Some(other) => {
                        return Err(Error::InvalidStageAdvance {
                            stage: from_stage,
                            reason: format!("expected a design result, got {}", other.kind()),
                        })
                    }
                    None => {}
                }
                WorkflowStage::CodeImplementation
            }

            WorkflowStage::CodeImplementation => {
                match result {
                    Some(StageResult::Implementation(implementation)) => {
                        state.implementation_result = Some(implementation)
                    }
                    Some(other) => {
                        return Err(Error::InvalidStageAdvance {
                            stage: from_stage,
                            reason: format!(
                                "expected an implementation result, got {}",
                                other.kind()
                            ),
                        })
                    }
                    None => {}
                }
                WorkflowStage::CodeSubmission
            }

            WorkflowStage::CodeSubmission => {
                state.completed_at = Some(now);
                WorkflowStage::Completion
            }

            WorkflowStage::Completion => {
                return Err(Error::InvalidStageAdvance {
                    stage: from_stage,
                    reason: "workflow is already completed".to_string(),
                })
            }
        };

        state.current_stage = next_stage;
        state.updated_at = now;
        self.save_state(&state).await?;

        if let Some(task_type) = next_stage.task_type() {
            let task = self
                .tasks
                .create_workflow_task(
                    task_type,
                    &state.requirement_id,
                    ItemType::Requirement,
                    workflow_id,
                    next_stage,
                )
                .await?;
            debug!(workflow_id = %workflow_id, task_id = %task.id, stage = %next_stage, "stage task created");
        }

        info!(
            workflow_id = %workflow_id,
            from_stage = %from_stage,
            to_stage = %next_stage,
            "workflow advanced"
        );
        Ok(state)
    }

    /// Read one workflow; unknown ids fail with
    /// [`Error::WorkflowNotFound`].
    pub async fn get_workflow_state(&self, workflow_id: &str) -> Result<WorkflowState> {
        read_json(&self.state_path(workflow_id))
            .await?
            .ok_or_else(|| Error::WorkflowNotFound(workflow_id.to_string()))
    }

    /// All workflows matching `filter`, oldest first. Individually
    /// unreadable records are logged and skipped.
    pub async fn get_workflows(&self, filter: &WorkflowFilter) -> Result<Vec<WorkflowState>> {
        let mut entries = tokio::fs::read_dir(&self.workflows_dir).await?;
        let mut workflows = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_name().to_string_lossy().ends_with(".json") {
                continue;
            }
            match read_json::<WorkflowState>(&entry.path()).await {
                Ok(Some(workflow)) => {
                    if filter.matches(&workflow) {
                        workflows.push(workflow);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(file = %entry.path().display(), err = %e, "skipping unreadable workflow record");
                }
            }
        }
        workflows.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        Ok(workflows)
    }

    async fn save_state(&self, state: &WorkflowState) -> Result<()> {
        write_json_atomic(&self.state_path(&state.id), state).await?;
        debug!(workflow_id = %state.id, stage = %state.current_stage, "workflow state saved");
        Ok(())
    }

    async fn lock_for(&self, workflow_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(workflow_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn state_path(&self, workflow_id: &str) -> PathBuf {
        self.workflows_dir.join(format!("{workflow_id}.json"))
    }
}

/// Render the comment posted on a requirement whose analysis found it
/// incomplete: the completeness score, what is missing, and the questions
/// that need answers.
fn clarification_comment(analysis: &AnalysisResult) -> String {
    let mut comment = String::from("## Requirement needs clarification\n\n");
    comment.push_str(
        "This requirement is missing information we need before development can continue.\n\n",
    );

    comment.push_str("### Completeness score\n");
    comment.push_str(&format!(
        "Current completeness: {}/100\n\n",
        analysis.completeness_score
    ));

    if !analysis.missing_aspects.is_empty() {
        comment.push_str("### Missing aspects\n");
        for aspect in &analysis.missing_aspects {
            comment.push_str(&format!("- {aspect}\n"));
        }
        comment.push('\n');
    }

    if !analysis.clarification_questions.is_empty() {
        comment.push_str("### Clarification questions\n");
        for (index, question) in analysis.clarification_questions.iter().enumerate() {
            comment.push_str(&format!("{}. {question}\n", index + 1));
        }
        comment.push('\n');
    }

    comment.push_str(
        "Please add the information above and notify the development team to continue.\n",
    );
    comment
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis(score: u8) -> AnalysisResult {
        AnalysisResult {
            is_complete: false,
            completeness_score: score,
            missing_aspects: vec!["acceptance criteria".to_string(), "edge cases".to_string()],
            clarification_questions: vec![
                "What is the expected peak load?".to_string(),
                "Which roles may access the report?".to_string(),
            ],
            analysis_report: "incomplete".to_string(),
            analysis_timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_clarification_comment_lists_score_aspects_and_questions() {
        let comment = clarification_comment(&analysis(40));

        assert!(comment.contains("Current completeness: 40/100"));
        assert!(comment.contains("- acceptance criteria"));
        assert!(comment.contains("- edge cases"));
        assert!(comment.contains("1. What is the expected peak load?"));
        assert!(comment.contains("2. Which roles may access the report?"));
    }

    #[test]
    fn test_clarification_comment_omits_empty_sections() {
        let mut bare = analysis(75);
        bare.missing_aspects.clear();
        bare.clarification_questions.clear();

        let comment = clarification_comment(&bare);
        assert!(!comment.contains("### Missing aspects"));
        assert!(!comment.contains("### Clarification questions"));
    }
}
