//! The run report written next to the generated bundle.
//!
//! A condensed, serializable view of the run for the packaging layer and
//! for `reelforge status`: lifecycle, per-stage outcomes, per-task tier
//! usage, the terminal validation report, and the soft-success flags.

use serde::{Deserialize, Serialize};

use reelforge_pipeline::{PipelineRun, RunStatus, TaskState};
use reelforge_utils::types::RunId;
use reelforge_validation::ValidationReport;

/// File name of the report inside the output directory.
pub const REPORT_FILE: &str = "report.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub id: RunId,
    pub status: RunStatus,
    pub iterations: u32,
    /// The run completed but its final report still fails.
    pub unresolved_findings: bool,
    /// The validation harness was unreachable; the bundle shipped
    /// unvalidated.
    pub degraded_confidence: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub artifact_version: Option<u32>,
    pub stages: Vec<StageReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: String,
    pub status: reelforge_pipeline::StageStatus,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub tasks: Vec<TaskReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReport {
    pub name: String,
    pub state: String,
    /// The model tier that served the task, for cost auditing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunReport {
    #[must_use]
    pub fn from_run(run: &PipelineRun) -> Self {
        Self {
            id: run.id.clone(),
            status: run.status,
            iterations: run.iterations,
            unresolved_findings: run.unresolved_findings,
            degraded_confidence: run.degraded_confidence,
            failure_reason: run.failure_reason.clone(),
            artifact_version: run.current_artifact().map(|a| a.version),
            stages: run
                .stages
                .iter()
                .map(|outcome| StageReport {
                    stage: outcome.stage.clone(),
                    status: outcome.status,
                    duration_ms: outcome.duration_ms,
                    warnings: outcome.warnings.clone(),
                    tasks: outcome
                        .tasks
                        .iter()
                        .map(|task| match &task.state {
                            TaskState::Succeeded { tier, .. } => TaskReport {
                                name: task.name.clone(),
                                state: "succeeded".to_string(),
                                tier: Some(tier.clone()),
                                error: None,
                            },
                            TaskState::Failed { kind, detail } => TaskReport {
                                name: task.name.clone(),
                                state: "failed".to_string(),
                                tier: None,
                                error: Some(format!("{kind}: {detail}")),
                            },
                            TaskState::Cancelled => TaskReport {
                                name: task.name.clone(),
                                state: "cancelled".to_string(),
                                tier: None,
                                error: None,
                            },
                        })
                        .collect(),
                })
                .collect(),
            validation: run.last_report.clone(),
        }
    }
}
