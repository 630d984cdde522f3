//! Stage and task model.
//!
//! A stage plan is immutable once a run starts; outcomes are appended to the
//! run in stage order and never mutated afterward.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use reelforge_utils::error::ModelErrorKind;

/// How a stage's tasks are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    /// Tasks run one after another, each seeing the prior task's output.
    Sequential,
    /// Tasks launch concurrently over the shared worker pool.
    Parallel,
}

/// What a stage requires of its tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuccessPolicy {
    /// One fatal task error fails the stage; in-flight siblings are
    /// cancelled.
    AllMustSucceed,
    /// The stage succeeds with partial results; failed tasks become
    /// warnings.
    BestEffort,
}

/// One unit of work, backed by a single model call.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub name: String,
    pub instruction: String,
}

impl TaskSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instruction: instruction.into(),
        }
    }
}

/// One pipeline stage, fully described before execution starts.
#[derive(Debug, Clone)]
pub struct StagePlan {
    pub name: String,
    pub kind: StageKind,
    pub policy: SuccessPolicy,
    pub timeout: Duration,
    pub tasks: Vec<TaskSpec>,
}

impl StagePlan {
    #[must_use]
    pub fn sequential(name: impl Into<String>, timeout: Duration, tasks: Vec<TaskSpec>) -> Self {
        Self {
            name: name.into(),
            kind: StageKind::Sequential,
            policy: SuccessPolicy::AllMustSucceed,
            timeout,
            tasks,
        }
    }

    #[must_use]
    pub fn parallel(
        name: impl Into<String>,
        timeout: Duration,
        policy: SuccessPolicy,
        tasks: Vec<TaskSpec>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: StageKind::Parallel,
            policy,
            timeout,
            tasks,
        }
    }

    /// Label for a task slot: `stage/task`, used in logs, retry jitter
    /// seeds, and stagger admission.
    #[must_use]
    pub fn task_label(&self, slot: usize) -> String {
        format!("{}/{}", self.name, self.tasks[slot].name)
    }
}

/// Terminal state of one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum TaskState {
    Succeeded {
        content: String,
        /// The model tier that served the call.
        tier: String,
    },
    Failed {
        kind: ModelErrorKind,
        detail: String,
    },
    Cancelled,
}

/// One task's slot, name, and terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub slot: usize,
    pub name: String,
    #[serde(flatten)]
    pub state: TaskState,
}

impl TaskOutcome {
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        match &self.state {
            TaskState::Succeeded { content, .. } => Some(content),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.state, TaskState::Cancelled)
    }
}

/// Terminal state of one stage, as observed by the pipeline controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Succeeded,
    Failed,
    Cancelled,
}

/// Everything the run records about one executed stage.
///
/// Task outcomes are ordered by slot, never by completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOutcome {
    pub stage: String,
    pub status: StageStatus,
    /// Human-readable reason when `status` is Failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    pub tasks: Vec<TaskOutcome>,
    /// Tolerated task failures under a best-effort policy.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub duration_ms: u64,
}

impl StageOutcome {
    /// Succeeded task contents in slot order.
    #[must_use]
    pub fn outputs(&self) -> Vec<&str> {
        self.tasks.iter().filter_map(TaskOutcome::content).collect()
    }
}

/// Context handed to a stage: ordered text blocks accumulated from the run
/// input and upstream stage outputs.
#[derive(Debug, Clone, Default)]
pub struct StageContext {
    pub blocks: Vec<String>,
}

impl StageContext {
    pub fn push(&mut self, block: impl Into<String>) {
        self.blocks.push(block.into());
    }

    #[must_use]
    pub fn with_block(mut self, block: impl Into<String>) -> Self {
        self.push(block);
        self
    }
}
