//! Run state: the mutable record of one pipeline run, plus the store that
//! holds all runs.
//!
//! Ownership rule: exactly one writer (the pipeline controller that owns the
//! run) and any number of snapshot readers. Mutating methods are
//! crate-private; embedders only ever see snapshots.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use reelforge_utils::types::{Artifact, RunId};
use reelforge_validation::ValidationReport;

use crate::artifact::ArtifactLog;
use crate::extract::BundleParts;
use crate::stage::StageOutcome;

/// Lifecycle status of a run.
///
/// Terminal statuses (Succeeded, Failed, Cancelled) are reached exactly
/// once; after that the run is immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl RunStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

/// The full state of one run. Cloned out as a snapshot for inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: RunId,
    pub status: RunStatus,
    /// Index of the stage currently executing (or next to execute).
    pub current_stage: usize,
    /// Stage outcomes in stage order, appended as stages finish.
    pub stages: Vec<StageOutcome>,
    /// Refinement generation passes completed so far.
    pub iterations: u32,
    pub artifacts: ArtifactLog,
    pub last_report: Option<ValidationReport>,
    /// Set when the run completed but the final report still fails (budget
    /// exhausted, or findings tolerated below the blocking severity).
    pub unresolved_findings: bool,
    /// Set when the validation harness was unreachable and the run kept its
    /// last artifact unvalidated.
    pub degraded_confidence: bool,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    #[must_use]
    pub fn new(id: RunId) -> Self {
        Self {
            id,
            status: RunStatus::Pending,
            current_stage: 0,
            stages: Vec::new(),
            iterations: 0,
            artifacts: ArtifactLog::default(),
            last_report: None,
            unresolved_findings: false,
            degraded_confidence: false,
            failure_reason: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    /// The latest artifact version, if any generation pass completed.
    #[must_use]
    pub fn current_artifact(&self) -> Option<&Artifact> {
        self.artifacts.current()
    }
}

/// Shared handle to one run's state.
///
/// Reads take a point-in-time snapshot. Writes go through crate-private
/// methods and are silently dropped once the run is terminal, enforcing the
/// terminal-exactly-once invariant at the lowest level.
#[derive(Clone)]
pub struct RunHandle {
    inner: Arc<RwLock<PipelineRun>>,
}

impl RunHandle {
    #[must_use]
    pub fn new(run: PipelineRun) -> Self {
        Self {
            inner: Arc::new(RwLock::new(run)),
        }
    }

    /// Point-in-time copy of the run state.
    #[must_use]
    pub fn snapshot(&self) -> PipelineRun {
        self.inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Claim a Pending run for execution. Returns false when another driver
    /// already claimed it or it is terminal.
    pub(crate) fn try_claim(&self) -> bool {
        let mut run = self
            .inner
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if run.status == RunStatus::Pending {
            run.status = RunStatus::Running;
            true
        } else {
            false
        }
    }

    /// Apply a mutation unless the run is already terminal.
    pub(crate) fn update<F: FnOnce(&mut PipelineRun)>(&self, f: F) -> bool {
        let mut run = self
            .inner
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if run.status.is_terminal() {
            warn!(id = %run.id, "ignoring mutation of terminal run");
            return false;
        }
        f(&mut run);
        true
    }

    /// Append a stage outcome and advance the stage index.
    pub(crate) fn record_stage(&self, outcome: StageOutcome) -> bool {
        self.update(|run| {
            run.stages.push(outcome);
            run.current_stage = run.stages.len();
        })
    }

    /// Publish a new artifact version; returns a copy of what was stored.
    pub(crate) fn publish_artifact(&self, parts: BundleParts) -> Option<Artifact> {
        let mut published = None;
        self.update(|run| {
            published = Some(run.artifacts.publish(parts));
        });
        published
    }

    /// Move the run to a terminal status. Effective exactly once.
    pub(crate) fn finish(&self, status: RunStatus, failure_reason: Option<String>) -> bool {
        debug_assert!(status.is_terminal());
        let mut run = self
            .inner
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if run.status.is_terminal() {
            warn!(id = %run.id, ?status, "run already terminal, ignoring second transition");
            return false;
        }
        run.status = status;
        run.failure_reason = failure_reason;
        run.finished_at = Some(Utc::now());
        true
    }
}

/// All runs known to one service instance.
///
/// Runs are independent of each other; the store itself is just a keyed map
/// behind a mutex.
#[derive(Default)]
pub struct RunStore {
    runs: Mutex<HashMap<RunId, RunHandle>>,
}

impl RunStore {
    /// Fetch or create the run for `id`. Returns the handle and whether it
    /// was newly created — creation is idempotent because ids are derived
    /// from input content.
    pub fn create(&self, id: RunId) -> (RunHandle, bool) {
        let mut runs = self
            .runs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(existing) = runs.get(&id) {
            return (existing.clone(), false);
        }
        let handle = RunHandle::new(PipelineRun::new(id.clone()));
        runs.insert(id, handle.clone());
        (handle, true)
    }

    #[must_use]
    pub fn get(&self, id: &RunId) -> Option<RunHandle> {
        self.runs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    #[must_use]
    pub fn snapshot(&self, id: &RunId) -> Option<PipelineRun> {
        self.get(id).map(|handle| handle.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::StageStatus;

    fn outcome(stage: &str) -> StageOutcome {
        StageOutcome {
            stage: stage.to_string(),
            status: StageStatus::Succeeded,
            failure: None,
            tasks: vec![],
            warnings: vec![],
            duration_ms: 1,
        }
    }

    #[test]
    fn stage_outcomes_append_in_order() {
        let handle = RunHandle::new(PipelineRun::new(RunId::from_raw("r1")));
        assert!(handle.try_claim());
        handle.record_stage(outcome("analysis"));
        handle.record_stage(outcome("architecture"));

        let snap = handle.snapshot();
        assert_eq!(snap.stages[0].stage, "analysis");
        assert_eq!(snap.stages[1].stage, "architecture");
        assert_eq!(snap.current_stage, 2);
    }

    #[test]
    fn terminal_transition_happens_exactly_once() {
        let handle = RunHandle::new(PipelineRun::new(RunId::from_raw("r2")));
        assert!(handle.try_claim());
        assert!(handle.finish(RunStatus::Succeeded, None));
        // A second transition and any later mutation are dropped.
        assert!(!handle.finish(RunStatus::Failed, Some("late".to_string())));
        assert!(!handle.record_stage(outcome("finalize")));

        let snap = handle.snapshot();
        assert_eq!(snap.status, RunStatus::Succeeded);
        assert!(snap.failure_reason.is_none());
        assert!(snap.stages.is_empty());
        assert!(snap.finished_at.is_some());
    }

    #[test]
    fn claim_is_exclusive() {
        let handle = RunHandle::new(PipelineRun::new(RunId::from_raw("r3")));
        assert!(handle.try_claim());
        assert!(!handle.try_claim());
    }

    #[test]
    fn store_creation_is_idempotent_per_id() {
        let store = RunStore::default();
        let id = RunId::from_input(b"same input");
        let (_first, created_first) = store.create(id.clone());
        let (_second, created_second) = store.create(id.clone());
        assert!(created_first);
        assert!(!created_second);
        assert!(store.snapshot(&id).is_some());
    }

    #[test]
    fn snapshots_are_point_in_time() {
        let handle = RunHandle::new(PipelineRun::new(RunId::from_raw("r4")));
        let before = handle.snapshot();
        handle.try_claim();
        assert_eq!(before.status, RunStatus::Pending);
        assert_eq!(handle.snapshot().status, RunStatus::Running);
    }
}
