//! The pipeline controller: one run's lifecycle from Running to terminal.
//!
//! Executes the configured stages in fixed order, hands the refinement
//! stage to the [`RefinementLoop`], and sets the terminal status exactly
//! once. Cancellation is observed at stage boundaries; the stage executor
//! observes it inside its task-wait loop. The controller performs no error
//! classification of its own — it only reacts to stage outcomes.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info};

use reelforge_config::Config;

use crate::executor::StageExecutor;
use crate::plan::{
    STAGE_ANALYSIS, STAGE_ARCHITECTURE, STAGE_CODE_GENERATION, STAGE_FINALIZE, analysis_plan,
    architecture_plan,
};
use crate::refine::{LoopEnd, RefinementLoop, StopReason};
use crate::run::{RunHandle, RunStatus};
use crate::service::RunInput;
use crate::stage::{StageContext, StageOutcome, StagePlan, StageStatus};

/// Drives one run through the stage sequence.
pub struct PipelineController {
    executor: Arc<StageExecutor>,
    refinement: RefinementLoop,
    analysis_timeout: Duration,
    architecture_timeout: Duration,
}

impl PipelineController {
    #[must_use]
    pub fn new(executor: Arc<StageExecutor>, refinement: RefinementLoop, config: &Config) -> Self {
        Self {
            executor,
            refinement,
            analysis_timeout: Duration::from_secs(config.stage_timeout_secs(STAGE_ANALYSIS)),
            architecture_timeout: Duration::from_secs(
                config.stage_timeout_secs(STAGE_ARCHITECTURE),
            ),
        }
    }

    /// Execute the run to its terminal status. The handle must already be
    /// claimed (status Running).
    pub async fn execute(&self, run: &RunHandle, input: &RunInput, cancel: &CancellationToken) {
        let run_id = run.snapshot().id;
        let mut ctx = StageContext::default()
            .with_block(format!("Walkthrough capture:\n{}", input.walkthrough))
            .with_block(format!("Narration transcript:\n{}", input.narration));

        let upstream = [
            analysis_plan(self.analysis_timeout),
            architecture_plan(self.architecture_timeout),
        ];

        for plan in &upstream {
            if cancel.is_cancelled() {
                run.finish(RunStatus::Cancelled, None);
                return;
            }

            if !self.run_stage(run, plan, &mut ctx, cancel).await {
                return;
            }
        }

        // Refinement owns generation, validation, and the iteration budget.
        let refined = self.refinement.drive(run, &ctx, cancel).await;
        run.update(|r| {
            r.unresolved_findings = refined.unresolved_findings;
            r.degraded_confidence = refined.degraded_confidence;
        });

        match refined.end {
            LoopEnd::Cancelled | LoopEnd::Stopped(StopReason::Cancelled) => {
                run.finish(RunStatus::Cancelled, None);
            }
            LoopEnd::GenerationFailed(reason) => {
                run.finish(
                    RunStatus::Failed,
                    Some(format!("stage '{STAGE_CODE_GENERATION}' failed: {reason}")),
                );
            }
            LoopEnd::Stopped(_) | LoopEnd::ValidatorUnavailable(_) => {
                self.finalize(run);
                info!(
                    id = %run_id,
                    iterations = refined.iterations,
                    unresolved = refined.unresolved_findings,
                    degraded = refined.degraded_confidence,
                    "run completed"
                );
                run.finish(RunStatus::Succeeded, None);
            }
        }
    }

    /// Run one upstream stage, record it, and fold its outputs into the
    /// context. Returns false when the run reached a terminal status.
    async fn run_stage(
        &self,
        run: &RunHandle,
        plan: &StagePlan,
        ctx: &mut StageContext,
        cancel: &CancellationToken,
    ) -> bool {
        let run_id = run.snapshot().id;
        let span = reelforge_utils::logging::stage_span(run_id.as_str(), &plan.name);

        let outcome = self.executor.run(plan, ctx, cancel).instrument(span).await;
        let status = outcome.status;
        let failure = outcome.failure.clone();

        for (task, output) in outcome
            .tasks
            .iter()
            .filter_map(|t| t.content().map(|c| (t.name.clone(), c.to_string())))
        {
            ctx.push(format!("{task} output:\n{output}"));
        }
        let stage_name = outcome.stage.clone();
        run.record_stage(outcome);

        match status {
            StageStatus::Succeeded => true,
            StageStatus::Cancelled => {
                run.finish(RunStatus::Cancelled, None);
                false
            }
            StageStatus::Failed => {
                let reason = failure.unwrap_or_else(|| "stage failed".to_string());
                run.finish(
                    RunStatus::Failed,
                    Some(format!("stage '{stage_name}' failed: {reason}")),
                );
                false
            }
        }
    }

    /// The finalize stage assembles the output bundle from state already on
    /// the run; it makes no external calls and cannot fail.
    fn finalize(&self, run: &RunHandle) {
        run.record_stage(StageOutcome {
            stage: STAGE_FINALIZE.to_string(),
            status: StageStatus::Succeeded,
            failure: None,
            tasks: Vec::new(),
            warnings: Vec::new(),
            duration_ms: 0,
        });
    }
}
