//! The generate → validate → decide refinement cycle.
//!
//! Modeled as an explicit state machine over {Generating, Validating,
//! Deciding, Done} with a bounded iteration budget. The decision step is a
//! pure function of the report, the iteration counter, the budget, and the
//! blocking severity — re-running it on identical inputs always yields the
//! same transition.
//!
//! Exhausting the budget with a failing report is soft success: the run
//! still completes with its best artifact, flagged `unresolved_findings`.
//! Losing the validator mid-loop likewise keeps the last artifact, flagged
//! `degraded_confidence`.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, warn};

use reelforge_utils::types::Severity;
use reelforge_validation::{ValidationReport, Validator, render_feedback};

use crate::executor::StageExecutor;
use crate::extract::extract_bundle;
use crate::plan::generation_plan;
use crate::run::RunHandle;
use crate::stage::{StageContext, StageStatus};

/// States of the refinement cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Generating,
    Validating,
    Deciding,
    Done,
}

/// Why the Deciding step stopped the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The harness passed the artifact.
    Passed,
    /// The report failed but no finding met the blocking severity.
    ToleratedFindings,
    /// The iteration budget is spent.
    BudgetExhausted,
    /// Cancellation was observed.
    Cancelled,
}

/// Outcome of one Deciding step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Regenerate,
    Stop(StopReason),
}

/// The pure decision function.
///
/// `iteration` counts completed generation passes (the initial one
/// included); the loop regenerates only while `iteration < max_iterations`.
#[must_use]
pub fn decide(
    report: &ValidationReport,
    iteration: u32,
    max_iterations: u32,
    blocking: Severity,
    cancelled: bool,
) -> Decision {
    if cancelled {
        return Decision::Stop(StopReason::Cancelled);
    }
    if report.passed {
        return Decision::Stop(StopReason::Passed);
    }
    if !report.has_blocking_findings(blocking) {
        return Decision::Stop(StopReason::ToleratedFindings);
    }
    if iteration >= max_iterations {
        return Decision::Stop(StopReason::BudgetExhausted);
    }
    Decision::Regenerate
}

/// How the loop ended, as reported to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopEnd {
    Stopped(StopReason),
    /// The validator was unreachable; the run keeps its last artifact.
    ValidatorUnavailable(String),
    /// A generation stage failed fatally (e.g. quota exhausted at the
    /// cheapest tier).
    GenerationFailed(String),
    /// Cancellation observed outside the Deciding step.
    Cancelled,
}

/// What the controller needs to settle the run after the loop.
#[derive(Debug)]
pub struct RefineOutcome {
    pub end: LoopEnd,
    pub iterations: u32,
    pub unresolved_findings: bool,
    pub degraded_confidence: bool,
}

/// Drives the refinement cycle for one run.
pub struct RefinementLoop {
    executor: Arc<StageExecutor>,
    validator: Arc<dyn Validator>,
    max_iterations: u32,
    blocking_severity: Severity,
    generation_timeout: Duration,
}

impl RefinementLoop {
    #[must_use]
    pub fn new(
        executor: Arc<StageExecutor>,
        validator: Arc<dyn Validator>,
        max_iterations: u32,
        blocking_severity: Severity,
        generation_timeout: Duration,
    ) -> Self {
        Self {
            executor,
            validator,
            max_iterations,
            blocking_severity,
            generation_timeout,
        }
    }

    /// Run the cycle until Done. `base_ctx` carries the analysis and
    /// architecture outputs; feedback blocks accumulate on top of it across
    /// passes.
    pub async fn drive(
        &self,
        run: &RunHandle,
        base_ctx: &StageContext,
        cancel: &CancellationToken,
    ) -> RefineOutcome {
        let run_id = run.snapshot().id;
        let mut state = LoopState::Generating;
        let mut iteration: u32 = 0;
        let mut feedback_blocks: Vec<String> = Vec::new();
        let mut last_report: Option<ValidationReport> = None;
        let mut end: Option<LoopEnd> = None;

        while end.is_none() {
            match state {
                LoopState::Generating => {
                    iteration += 1;
                    let span = reelforge_utils::logging::iteration_span(run_id.as_str(), iteration);
                    run.update(|r| r.iterations = iteration);

                    let plan = generation_plan(self.generation_timeout);
                    let mut ctx = base_ctx.clone();
                    for block in &feedback_blocks {
                        ctx.push(block.clone());
                    }

                    let outcome = self.executor.run(&plan, &ctx, cancel).instrument(span).await;
                    match outcome.status {
                        StageStatus::Succeeded => {
                            let content = outcome.outputs().concat();
                            let parts = extract_bundle(&content);
                            run.record_stage(outcome);
                            if let Some(artifact) = run.publish_artifact(parts) {
                                info!(version = artifact.version, "published artifact version");
                                state = LoopState::Validating;
                            } else {
                                end = Some(LoopEnd::Cancelled);
                            }
                        }
                        StageStatus::Cancelled => {
                            run.record_stage(outcome);
                            end = Some(LoopEnd::Cancelled);
                        }
                        StageStatus::Failed => {
                            let reason = outcome
                                .failure
                                .clone()
                                .unwrap_or_else(|| "generation stage failed".to_string());
                            run.record_stage(outcome);
                            end = Some(LoopEnd::GenerationFailed(reason));
                        }
                    }
                }

                LoopState::Validating => {
                    let Some(artifact) = run.snapshot().current_artifact().cloned() else {
                        end = Some(LoopEnd::GenerationFailed(
                            "no artifact available for validation".to_string(),
                        ));
                        continue;
                    };

                    let verdict = tokio::select! {
                        verdict = self.validator.validate(&artifact) => verdict,
                        () = cancel.cancelled() => {
                            end = Some(LoopEnd::Cancelled);
                            continue;
                        }
                    };

                    match verdict {
                        Ok(report) => {
                            info!(
                                "validation: {}",
                                reelforge_validation::summarize(&report, self.blocking_severity)
                            );
                            run.update(|r| r.last_report = Some(report.clone()));
                            last_report = Some(report);
                            state = LoopState::Deciding;
                        }
                        Err(err) => {
                            warn!(error = %err, "validator unreachable, ending loop with last artifact");
                            end = Some(LoopEnd::ValidatorUnavailable(err.to_string()));
                        }
                    }
                }

                LoopState::Deciding => {
                    let Some(report) = last_report.as_ref() else {
                        end = Some(LoopEnd::ValidatorUnavailable(
                            "no report available to decide on".to_string(),
                        ));
                        continue;
                    };

                    match decide(
                        report,
                        iteration,
                        self.max_iterations,
                        self.blocking_severity,
                        cancel.is_cancelled(),
                    ) {
                        Decision::Stop(reason) => {
                            end = Some(LoopEnd::Stopped(reason));
                        }
                        Decision::Regenerate => {
                            feedback_blocks.push(render_feedback(report));
                            state = LoopState::Generating;
                        }
                    }
                }

                LoopState::Done => break,
            }
        }

        let end = end.unwrap_or(LoopEnd::Cancelled);
        let unresolved_findings = matches!(
            end,
            LoopEnd::Stopped(StopReason::BudgetExhausted)
                | LoopEnd::Stopped(StopReason::ToleratedFindings)
        );
        let degraded_confidence = matches!(end, LoopEnd::ValidatorUnavailable(_));

        RefineOutcome {
            end,
            iterations: iteration,
            unresolved_findings,
            degraded_confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelforge_validation::{Finding, ValidationReport};

    fn failing_report(severity: Severity) -> ValidationReport {
        ValidationReport::failing(1, vec![Finding::new(severity, "console", "boom")])
    }

    #[test]
    fn passing_report_stops_immediately() {
        let report = ValidationReport::clean(1);
        assert_eq!(
            decide(&report, 1, 5, Severity::Error, false),
            Decision::Stop(StopReason::Passed)
        );
    }

    #[test]
    fn blocking_findings_force_regeneration_within_budget() {
        let report = failing_report(Severity::Error);
        assert_eq!(
            decide(&report, 1, 3, Severity::Error, false),
            Decision::Regenerate
        );
        assert_eq!(
            decide(&report, 3, 3, Severity::Error, false),
            Decision::Stop(StopReason::BudgetExhausted)
        );
    }

    #[test]
    fn findings_below_the_threshold_are_tolerated() {
        let report = failing_report(Severity::Warning);
        assert_eq!(
            decide(&report, 1, 5, Severity::Error, false),
            Decision::Stop(StopReason::ToleratedFindings)
        );
        // Lowering the threshold makes the same report blocking.
        assert_eq!(
            decide(&report, 1, 5, Severity::Warning, false),
            Decision::Regenerate
        );
    }

    #[test]
    fn cancellation_wins_over_everything() {
        let report = ValidationReport::clean(1);
        assert_eq!(
            decide(&report, 1, 5, Severity::Error, true),
            Decision::Stop(StopReason::Cancelled)
        );
    }

    #[test]
    fn deciding_is_idempotent_on_identical_input() {
        let report = failing_report(Severity::Error);
        let first = decide(&report, 2, 5, Severity::Error, false);
        for _ in 0..10 {
            assert_eq!(decide(&report, 2, 5, Severity::Error, false), first);
        }
    }
}
