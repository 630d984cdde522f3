//! Stage execution.
//!
//! Runs one stage's tasks to a terminal state: sequentially with context
//! chaining, or concurrently over the shared worker pool with staggered
//! admission. Task errors are classified here against the stage's success
//! policy and never propagate further; the controller only sees the stage
//! outcome.
//!
//! Suspension points, in task order: worker-pool permit, stagger admission,
//! gateway invocation. The cancellation token is observed at each of them.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use reelforge_llm::{GatewayError, ModelGateway, ModelRequest};
use reelforge_utils::error::StageError;

use crate::stage::{
    StageContext, StageKind, StageOutcome, StagePlan, StageStatus, SuccessPolicy, TaskOutcome,
    TaskState,
};
use crate::stagger::AdmissionPolicy;

/// Executes stages for one run.
///
/// The worker pool bounds concurrent external calls independently of stage
/// fan-out; the admission policy spaces parallel sibling starts.
pub struct StageExecutor {
    gateway: Arc<ModelGateway>,
    admission: Arc<dyn AdmissionPolicy>,
    pool: Arc<Semaphore>,
}

impl StageExecutor {
    #[must_use]
    pub fn new(
        gateway: Arc<ModelGateway>,
        admission: Arc<dyn AdmissionPolicy>,
        pool_size: usize,
    ) -> Self {
        Self {
            gateway,
            admission,
            pool: Arc::new(Semaphore::new(pool_size)),
        }
    }

    /// Run one stage to a terminal state under its wall-clock budget.
    ///
    /// On timeout, in-flight tasks are cancelled and the stage fails with a
    /// timeout reason — a distinct failure from any task-level error.
    pub async fn run(
        &self,
        plan: &StagePlan,
        ctx: &StageContext,
        cancel: &CancellationToken,
    ) -> StageOutcome {
        let started = tokio::time::Instant::now();

        if cancel.is_cancelled() {
            return StageOutcome {
                stage: plan.name.clone(),
                status: StageStatus::Cancelled,
                failure: None,
                tasks: Vec::new(),
                warnings: Vec::new(),
                duration_ms: 0,
            };
        }

        let work = cancel.child_token();
        let fut = async {
            match plan.kind {
                StageKind::Sequential => self.run_sequential(plan, ctx, &work).await,
                StageKind::Parallel => self.run_parallel(plan, ctx, &work).await,
            }
        };
        tokio::pin!(fut);

        let mut timed_out = false;
        let mut outcome = tokio::select! {
            outcome = &mut fut => outcome,
            () = tokio::time::sleep(plan.timeout) => {
                timed_out = true;
                work.cancel();
                // Tasks observe the token at their next suspension point and
                // settle as Cancelled; wait for the stage to unwind.
                fut.await
            }
        };

        if timed_out {
            warn!(stage = %plan.name, timeout_secs = plan.timeout.as_secs(), "stage timed out");
            outcome.status = StageStatus::Failed;
            outcome.failure = Some(
                StageError::Timeout {
                    stage: plan.name.clone(),
                    timeout_secs: plan.timeout.as_secs(),
                }
                .to_string(),
            );
        }

        outcome.duration_ms = started.elapsed().as_millis() as u64;
        outcome
    }

    async fn run_sequential(
        &self,
        plan: &StagePlan,
        ctx: &StageContext,
        work: &CancellationToken,
    ) -> StageOutcome {
        let mut tasks = Vec::with_capacity(plan.tasks.len());
        let mut warnings = Vec::new();
        let mut failure: Option<String> = None;
        let mut chained = ctx.clone();

        for (slot, task) in plan.tasks.iter().enumerate() {
            if work.is_cancelled() {
                tasks.push(TaskOutcome {
                    slot,
                    name: task.name.clone(),
                    state: TaskState::Cancelled,
                });
                break;
            }

            let label = plan.task_label(slot);
            let mut request = ModelRequest::new(&label, &task.instruction);
            for block in &chained.blocks {
                request.push_context(block.clone());
            }

            let state = match self.gateway.invoke(&request, work).await {
                Ok(response) => {
                    // Later tasks see this output as part of their context.
                    chained.push(format!("{} output:\n{}", task.name, response.content));
                    TaskState::Succeeded {
                        content: response.content,
                        tier: response.tier_used,
                    }
                }
                Err(GatewayError::Cancelled) => TaskState::Cancelled,
                Err(GatewayError::Model(err)) => TaskState::Failed {
                    kind: err.kind(),
                    detail: err.to_string(),
                },
            };

            let fatal = matches!(state, TaskState::Failed { .. })
                && plan.policy == SuccessPolicy::AllMustSucceed;
            let cancelled = matches!(state, TaskState::Cancelled);
            if let TaskState::Failed { detail, .. } = &state {
                let classified = StageError::Task {
                    task: task.name.clone(),
                    detail: detail.clone(),
                };
                if plan.policy == SuccessPolicy::BestEffort {
                    warnings.push(classified.to_string());
                } else {
                    failure = Some(classified.to_string());
                }
            }

            tasks.push(TaskOutcome {
                slot,
                name: task.name.clone(),
                state,
            });

            if fatal || cancelled {
                break;
            }
        }

        let status = if failure.is_some() {
            StageStatus::Failed
        } else if work.is_cancelled() || tasks.iter().any(TaskOutcome::is_cancelled) {
            StageStatus::Cancelled
        } else {
            StageStatus::Succeeded
        };

        StageOutcome {
            stage: plan.name.clone(),
            status,
            failure,
            tasks,
            warnings,
            duration_ms: 0,
        }
    }

    async fn run_parallel(
        &self,
        plan: &StagePlan,
        ctx: &StageContext,
        work: &CancellationToken,
    ) -> StageOutcome {
        let mut set: JoinSet<(usize, TaskState)> = JoinSet::new();

        for (slot, task) in plan.tasks.iter().enumerate() {
            let label = plan.task_label(slot);
            let mut request = ModelRequest::new(&label, &task.instruction);
            for block in &ctx.blocks {
                request.push_context(block.clone());
            }

            let gateway = self.gateway.clone();
            let admission = self.admission.clone();
            let pool = self.pool.clone();
            let token = work.clone();

            set.spawn(async move {
                let permit = tokio::select! {
                    permit = pool.acquire_owned() => permit,
                    () = token.cancelled() => return (slot, TaskState::Cancelled),
                };
                let Ok(_permit) = permit else {
                    return (slot, TaskState::Cancelled);
                };

                tokio::select! {
                    () = admission.admit(&label) => {}
                    () = token.cancelled() => return (slot, TaskState::Cancelled),
                }

                debug!(task = %label, "task admitted");
                match gateway.invoke(&request, &token).await {
                    Ok(response) => (
                        slot,
                        TaskState::Succeeded {
                            content: response.content,
                            tier: response.tier_used,
                        },
                    ),
                    Err(GatewayError::Cancelled) => (slot, TaskState::Cancelled),
                    Err(GatewayError::Model(err)) => (
                        slot,
                        TaskState::Failed {
                            kind: err.kind(),
                            detail: err.to_string(),
                        },
                    ),
                }
            });
        }

        let mut states: Vec<Option<TaskState>> = vec![None; plan.tasks.len()];
        let mut warnings = Vec::new();
        let mut failure: Option<String> = None;

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((slot, state)) => {
                    if let TaskState::Failed { detail, .. } = &state {
                        let classified = StageError::Task {
                            task: plan.tasks[slot].name.clone(),
                            detail: detail.clone(),
                        };
                        match plan.policy {
                            SuccessPolicy::AllMustSucceed => {
                                if failure.is_none() {
                                    failure = Some(classified.to_string());
                                    // Stop the siblings; they settle as
                                    // Cancelled, never Succeeded.
                                    work.cancel();
                                }
                            }
                            SuccessPolicy::BestEffort => {
                                warnings.push(classified.to_string());
                            }
                        }
                    }
                    states[slot] = Some(state);
                }
                Err(join_err) => {
                    warn!(stage = %plan.name, error = %join_err, "worker terminated abnormally");
                    if plan.policy == SuccessPolicy::AllMustSucceed && failure.is_none() {
                        failure = Some(format!("worker terminated abnormally: {join_err}"));
                        work.cancel();
                    }
                }
            }
        }

        // Aggregation is deterministic by slot, not completion order.
        let tasks: Vec<TaskOutcome> = plan
            .tasks
            .iter()
            .enumerate()
            .map(|(slot, task)| TaskOutcome {
                slot,
                name: task.name.clone(),
                state: states[slot].take().unwrap_or(TaskState::Cancelled),
            })
            .collect();

        let status = if failure.is_some() {
            StageStatus::Failed
        } else if work.is_cancelled() {
            StageStatus::Cancelled
        } else {
            StageStatus::Succeeded
        };

        StageOutcome {
            stage: plan.name.clone(),
            status,
            failure,
            tasks,
            warnings,
            duration_ms: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::TaskSpec;
    use crate::stagger::NoStagger;
    use async_trait::async_trait;
    use reelforge_llm::{GatewayOptions, ModelBackend, ScriptedBackend, TierLadder};
    use reelforge_utils::error::{ModelError, ModelErrorKind};
    use std::time::Duration;

    fn executor_with(backend: Arc<dyn ModelBackend>) -> StageExecutor {
        let ladder = Arc::new(TierLadder::new(vec!["pro".to_string()]).unwrap());
        let gateway = Arc::new(ModelGateway::new(
            backend,
            ladder,
            GatewayOptions::default(),
        ));
        StageExecutor::new(gateway, Arc::new(NoStagger), 4)
    }

    /// Backend whose behavior is keyed on the task label, so concurrent
    /// tests stay deterministic.
    #[derive(Debug)]
    struct LabelBackend;

    #[async_trait]
    impl ModelBackend for LabelBackend {
        async fn invoke(&self, _model: &str, request: &ModelRequest) -> Result<String, ModelError> {
            if request.task.ends_with("boom") {
                Err(ModelError::Invalid {
                    detail: "scripted failure".to_string(),
                })
            } else if request.task.ends_with("slow") {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok("slow done".to_string())
            } else {
                Ok(format!("{} done", request.task))
            }
        }
    }

    fn parallel_plan(policy: SuccessPolicy, names: &[&str]) -> StagePlan {
        StagePlan::parallel(
            "analysis",
            Duration::from_secs(120),
            policy,
            names.iter().map(|n| TaskSpec::new(*n, "work")).collect(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn parallel_results_aggregate_in_slot_order() {
        let executor = executor_with(Arc::new(LabelBackend));
        let plan = parallel_plan(SuccessPolicy::AllMustSucceed, &["a", "b", "c"]);

        let outcome = executor
            .run(&plan, &StageContext::default(), &CancellationToken::new())
            .await;

        assert_eq!(outcome.status, StageStatus::Succeeded);
        let names: Vec<&str> = outcome.tasks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(
            outcome.outputs(),
            vec!["analysis/a done", "analysis/b done", "analysis/c done"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_task_cancels_siblings_under_all_must_succeed() {
        let executor = executor_with(Arc::new(LabelBackend));
        let plan = parallel_plan(SuccessPolicy::AllMustSucceed, &["slow", "boom"]);

        let outcome = executor
            .run(&plan, &StageContext::default(), &CancellationToken::new())
            .await;

        assert_eq!(outcome.status, StageStatus::Failed);
        assert!(outcome.failure.as_deref().unwrap().contains("boom"));
        // The in-flight sibling reports Cancelled, not Succeeded.
        assert!(matches!(outcome.tasks[0].state, TaskState::Cancelled));
        assert!(matches!(outcome.tasks[1].state, TaskState::Failed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn best_effort_stage_succeeds_with_partial_results() {
        let executor = executor_with(Arc::new(LabelBackend));
        let plan = parallel_plan(SuccessPolicy::BestEffort, &["a", "boom", "c"]);

        let outcome = executor
            .run(&plan, &StageContext::default(), &CancellationToken::new())
            .await;

        assert_eq!(outcome.status, StageStatus::Succeeded);
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("boom"));
        assert_eq!(outcome.outputs().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stage_timeout_cancels_in_flight_tasks_and_fails_the_stage() {
        let executor = executor_with(Arc::new(LabelBackend));
        let plan = StagePlan::parallel(
            "analysis",
            Duration::from_secs(10),
            SuccessPolicy::AllMustSucceed,
            vec![TaskSpec::new("slow", "work")],
        );

        let outcome = executor
            .run(&plan, &StageContext::default(), &CancellationToken::new())
            .await;

        assert_eq!(outcome.status, StageStatus::Failed);
        assert!(outcome.failure.as_deref().unwrap().contains("timed out"));
        assert!(matches!(outcome.tasks[0].state, TaskState::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn external_cancellation_reports_cancelled_not_failed() {
        let executor = executor_with(Arc::new(LabelBackend));
        let plan = parallel_plan(SuccessPolicy::AllMustSucceed, &["slow", "slow"]);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.cancel();
        });

        let outcome = executor.run(&plan, &StageContext::default(), &cancel).await;
        handle.await.unwrap();

        assert_eq!(outcome.status, StageStatus::Cancelled);
        assert!(outcome.tasks.iter().all(TaskOutcome::is_cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn sequential_tasks_see_prior_output_in_context() {
        let backend = Arc::new(ScriptedBackend::new("generic"));
        backend.enqueue(Ok("layout: two columns".to_string()));
        backend.enqueue(Ok("second".to_string()));
        let executor = executor_with(backend.clone());

        let plan = StagePlan::sequential(
            "architecture",
            Duration::from_secs(120),
            vec![
                TaskSpec::new("page_map", "map the pages"),
                TaskSpec::new("component_plan", "plan the components"),
            ],
        );

        let outcome = executor
            .run(&plan, &StageContext::default(), &CancellationToken::new())
            .await;
        assert_eq!(outcome.status, StageStatus::Succeeded);

        let calls = backend.calls();
        assert_eq!(calls.len(), 2);
        // Task 2's prompt carries task 1's completed output.
        assert!(calls[1].prompt.contains("layout: two columns"));
        assert!(!calls[0].prompt.contains("layout: two columns"));
    }

    #[tokio::test(start_paused = true)]
    async fn sequential_stage_fails_fast() {
        let backend = Arc::new(ScriptedBackend::new("unused"));
        backend.enqueue(Err(ModelError::Invalid {
            detail: "rejected".to_string(),
        }));
        let executor = executor_with(backend.clone());

        let plan = StagePlan::sequential(
            "architecture",
            Duration::from_secs(120),
            vec![
                TaskSpec::new("first", "a"),
                TaskSpec::new("second", "b"),
            ],
        );

        let outcome = executor
            .run(&plan, &StageContext::default(), &CancellationToken::new())
            .await;

        assert_eq!(outcome.status, StageStatus::Failed);
        // The second task never launched.
        assert_eq!(outcome.tasks.len(), 1);
        assert_eq!(backend.calls().len(), 1);
        match &outcome.tasks[0].state {
            TaskState::Failed { kind, .. } => assert_eq!(*kind, ModelErrorKind::Invalid),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn pool_bounds_concurrency_independent_of_fan_out() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        #[derive(Debug)]
        struct CountingBackend {
            live: AtomicUsize,
            peak: AtomicUsize,
        }

        #[async_trait]
        impl ModelBackend for CountingBackend {
            async fn invoke(
                &self,
                _model: &str,
                _request: &ModelRequest,
            ) -> Result<String, ModelError> {
                let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(live, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                self.live.fetch_sub(1, Ordering::SeqCst);
                Ok("done".to_string())
            }
        }

        let backend = Arc::new(CountingBackend {
            live: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let ladder = Arc::new(TierLadder::new(vec!["pro".to_string()]).unwrap());
        let gateway = Arc::new(ModelGateway::new(
            backend.clone(),
            ladder,
            GatewayOptions::default(),
        ));
        let executor = StageExecutor::new(gateway, Arc::new(NoStagger), 2);

        let plan = parallel_plan(
            SuccessPolicy::AllMustSucceed,
            &["a", "b", "c", "d", "e", "f"],
        );
        let outcome = executor
            .run(&plan, &StageContext::default(), &CancellationToken::new())
            .await;

        assert_eq!(outcome.status, StageStatus::Succeeded);
        assert!(backend.peak.load(Ordering::SeqCst) <= 2);
    }
}
