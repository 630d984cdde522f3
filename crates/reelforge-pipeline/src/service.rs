//! The embedding facade.
//!
//! `PipelineService` is how the CLI (and any other front-end) talks to the
//! orchestrator: start a run, drive it, inspect snapshots, cancel. One
//! service holds shared collaborators (backend, validator) and the run
//! store; per-run state — the tier ladder, the stagger schedule, the
//! cancellation token — is constructed fresh for every run so concurrent
//! runs never interfere.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use reelforge_config::Config;
use reelforge_llm::{
    GatewayOptions, ModelBackend, ModelGateway, TierLadder, backend_from_config,
};
use reelforge_utils::error::ReelforgeError;
use reelforge_utils::types::RunId;
use reelforge_validation::{HttpHarness, ScriptedValidator, Validator};

use crate::controller::PipelineController;
use crate::executor::StageExecutor;
use crate::plan::STAGE_CODE_GENERATION;
use crate::refine::RefinementLoop;
use crate::run::{PipelineRun, RunStore};
use crate::stagger::StaggerPolicy;

/// The input to one run: the walkthrough capture descriptor and the
/// narration transcript, both already extracted from the source video by
/// the (external) ingestion layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInput {
    pub walkthrough: String,
    pub narration: String,
}

impl RunInput {
    #[must_use]
    pub fn new(walkthrough: impl Into<String>, narration: impl Into<String>) -> Self {
        Self {
            walkthrough: walkthrough.into(),
            narration: narration.into(),
        }
    }

    /// Content-derived run id: identical input always maps to the same run.
    #[must_use]
    pub fn run_id(&self) -> RunId {
        let mut keyed = Vec::with_capacity(self.walkthrough.len() + self.narration.len() + 1);
        keyed.extend_from_slice(self.walkthrough.as_bytes());
        keyed.push(0x1f);
        keyed.extend_from_slice(self.narration.as_bytes());
        RunId::from_input(&keyed)
    }
}

/// Service facade over the orchestrator.
pub struct PipelineService {
    config: Config,
    backend: Arc<dyn ModelBackend>,
    validator: Arc<dyn Validator>,
    store: RunStore,
    cancels: Mutex<HashMap<RunId, CancellationToken>>,
}

impl PipelineService {
    /// Build a service with collaborators resolved from configuration: the
    /// configured model provider, and the HTTP harness when an endpoint is
    /// set (a permissive offline validator otherwise, which suits dry runs).
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the provider or harness cannot be
    /// constructed.
    pub fn from_config(config: Config) -> Result<Self, ReelforgeError> {
        let backend = backend_from_config(&config.llm)?;
        let validator: Arc<dyn Validator> = match &config.validator.endpoint {
            Some(endpoint) => Arc::new(HttpHarness::new(
                endpoint.clone(),
                Duration::from_secs(config.validator.request_timeout_secs),
            )?),
            None => Arc::new(ScriptedValidator::passing()),
        };
        Ok(Self::with_collaborators(config, backend, validator))
    }

    /// Build a service with explicit collaborators. The seam the scenario
    /// tests use.
    #[must_use]
    pub fn with_collaborators(
        config: Config,
        backend: Arc<dyn ModelBackend>,
        validator: Arc<dyn Validator>,
    ) -> Self {
        Self {
            config,
            backend,
            validator,
            store: RunStore::default(),
            cancels: Mutex::new(HashMap::new()),
        }
    }

    /// Register a run for this input. Idempotent: identical input returns
    /// the existing run's id, whatever state it is in.
    pub fn start_run(&self, input: &RunInput) -> RunId {
        let id = input.run_id();
        let (_handle, created) = self.store.create(id.clone());
        if created {
            info!(id = %id, "run created");
            self.cancels
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .insert(id.clone(), CancellationToken::new());
        }
        id
    }

    /// Start (or resume inspection of) the run for this input and drive it
    /// to a terminal status. If the run is already terminal — or another
    /// driver holds it — the current snapshot is returned unchanged;
    /// re-running a Failed or Cancelled run in place is unsupported.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the per-run tier ladder cannot be
    /// built.
    pub async fn run_to_completion(&self, input: &RunInput) -> Result<PipelineRun, ReelforgeError> {
        let id = self.start_run(input);
        let handle = self
            .store
            .get(&id)
            .ok_or_else(|| ReelforgeError::UnknownRun(id.to_string()))?;

        if !handle.try_claim() {
            return Ok(handle.snapshot());
        }

        let cancel = self
            .cancels
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&id)
            .cloned()
            .unwrap_or_default();

        // Per-run state: ladder, gateway, stagger schedule, executor.
        let ladder = Arc::new(TierLadder::new(self.config.models.tiers.clone())?);
        let gateway = Arc::new(ModelGateway::new(
            self.backend.clone(),
            ladder,
            GatewayOptions::from_config(&self.config.llm),
        ));
        let admission = Arc::new(StaggerPolicy::from_config(&self.config.stagger));
        let executor = Arc::new(StageExecutor::new(gateway, admission, self.config.pool.size));

        let refinement = RefinementLoop::new(
            executor.clone(),
            self.validator.clone(),
            self.config.refine.max_iterations,
            self.config.blocking_severity(),
            Duration::from_secs(self.config.stage_timeout_secs(STAGE_CODE_GENERATION)),
        );
        let controller = PipelineController::new(executor, refinement, &self.config);

        controller.execute(&handle, input, &cancel).await;
        Ok(handle.snapshot())
    }

    /// Point-in-time snapshot of a run, for progress inspection. Partial
    /// results from completed stages remain visible after failure.
    #[must_use]
    pub fn status(&self, id: &RunId) -> Option<PipelineRun> {
        self.store.snapshot(id)
    }

    /// Signal cancellation. Observed at stage boundaries and task
    /// suspension points; returns false for an unknown run.
    pub fn cancel(&self, id: &RunId) -> bool {
        let cancels = self
            .cancels
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match cancels.get(id) {
            Some(token) => {
                info!(id = %id, "cancellation requested");
                token.cancel();
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_ids_are_idempotent_per_input() {
        let a = RunInput::new("frames", "voice").run_id();
        let b = RunInput::new("frames", "voice").run_id();
        let c = RunInput::new("frames", "other voice").run_id();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn input_field_boundary_changes_the_id() {
        // The separator keeps ("ab", "c") distinct from ("a", "bc").
        let a = RunInput::new("ab", "c").run_id();
        let b = RunInput::new("a", "bc").run_id();
        assert_ne!(a, b);
    }

    #[test]
    fn cancel_of_unknown_run_is_a_noop() {
        let service = PipelineService::with_collaborators(
            Config::default(),
            Arc::new(reelforge_llm::ScriptedBackend::new("ok")),
            Arc::new(ScriptedValidator::passing()),
        );
        assert!(!service.cancel(&RunId::from_raw("missing")));
    }
}
