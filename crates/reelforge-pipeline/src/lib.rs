//! Pipeline orchestrator core.
//!
//! Sequences the fixed stage order (analysis → architecture → code
//! generation → refinement → finalize), runs parallel tasks over a bounded
//! worker pool with staggered admission, drives the generate-validate
//! refinement cycle, and owns each run's lifecycle and cancellation.
//!
//! Embedders use [`PipelineService`]; everything else is exposed for tests
//! and advanced integrations.

mod artifact;
mod controller;
mod executor;
mod extract;
mod plan;
mod refine;
mod run;
mod service;
mod stage;
mod stagger;

pub use artifact::ArtifactLog;
pub use controller::PipelineController;
pub use executor::StageExecutor;
pub use extract::{BundleParts, extract_bundle};
pub use plan::{analysis_plan, architecture_plan, generation_plan};
pub use refine::{Decision, LoopEnd, LoopState, RefinementLoop, StopReason, decide};
pub use run::{PipelineRun, RunHandle, RunStatus, RunStore};
pub use service::{PipelineService, RunInput};
pub use stage::{
    StageContext, StageKind, StageOutcome, StagePlan, StageStatus, SuccessPolicy, TaskOutcome,
    TaskSpec, TaskState,
};
pub use stagger::{AdmissionPolicy, NoStagger, StaggerPolicy};
