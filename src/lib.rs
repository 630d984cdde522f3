//! reelforge — walkthrough-to-website generation pipeline.
//!
//! Reelforge turns a recorded product walkthrough plus a narration
//! transcript into a deployable website bundle by orchestrating staged
//! calls to a generative model and an external browser-validation harness:
//! parallel analysis, architecture planning, code generation, and a bounded
//! validate-and-refine cycle, degrading to cheaper model tiers under quota
//! pressure.
//!
//! Reelforge can be used two ways:
//! - **CLI**: `reelforge generate walkthrough.txt --narration narration.txt`
//! - **Library**: embed [`PipelineService`] and drive runs programmatically.
//!
//! # Quick Start (Library)
//!
//! ```rust,no_run
//! use reelforge::{CliOverrides, Config, PipelineService, RunInput};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::discover(&CliOverrides::default())?;
//! let service = PipelineService::from_config(config)?;
//! let input = RunInput::new("screen-by-screen capture notes", "narration transcript");
//! let snapshot = service.run_to_completion(&input).await?;
//! println!("run {} finished: {:?}", snapshot.id, snapshot.status);
//! # Ok(())
//! # }
//! ```
//!
//! # Stable Public API
//!
//! - [`PipelineService`], [`RunInput`] — run trigger boundary
//! - [`PipelineRun`], [`RunStatus`], [`RunId`] — run state snapshots
//! - [`Config`], [`CliOverrides`] — configuration
//! - [`ReelforgeError`], [`ExitCode`] — errors and CLI exit codes
//!
//! Internal modules are re-exported for tests and advanced integrations and
//! are not covered by stability guarantees.

pub mod cli;
pub mod report;

pub use reelforge_config::{CliOverrides, Config};
pub use reelforge_pipeline::{PipelineRun, PipelineService, RunInput, RunStatus};
pub use reelforge_utils::error::ReelforgeError;
pub use reelforge_utils::exit_codes::ExitCode;
pub use reelforge_utils::types::{Artifact, RunId, Severity};

// Re-exports for embedders that swap collaborators (tests, custom hosts).
pub use reelforge_llm::{ModelBackend, ScriptedBackend};
pub use reelforge_validation::{
    Finding, ScriptedValidator, ValidationReport, Validator,
};
