//! Validation collaborator boundary.
//!
//! The browser harness that exercises a generated site is an external
//! service; this crate owns the contract with it: the [`Validator`] trait
//! (one blocking call per refinement iteration), the report model, feedback
//! rendering for the next generation pass, and the HTTP client. The
//! harness's own internals (browser relaunches, retries) are its business
//! and invisible here.

mod feedback;
mod harness;
mod report;

pub use feedback::{FEEDBACK_HEADER, render_feedback, summarize};
pub use harness::{HttpHarness, ScriptedValidator};
pub use report::{Finding, ValidationReport};

use async_trait::async_trait;

use reelforge_utils::error::ValidationError;
use reelforge_utils::types::Artifact;

/// External validation harness contract.
#[async_trait]
pub trait Validator: Send + Sync {
    /// Validate one artifact version. A single blocking call; the harness
    /// handles its own internal retries.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::Unavailable` when the harness cannot be
    /// reached, `ValidationError::Malformed` when its answer does not decode.
    async fn validate(&self, artifact: &Artifact) -> Result<ValidationReport, ValidationError>;
}
