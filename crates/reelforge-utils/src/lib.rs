//! Shared infrastructure for reelforge: error taxonomy, core domain types,
//! logging setup, and atomic file writes.
//!
//! Every other crate in the workspace depends on this one; it must stay free
//! of orchestration logic and network concerns.

pub mod atomic_write;
pub mod error;
pub mod exit_codes;
pub mod logging;
pub mod types;

pub use error::{ConfigError, ModelError, ReelforgeError, StageError, ValidationError};
pub use exit_codes::ExitCode;
pub use types::{Artifact, RunId, Severity};
