//! Error taxonomy for reelforge.
//!
//! Errors are classified where they occur and never escape their layer
//! unclassified: model errors are handled inside the gateway and the stage
//! executor, validation errors inside the refinement loop. The pipeline
//! controller only ever sees stage outcomes, never raw errors.
//!
//! Cancellation is deliberately absent from this taxonomy. A cancelled task,
//! stage, or run is a normal terminal path and is represented as an outcome
//! variant, not an error.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by model backends and the gateway.
///
/// The three variants map directly onto the gateway's handling policy:
///
/// | Variant | Handling |
/// |-----------|-------------------------------------------------|
/// | `Quota` | advance the tier ladder one rung, retry once |
/// | `Transport` | bounded exponential backoff, then fatal |
/// | `Invalid` | fatal immediately, no retry |
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// Provider signalled quota or overload (HTTP 429 / RESOURCE_EXHAUSTED).
    /// The only error class that triggers tier fallback.
    #[error("quota exhausted on tier '{tier}': {detail}")]
    Quota { tier: String, detail: String },

    /// Network-level failure: timeout, connection reset, 5xx.
    #[error("transport failure: {detail}")]
    Transport { detail: String },

    /// The provider rejected the request itself (auth, malformed payload,
    /// unknown model). Retrying the same request cannot help.
    #[error("request rejected: {detail}")]
    Invalid { detail: String },
}

impl ModelError {
    /// Coarse error class, used in stage outcomes and run reports.
    #[must_use]
    pub fn kind(&self) -> ModelErrorKind {
        match self {
            Self::Quota { .. } => ModelErrorKind::Quota,
            Self::Transport { .. } => ModelErrorKind::Transport,
            Self::Invalid { .. } => ModelErrorKind::Invalid,
        }
    }

    /// Whether this error triggers tier fallback in the gateway.
    #[must_use]
    pub fn is_quota(&self) -> bool {
        matches!(self, Self::Quota { .. })
    }

    /// Whether this error is retryable at the same tier.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

/// Serializable class of a [`ModelError`], carried in task outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelErrorKind {
    Quota,
    Transport,
    Invalid,
}

impl std::fmt::Display for ModelErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Quota => write!(f, "quota"),
            Self::Transport => write!(f, "transport"),
            Self::Invalid => write!(f, "invalid"),
        }
    }
}

/// Errors from the external validation harness boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The harness could not be reached or did not answer in time. Fatal for
    /// the current iteration; the run keeps the last artifact and is flagged
    /// with degraded confidence.
    #[error("validation harness unavailable: {detail}")]
    Unavailable { detail: String },

    /// The harness answered with something that does not decode into a
    /// report. Treated like unavailability by the refinement loop.
    #[error("validation harness returned a malformed report: {detail}")]
    Malformed { detail: String },
}

/// Errors surfaced at the stage-executor boundary.
///
/// Task-level model errors are classified here (stage-fatal vs. tolerable per
/// the stage's success policy) and never propagate past the executor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    /// A task failed fatally inside the stage. `detail` carries the
    /// classified model error's rendering.
    #[error("task '{task}' failed: {detail}")]
    Task { task: String, detail: String },

    /// The stage's wall-clock budget expired. Distinct from task failure;
    /// in-flight tasks are cancelled when this fires.
    #[error("stage '{stage}' timed out after {timeout_secs}s")]
    Timeout { stage: String, timeout_secs: u64 },
}

/// Configuration errors: file discovery, parsing, and value validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: String },

    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("environment variable '{var}' is not set ({purpose})")]
    MissingEnv { var: String, purpose: String },
}

/// Library-level error type returned by reelforge operations.
///
/// Library code returns `ReelforgeError` and never calls
/// `std::process::exit`; the CLI maps errors to exit codes at the edge via
/// [`to_exit_code`](Self::to_exit_code).
#[derive(Error, Debug)]
pub enum ReelforgeError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("stage execution error: {0}")]
    Stage(#[from] StageError),

    #[error("model gateway error: {0}")]
    Model(#[from] ModelError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown run '{0}'")]
    UnknownRun(String),

    #[error("run '{id}' failed: {reason}")]
    RunFailed { id: String, reason: String },
}

impl ReelforgeError {
    /// Map this error to a CLI exit code.
    #[must_use]
    pub fn to_exit_code(&self) -> crate::exit_codes::ExitCode {
        use crate::exit_codes::ExitCode;
        match self {
            Self::Config(_) => ExitCode::ConfigError,
            Self::RunFailed { .. } => ExitCode::RunFailed,
            _ => ExitCode::Failure,
        }
    }
}
