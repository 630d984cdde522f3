//! Request/response contract between the orchestrator and model backends.

use async_trait::async_trait;
use thiserror::Error;

use reelforge_utils::error::ModelError;

/// Input to one model invocation.
///
/// The context is kept as ordered blocks rather than a pre-joined string so
/// the refinement loop can append validation feedback as its own block and
/// tests can verify it survives into the rendered prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRequest {
    /// Task label, e.g. `"analysis/walkthrough_analysis"`. Used for logging
    /// and as the seed for deterministic retry jitter.
    pub task: String,
    /// The instruction for this task.
    pub instruction: String,
    /// Ordered context blocks: upstream stage outputs, then feedback.
    pub context: Vec<String>,
}

impl ModelRequest {
    #[must_use]
    pub fn new(task: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            instruction: instruction.into(),
            context: Vec::new(),
        }
    }

    /// Append a context block, returning self for chaining.
    #[must_use]
    pub fn with_context(mut self, block: impl Into<String>) -> Self {
        self.context.push(block.into());
        self
    }

    /// Append a context block in place.
    pub fn push_context(&mut self, block: impl Into<String>) {
        self.context.push(block.into());
    }

    /// The full prompt as sent to the backend: context blocks first, then
    /// the instruction, separated by blank lines.
    #[must_use]
    pub fn rendered_prompt(&self) -> String {
        let mut parts: Vec<&str> = self.context.iter().map(String::as_str).collect();
        parts.push(&self.instruction);
        parts.join("\n\n")
    }
}

/// Output of one gateway invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelResponse {
    pub content: String,
    /// The tier that actually served the request; may be cheaper than the
    /// tier current when the call started if fallback fired mid-call.
    pub tier_used: String,
}

/// Trait implemented by model providers.
///
/// Backends are dumb pipes: they perform exactly one attempt and classify
/// the failure. Fallback and retry policy live in the gateway.
#[async_trait]
pub trait ModelBackend: Send + Sync + std::fmt::Debug {
    /// Invoke `model` with the given request, returning the raw text
    /// completion.
    ///
    /// # Errors
    ///
    /// Returns a classified [`ModelError`]; backends must not retry
    /// internally.
    async fn invoke(&self, model: &str, request: &ModelRequest) -> Result<String, ModelError>;
}

/// Result type of a gateway invocation.
///
/// Cancellation is separated from model errors so the stage executor can
/// report a cancelled task as Cancelled rather than Failed.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("invocation interrupted by cancellation")]
    Cancelled,
}
