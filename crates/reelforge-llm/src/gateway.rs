//! The model gateway: one uniform `invoke` over any backend, with tier
//! fallback and bounded transport retries.
//!
//! Retry policy, by error class:
//!
//! - **Quota**: pause for the configured cool-down, ask the fallback policy
//!   for the next tier, retry once per rung. At the cheapest tier the error
//!   is fatal for the task.
//! - **Transport**: retry at the same tier with exponential backoff, at most
//!   `retry.max_attempts` total attempts.
//! - **Invalid**: fatal immediately.
//!
//! Cancellation is observed at every suspension point; an interrupted call
//! returns [`GatewayError::Cancelled`] without consuming further retries.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use reelforge_config::LlmConfig;

use crate::backoff::{RetrySchedule, seed_for_label};
use crate::tier::FallbackPolicy;
use crate::types::{GatewayError, ModelBackend, ModelRequest, ModelResponse};

/// Gateway tuning knobs.
#[derive(Debug, Clone, Copy)]
pub struct GatewayOptions {
    pub retry: RetrySchedule,
    /// Pause before retrying after a quota error, honoring provider
    /// cool-down advice.
    pub quota_cooldown: Duration,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            retry: RetrySchedule::default(),
            quota_cooldown: Duration::from_millis(250),
        }
    }
}

impl GatewayOptions {
    #[must_use]
    pub fn from_config(llm: &LlmConfig) -> Self {
        Self {
            retry: RetrySchedule::default(),
            quota_cooldown: Duration::from_millis(llm.quota_cooldown_ms),
        }
    }
}

/// Uniform entry point for all model calls within one run.
///
/// The gateway holds no per-request state; the only mutable state it touches
/// is the fallback policy's tier cursor, which is scoped to the run that
/// owns this gateway.
pub struct ModelGateway {
    backend: Arc<dyn ModelBackend>,
    fallback: Arc<dyn FallbackPolicy>,
    options: GatewayOptions,
}

impl ModelGateway {
    #[must_use]
    pub fn new(
        backend: Arc<dyn ModelBackend>,
        fallback: Arc<dyn FallbackPolicy>,
        options: GatewayOptions,
    ) -> Self {
        Self {
            backend,
            fallback,
            options,
        }
    }

    /// The tier a fresh invocation would start at.
    #[must_use]
    pub fn current_tier(&self) -> String {
        self.fallback.current_tier()
    }

    /// Invoke the model, applying fallback and retry policy.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Model` once retries and fallback are exhausted,
    /// or `GatewayError::Cancelled` when the token fires at a suspension
    /// point.
    pub async fn invoke(
        &self,
        request: &ModelRequest,
        cancel: &CancellationToken,
    ) -> Result<ModelResponse, GatewayError> {
        use reelforge_utils::error::ModelError;

        let seed = seed_for_label(&request.task);
        let mut tier = self.fallback.current_tier();
        let mut attempts = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(GatewayError::Cancelled);
            }

            attempts += 1;
            debug!(task = %request.task, tier = %tier, attempts, "invoking model");

            // Race the provider call against cancellation: an admitted call is
            // not aborted server-side, but its result is discarded and the
            // caller sees Cancelled.
            let attempt = tokio::select! {
                result = self.backend.invoke(&tier, request) => result,
                () = cancel.cancelled() => return Err(GatewayError::Cancelled),
            };

            match attempt {
                Ok(content) => {
                    return Ok(ModelResponse {
                        content,
                        tier_used: tier,
                    });
                }
                Err(err @ ModelError::Quota { .. }) => {
                    match self.fallback.tier_after_quota(&tier) {
                        Some(next) => {
                            warn!(
                                task = %request.task,
                                from = %tier,
                                to = %next,
                                "quota error, retrying on cheaper tier"
                            );
                            self.pause(self.options.quota_cooldown, cancel).await?;
                            tier = next;
                        }
                        None => {
                            warn!(task = %request.task, tier = %tier, "quota exhausted at cheapest tier");
                            return Err(err.into());
                        }
                    }
                }
                Err(err @ ModelError::Transport { .. }) => {
                    if attempts >= self.options.retry.max_attempts {
                        return Err(err.into());
                    }
                    let delay = self.options.retry.delay_for(attempts, seed);
                    debug!(
                        task = %request.task,
                        attempts,
                        delay_ms = delay.as_millis() as u64,
                        "transport failure, backing off"
                    );
                    self.pause(delay, cancel).await?;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn pause(
        &self,
        duration: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), GatewayError> {
        tokio::select! {
            () = tokio::time::sleep(duration) => Ok(()),
            () = cancel.cancelled() => Err(GatewayError::Cancelled),
        }
    }
}
