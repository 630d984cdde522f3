//! Model gateway for reelforge.
//!
//! This crate wraps every call to the external generative model behind a
//! uniform contract: backends implement [`ModelBackend`], and the
//! [`ModelGateway`] layers tier fallback (quota errors walk a per-run ladder
//! toward cheaper models) and bounded transport retries on top. The
//! orchestrator never talks to a backend directly.

mod backoff;
mod gateway;
mod gemini_backend;
mod scripted_backend;
mod tier;
mod types;

pub use backoff::{RetrySchedule, seed_for_label};
pub use gateway::{GatewayOptions, ModelGateway};
pub use gemini_backend::{GeminiBackend, HttpParams};
pub use scripted_backend::{RecordedCall, ScriptedBackend, sample_bundle_response};
pub use tier::{FallbackPolicy, TierLadder};
pub use types::{GatewayError, ModelBackend, ModelRequest, ModelResponse};

use std::sync::Arc;

use reelforge_config::LlmConfig;
use reelforge_utils::error::ConfigError;

/// Construct a backend for the configured provider.
///
/// # Errors
///
/// Returns `ConfigError` for an unknown provider or a provider whose own
/// configuration (API key, endpoint) is unusable.
pub fn backend_from_config(llm: &LlmConfig) -> Result<Arc<dyn ModelBackend>, ConfigError> {
    match llm.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiBackend::new_from_config(llm)?)),
        "scripted" => Ok(Arc::new(ScriptedBackend::new(sample_bundle_response()))),
        unknown => Err(ConfigError::InvalidValue {
            key: "llm.provider".to_string(),
            reason: format!("unknown provider '{unknown}'; supported: gemini, scripted"),
        }),
    }
}

#[cfg(test)]
mod factory_tests {
    use super::*;

    #[test]
    fn scripted_provider_constructs_offline() {
        let llm = LlmConfig {
            provider: "scripted".to_string(),
            ..LlmConfig::default()
        };
        assert!(backend_from_config(&llm).is_ok());
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let llm = LlmConfig {
            provider: "teapot".to_string(),
            ..LlmConfig::default()
        };
        match backend_from_config(&llm) {
            Err(ConfigError::InvalidValue { key, reason }) => {
                assert_eq!(key, "llm.provider");
                assert!(reason.contains("teapot"));
            }
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn gemini_without_api_key_is_rejected() {
        let llm = LlmConfig {
            provider: "gemini".to_string(),
            api_key_env: "REELFORGE_TEST_KEY_THAT_IS_NOT_SET".to_string(),
            ..LlmConfig::default()
        };
        assert!(matches!(
            backend_from_config(&llm),
            Err(ConfigError::MissingEnv { .. })
        ));
    }
}
