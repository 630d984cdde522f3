//! Gemini HTTP backend.
//!
//! Calls the `generateContent` endpoint and classifies failures into the
//! gateway's three error classes. API keys come from the environment and are
//! never echoed into errors or logs; error detail carries the HTTP status
//! and a truncated response body only.

use serde::{Deserialize, Serialize};
use tracing::debug;

use reelforge_config::LlmConfig;
use reelforge_utils::error::{ConfigError, ModelError};

use crate::types::{ModelBackend, ModelRequest};

use async_trait::async_trait;

/// Default Gemini API endpoint prefix.
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Longest response-body excerpt carried in an error.
const ERROR_BODY_EXCERPT: usize = 200;

/// HTTP request parameters.
#[derive(Debug, Clone, Copy)]
pub struct HttpParams {
    pub max_output_tokens: u32,
    pub temperature: f32,
}

impl Default for HttpParams {
    fn default() -> Self {
        Self {
            max_output_tokens: 8192,
            temperature: 0.2,
        }
    }
}

/// Gemini backend over reqwest.
pub struct GeminiBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    params: HttpParams,
}

impl std::fmt::Debug for GeminiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiBackend")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl GeminiBackend {
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the HTTP client cannot be
    /// constructed.
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        request_timeout: std::time::Duration,
        params: HttpParams,
    ) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                key: "llm".to_string(),
                reason: format!("failed to construct HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key,
            params,
        })
    }

    /// Build a backend from the `[llm]` config section.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnv` when the API key variable is unset.
    pub fn new_from_config(llm: &LlmConfig) -> Result<Self, ConfigError> {
        let api_key = std::env::var(&llm.api_key_env).map_err(|_| ConfigError::MissingEnv {
            var: llm.api_key_env.clone(),
            purpose: "Gemini API key".to_string(),
        })?;

        Self::new(
            api_key,
            llm.base_url.clone(),
            std::time::Duration::from_secs(llm.request_timeout_secs),
            HttpParams {
                max_output_tokens: llm.max_output_tokens,
                temperature: llm.temperature,
            },
        )
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    fn classify_status(model: &str, status: reqwest::StatusCode, body: &str) -> ModelError {
        let mut excerpt: String = body.chars().take(ERROR_BODY_EXCERPT).collect();
        if excerpt.len() < body.len() {
            excerpt.push('…');
        }

        if status.as_u16() == 429 || body.contains("RESOURCE_EXHAUSTED") {
            ModelError::Quota {
                tier: model.to_string(),
                detail: format!("HTTP {status}: {excerpt}"),
            }
        } else if status.is_server_error() {
            ModelError::Transport {
                detail: format!("HTTP {status}: {excerpt}"),
            }
        } else {
            ModelError::Invalid {
                detail: format!("HTTP {status}: {excerpt}"),
            }
        }
    }
}

#[async_trait]
impl ModelBackend for GeminiBackend {
    async fn invoke(&self, model: &str, request: &ModelRequest) -> Result<String, ModelError> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: request.rendered_prompt(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.params.temperature,
                max_output_tokens: self.params.max_output_tokens,
            },
        };

        debug!(model, task = %request.task, "posting generateContent request");

        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::Transport {
                detail: if e.is_timeout() {
                    "request timed out".to_string()
                } else {
                    format!("request failed: {e}")
                },
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(model, status, &body));
        }

        let decoded: GenerateContentResponse =
            response.json().await.map_err(|e| ModelError::Transport {
                detail: format!("failed to decode response: {e}"),
            })?;

        let content: String = decoded
            .candidates
            .iter()
            .flat_map(|c| c.content.parts.iter())
            .filter_map(|p| p.text.as_deref())
            .collect();

        if content.is_empty() {
            return Err(ModelError::Transport {
                detail: "response carried no text content".to_string(),
            });
        }

        Ok(content)
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_429_maps_to_quota() {
        let err = GeminiBackend::classify_status(
            "gemini-2.5-flash",
            reqwest::StatusCode::TOO_MANY_REQUESTS,
            "rate limited",
        );
        match err {
            ModelError::Quota { tier, .. } => assert_eq!(tier, "gemini-2.5-flash"),
            other => panic!("expected Quota, got {other:?}"),
        }
    }

    #[test]
    fn resource_exhausted_body_maps_to_quota_even_on_other_statuses() {
        let err = GeminiBackend::classify_status(
            "gemini-2.0-flash",
            reqwest::StatusCode::FORBIDDEN,
            r#"{"error":{"status":"RESOURCE_EXHAUSTED"}}"#,
        );
        assert!(matches!(err, ModelError::Quota { .. }));
    }

    #[test]
    fn server_errors_map_to_transport() {
        let err = GeminiBackend::classify_status(
            "m",
            reqwest::StatusCode::SERVICE_UNAVAILABLE,
            "overloaded",
        );
        assert!(matches!(err, ModelError::Transport { .. }));
    }

    #[test]
    fn client_errors_map_to_invalid() {
        let err =
            GeminiBackend::classify_status("m", reqwest::StatusCode::BAD_REQUEST, "bad payload");
        assert!(matches!(err, ModelError::Invalid { .. }));
    }

    #[test]
    fn error_detail_truncates_large_bodies() {
        let body = "x".repeat(10_000);
        let err = GeminiBackend::classify_status("m", reqwest::StatusCode::BAD_REQUEST, &body);
        let text = err.to_string();
        assert!(text.len() < 400);
    }
}
