//! Validator implementations: the HTTP harness client and an offline
//! scripted validator for tests and dry runs.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use reelforge_utils::error::ValidationError;
use reelforge_utils::types::Artifact;

use crate::Validator;
use crate::report::{Finding, ValidationReport};

/// Client for the browser-automation harness service.
///
/// Posts the three bundle blobs, receives the harness's verdict. Transport
/// failures and non-2xx answers surface as `Unavailable`; a 2xx answer that
/// does not decode surfaces as `Malformed`.
pub struct HttpHarness {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpHarness {
    /// # Errors
    ///
    /// Returns `ValidationError::Unavailable` if the HTTP client cannot be
    /// constructed.
    pub fn new(
        endpoint: impl Into<String>,
        request_timeout: std::time::Duration,
    ) -> Result<Self, ValidationError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ValidationError::Unavailable {
                detail: format!("failed to construct HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl Validator for HttpHarness {
    async fn validate(&self, artifact: &Artifact) -> Result<ValidationReport, ValidationError> {
        let body = ValidateRequest {
            version: artifact.version,
            structure: &artifact.structure,
            styling: &artifact.styling,
            behavior: &artifact.behavior,
        };

        debug!(version = artifact.version, endpoint = %self.endpoint, "posting bundle for validation");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| ValidationError::Unavailable {
                detail: if e.is_timeout() {
                    "harness request timed out".to_string()
                } else {
                    format!("harness request failed: {e}")
                },
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ValidationError::Unavailable {
                detail: format!("harness answered HTTP {status}"),
            });
        }

        let decoded: ValidateResponse =
            response.json().await.map_err(|e| ValidationError::Malformed {
                detail: format!("failed to decode harness report: {e}"),
            })?;

        Ok(ValidationReport {
            artifact_version: artifact.version,
            passed: decoded.passed,
            findings: decoded.findings,
        })
    }
}

#[derive(Serialize)]
struct ValidateRequest<'a> {
    version: u32,
    structure: &'a str,
    styling: &'a str,
    behavior: &'a str,
}

#[derive(Deserialize)]
struct ValidateResponse {
    passed: bool,
    #[serde(default)]
    findings: Vec<Finding>,
}

/// Offline validator replaying a queue of verdicts.
///
/// An empty queue serves the configured default, so a "never passes"
/// validator is just a failing default with no script.
pub struct ScriptedValidator {
    script: Mutex<VecDeque<Result<ValidationReport, ValidationError>>>,
    default: Result<ValidationReport, ValidationError>,
}

impl ScriptedValidator {
    /// Validator whose default verdict is a clean pass.
    #[must_use]
    pub fn passing() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default: Ok(ValidationReport::clean(0)),
        }
    }

    /// Validator whose default verdict fails with the given findings.
    #[must_use]
    pub fn failing_with(findings: Vec<Finding>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default: Ok(ValidationReport::failing(0, findings)),
        }
    }

    /// Validator whose default verdict is an error (e.g. harness down).
    #[must_use]
    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default: Err(ValidationError::Unavailable {
                detail: detail.into(),
            }),
        }
    }

    /// Queue a verdict for a future call; queued verdicts win over the
    /// default.
    pub fn enqueue(&self, verdict: Result<ValidationReport, ValidationError>) {
        self.script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push_back(verdict);
    }
}

#[async_trait]
impl Validator for ScriptedValidator {
    async fn validate(&self, artifact: &Artifact) -> Result<ValidationReport, ValidationError> {
        let scripted = self
            .script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front();
        let verdict = scripted.unwrap_or_else(|| self.default.clone());
        // Reports are always stamped with the version actually validated.
        verdict.map(|mut report| {
            report.artifact_version = artifact.version;
            report
        })
    }
}
