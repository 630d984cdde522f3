//! Validation report model.

use serde::{Deserialize, Serialize};

use reelforge_utils::types::Severity;

/// One issue reported by the harness against a generated artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    /// Harness-defined category, e.g. `accessibility`, `layout`, `console`.
    pub category: String,
    pub message: String,
    /// Where in the artifact the issue was observed, when the harness knows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl Finding {
    #[must_use]
    pub fn new(severity: Severity, category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            category: category.into(),
            message: message.into(),
            location: None,
        }
    }

    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// The harness's verdict on one artifact version. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// The artifact version this report was computed against.
    pub artifact_version: u32,
    pub passed: bool,
    pub findings: Vec<Finding>,
}

impl ValidationReport {
    /// A passing report with no findings.
    #[must_use]
    pub fn clean(artifact_version: u32) -> Self {
        Self {
            artifact_version,
            passed: true,
            findings: Vec::new(),
        }
    }

    /// A failing report carrying the given findings.
    #[must_use]
    pub fn failing(artifact_version: u32, findings: Vec<Finding>) -> Self {
        Self {
            artifact_version,
            passed: false,
            findings,
        }
    }

    /// Whether any finding is at or above the blocking severity.
    ///
    /// A failing report whose findings all sit below the threshold is
    /// tolerated: the site ships, the findings are reported.
    #[must_use]
    pub fn has_blocking_findings(&self, threshold: Severity) -> bool {
        self.findings.iter().any(|f| f.severity >= threshold)
    }

    /// Findings at or above the blocking severity, in report order.
    #[must_use]
    pub fn blocking_findings(&self, threshold: Severity) -> Vec<&Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity >= threshold)
            .collect()
    }
}
