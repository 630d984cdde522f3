//! Core domain types shared across the workspace.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Number of hex characters kept from the blake3 digest for a run id.
///
/// 16 hex chars = 64 bits, plenty for a store that holds in-flight runs.
const RUN_ID_HEX_LEN: usize = 16;

/// Identifier of one pipeline run.
///
/// Derived from the input content, not from creation time: submitting the
/// same walkthrough and narration twice yields the same id, which is what
/// makes run creation idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Derive a run id from the raw input bytes.
    #[must_use]
    pub fn from_input(input: &[u8]) -> Self {
        let digest = blake3::hash(input).to_hex();
        Self(digest[..RUN_ID_HEX_LEN].to_string())
    }

    /// Wrap an already-derived id (e.g. parsed back from a report file).
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Severity of a validation finding.
///
/// Ordering matters: the refinement loop compares against a configured
/// blocking threshold, so `Info < Warning < Error`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// One generated website bundle.
///
/// Versions are assigned by the artifact log, strictly increasing and gapless
/// within a run. Older versions are retained for audit; only the latest is
/// exposed as current.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// 1-based content version within the run.
    pub version: u32,
    /// Markup blob (rendered to `structure.html` at the output boundary).
    pub structure: String,
    /// Stylesheet blob (`styling.css`).
    pub styling: String,
    /// Script blob (`behavior.js`).
    pub behavior: String,
}

impl Artifact {
    #[must_use]
    pub fn new(
        version: u32,
        structure: impl Into<String>,
        styling: impl Into<String>,
        behavior: impl Into<String>,
    ) -> Self {
        Self {
            version,
            structure: structure.into(),
            styling: styling.into(),
            behavior: behavior.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn run_id_is_content_keyed() {
        let a = RunId::from_input(b"walkthrough-1");
        let b = RunId::from_input(b"walkthrough-1");
        let c = RunId::from_input(b"walkthrough-2");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), 16);
    }

    #[test]
    fn severity_ordering_supports_thresholds() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error >= Severity::Error);
    }

    #[test]
    fn severity_parses_case_insensitively() {
        assert_eq!(Severity::from_str("error").unwrap(), Severity::Error);
        assert_eq!(Severity::from_str("Warning").unwrap(), Severity::Warning);
        assert!(Severity::from_str("catastrophic").is_err());
    }

    #[test]
    fn severity_serde_roundtrip() {
        let json = serde_json::to_string(&Severity::Warning).unwrap();
        assert_eq!(json, "\"warning\"");
        let back: Severity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Severity::Warning);
    }
}
