//! Per-run artifact history.

use serde::{Deserialize, Serialize};

use reelforge_utils::types::Artifact;

use crate::extract::BundleParts;

/// Every artifact version produced by a run, oldest first.
///
/// Versions are assigned here and only here: 1-based, strictly increasing,
/// gapless. Old versions are retained for audit; the run exposes the latest
/// as current.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactLog {
    versions: Vec<Artifact>,
}

impl ArtifactLog {
    /// Record a new bundle, assigning the next version. Returns the stored
    /// artifact.
    pub fn publish(&mut self, parts: BundleParts) -> Artifact {
        let version = self.versions.len() as u32 + 1;
        let artifact = Artifact::new(version, parts.structure, parts.styling, parts.behavior);
        self.versions.push(artifact.clone());
        artifact
    }

    /// The latest version, if any generation pass has completed.
    #[must_use]
    pub fn current(&self) -> Option<&Artifact> {
        self.versions.last()
    }

    /// All retained versions, oldest first.
    #[must_use]
    pub fn versions(&self) -> &[Artifact] {
        &self.versions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(tag: &str) -> BundleParts {
        BundleParts {
            structure: format!("<html>{tag}</html>"),
            styling: String::new(),
            behavior: String::new(),
        }
    }

    #[test]
    fn versions_are_one_based_and_gapless() {
        let mut log = ArtifactLog::default();
        assert!(log.current().is_none());

        let v1 = log.publish(parts("a"));
        let v2 = log.publish(parts("b"));
        let v3 = log.publish(parts("c"));
        assert_eq!((v1.version, v2.version, v3.version), (1, 2, 3));
        assert_eq!(log.current().unwrap().version, 3);
        assert_eq!(log.versions().len(), 3);
    }

    #[test]
    fn old_versions_are_retained_unchanged() {
        let mut log = ArtifactLog::default();
        log.publish(parts("first"));
        log.publish(parts("second"));
        assert!(log.versions()[0].structure.contains("first"));
        assert!(log.current().unwrap().structure.contains("second"));
    }
}
