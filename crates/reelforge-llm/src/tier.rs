//! Model tier ladder with a per-run cursor.
//!
//! The cursor only ever moves toward cheaper tiers and never resets within a
//! run, so a run that degraded under quota pressure stays degraded for its
//! remaining calls (cost containment). The ladder is scoped per run, never
//! process-wide: concurrent runs degrade independently.

use std::sync::Mutex;

use tracing::warn;

use reelforge_utils::error::ConfigError;

/// Decides which tier serves the next attempt after a quota error.
///
/// Any policy satisfying this contract is substitutable into the gateway;
/// [`TierLadder`] is the standard one.
pub trait FallbackPolicy: Send + Sync {
    /// The tier new invocations should start at.
    fn current_tier(&self) -> String;

    /// Called when `failed_tier` hit a quota error. Returns the tier to
    /// retry on, or `None` when no cheaper tier remains.
    fn tier_after_quota(&self, failed_tier: &str) -> Option<String>;
}

/// Ordered model identifiers, most capable first, plus the run's cursor.
pub struct TierLadder {
    tiers: Vec<String>,
    cursor: Mutex<usize>,
}

impl TierLadder {
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for an empty ladder.
    pub fn new(tiers: Vec<String>) -> Result<Self, ConfigError> {
        if tiers.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "models.tiers".to_string(),
                reason: "tier ladder must name at least one model".to_string(),
            });
        }
        Ok(Self {
            tiers,
            cursor: Mutex::new(0),
        })
    }

    /// Current cursor position (0 = most capable tier). Exposed for run
    /// reports.
    #[must_use]
    pub fn cursor(&self) -> usize {
        *self.cursor.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl FallbackPolicy for TierLadder {
    fn current_tier(&self) -> String {
        let cursor = self
            .cursor
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        self.tiers[*cursor].clone()
    }

    fn tier_after_quota(&self, failed_tier: &str) -> Option<String> {
        let mut cursor = self
            .cursor
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        // A sibling may have advanced the cursor while this caller's request
        // was in flight. Its quota error is then stale: retry at the current
        // tier instead of skipping past it.
        if self.tiers[*cursor] != failed_tier {
            return Some(self.tiers[*cursor].clone());
        }

        if *cursor + 1 < self.tiers.len() {
            *cursor += 1;
            let next = self.tiers[*cursor].clone();
            warn!(from = failed_tier, to = %next, "quota pressure, degrading model tier");
            Some(next)
        } else {
            None
        }
    }
}
