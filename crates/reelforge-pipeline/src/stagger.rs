//! Admission shaping for parallel siblings.
//!
//! N tasks fanning out simultaneously can blow through a provider's burst
//! quota even when the sustained rate is fine. The stagger policy spreads
//! their start times: each admission is scheduled at least one spacing
//! (base delay + per-caller jitter) after the previously admitted sibling.
//! Best-effort shaping only: it delays starts, never queues indefinitely,
//! and has no retry semantics of its own.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::debug;

use reelforge_config::StaggerConfig;
use reelforge_llm::seed_for_label;

/// Decides when a caller may start its external call.
///
/// Substitutable into the stage executor; [`StaggerPolicy`] is the standard
/// implementation, [`NoStagger`] admits immediately.
#[async_trait]
pub trait AdmissionPolicy: Send + Sync {
    /// Block until the caller's scheduled start time.
    async fn admit(&self, caller: &str);
}

/// Inter-start spacing relative to the last admitted sibling.
///
/// The last-admission instant is the only shared state, scoped to the run
/// that owns this policy (one per run, never process-wide).
pub struct StaggerPolicy {
    base_delay: Duration,
    jitter_bound: Duration,
    last_start: Mutex<Option<Instant>>,
}

impl StaggerPolicy {
    #[must_use]
    pub fn new(base_delay: Duration, jitter_bound: Duration) -> Self {
        Self {
            base_delay,
            jitter_bound,
            last_start: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn from_config(cfg: &StaggerConfig) -> Self {
        Self::new(
            Duration::from_millis(cfg.base_delay_ms),
            Duration::from_millis(cfg.jitter_ms),
        )
    }

    /// Deterministic per-caller jitter in `[0, jitter_bound]`.
    fn jitter_for(&self, caller: &str) -> Duration {
        let bound_ms = self.jitter_bound.as_millis() as u64;
        if bound_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(seed_for_label(caller) % (bound_ms + 1))
    }
}

#[async_trait]
impl AdmissionPolicy for StaggerPolicy {
    async fn admit(&self, caller: &str) {
        let scheduled = {
            let mut last = self
                .last_start
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let now = Instant::now();
            let start = match *last {
                None => now,
                Some(prev) => {
                    let spacing = self.base_delay + self.jitter_for(caller);
                    now.max(prev + spacing)
                }
            };
            *last = Some(start);
            start
        };

        let wait = scheduled.saturating_duration_since(Instant::now());
        if !wait.is_zero() {
            debug!(caller, wait_ms = wait.as_millis() as u64, "staggering task start");
        }
        tokio::time::sleep_until(scheduled).await;
    }
}

/// Immediate admission; used for sequential stages and tests that do not
/// exercise spacing.
pub struct NoStagger;

#[async_trait]
impl AdmissionPolicy for NoStagger {
    async fn admit(&self, _caller: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sibling_starts_are_spaced_by_at_least_the_base_delay() {
        let policy = StaggerPolicy::new(Duration::from_millis(500), Duration::from_millis(100));

        policy.admit("analysis/a").await;
        let first = Instant::now();
        policy.admit("analysis/b").await;
        let second = Instant::now();
        policy.admit("analysis/c").await;
        let third = Instant::now();

        assert!(second - first >= Duration::from_millis(500));
        assert!(second - first <= Duration::from_millis(600));
        assert!(third - second >= Duration::from_millis(500));
        assert!(third - second <= Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn first_caller_is_admitted_immediately() {
        let policy = StaggerPolicy::new(Duration::from_millis(500), Duration::ZERO);
        let before = Instant::now();
        policy.admit("analysis/a").await;
        assert_eq!(Instant::now(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_gaps_larger_than_the_spacing_reset_the_schedule() {
        let policy = StaggerPolicy::new(Duration::from_millis(500), Duration::ZERO);
        policy.admit("a").await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        let before = Instant::now();
        policy.admit("b").await;
        // The previous admission is long past; no extra delay is owed.
        assert_eq!(Instant::now(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn jitter_is_deterministic_per_caller() {
        let policy_a = StaggerPolicy::new(Duration::from_millis(100), Duration::from_millis(200));
        let policy_b = StaggerPolicy::new(Duration::from_millis(100), Duration::from_millis(200));
        assert_eq!(policy_a.jitter_for("x/y"), policy_b.jitter_for("x/y"));
        assert!(policy_a.jitter_for("x/y") <= Duration::from_millis(200));
    }
}
