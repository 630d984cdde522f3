//! Bounded exponential backoff with deterministic jitter.
//!
//! Jitter is derived from the caller's task label and the attempt counter
//! rather than an RNG, so retry timing is reproducible under test while
//! still decorrelating siblings that fail together.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::time::Duration;

/// Retry budget for transport-level failures.
#[derive(Debug, Clone, Copy)]
pub struct RetrySchedule {
    /// Total attempts, the first included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetrySchedule {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetrySchedule {
    /// Delay before retry number `attempt` (1-based): base doubling per
    /// attempt, capped, plus jitter bounded by a quarter of the base delay.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, seed: u64) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        let capped = exp.min(self.max_delay);

        let jitter_bound_ms = (self.base_delay.as_millis() as u64 / 4).max(1);
        let jitter_ms = seed
            .wrapping_mul(31)
            .wrapping_add(u64::from(attempt).wrapping_mul(7))
            % jitter_bound_ms;

        capped.saturating_add(Duration::from_millis(jitter_ms))
    }
}

/// Stable seed for a task label.
#[must_use]
pub fn seed_for_label(label: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    label.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_grow_exponentially_until_capped() {
        let schedule = RetrySchedule {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(400),
        };
        let d1 = schedule.delay_for(1, 0);
        let d2 = schedule.delay_for(2, 0);
        let d3 = schedule.delay_for(3, 0);
        let d4 = schedule.delay_for(4, 0);

        assert!(d1 >= Duration::from_millis(100));
        assert!(d2 >= Duration::from_millis(200));
        assert!(d3 >= Duration::from_millis(400));
        // Capped: attempt 4 does not double past max_delay + jitter bound.
        assert!(d4 <= Duration::from_millis(400 + 25));
    }

    #[test]
    fn jitter_is_deterministic_per_label() {
        let schedule = RetrySchedule::default();
        let seed = seed_for_label("analysis/walkthrough_analysis");
        assert_eq!(schedule.delay_for(2, seed), schedule.delay_for(2, seed));
    }

    #[test]
    fn different_labels_usually_jitter_apart() {
        let a = seed_for_label("analysis/walkthrough_analysis");
        let b = seed_for_label("analysis/narration_extraction");
        assert_ne!(a, b);
    }
}
