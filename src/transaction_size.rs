//! # Adaptive Transaction-Size Controller
//!
//! Feedback controller recommending how many work units a batch-oriented
//! consumer should process per transaction. After each batch the consumer
//! records the observed wall-clock duration; the controller compares it to a
//! target and nudges the recommended size with an AIMD-like law:
//!
//! - faster than the goal: grow by 10% when far below it, by one unit when
//!   close to it;
//! - slower than the goal: reset to the minimum on catastrophic overshoot
//!   (>10x goal), halve past 2x goal, shrink 10% when notably over, one unit
//!   when close;
//! - exactly on goal: unchanged.
//!
//! The result is always clamped to `[min_transactions, max_transactions]`.
//! Large overshoots recover quickly while near-goal adjustments stay gentle,
//! which keeps batch sizes stable against rate-limited downstream systems.

use std::time::Duration;
use tracing::debug;

use crate::config::TransactionSizeConfig;

/// Recommends a per-transaction batch size from observed batch durations.
#[derive(Debug, Clone)]
pub struct TransactionSizeCalculator {
    config: TransactionSizeConfig,
    transaction_size: u32,
    last_duration: Duration,
}

impl TransactionSizeCalculator {
    /// Create a controller starting at `min_transactions` with the last
    /// duration baselined to the goal.
    pub fn new(config: TransactionSizeConfig) -> Self {
        let transaction_size = config.min_transactions;
        let last_duration = config.duration_goal;
        Self {
            config,
            transaction_size,
            last_duration,
        }
    }

    /// Current recommended batch size.
    pub fn transaction_size(&self) -> u32 {
        self.transaction_size
    }

    /// Duration most recently recorded.
    pub fn last_duration(&self) -> Duration {
        self.last_duration
    }

    /// Reset to `min_transactions` and re-baseline the last duration to the
    /// goal.
    pub fn reset(&mut self) {
        self.transaction_size = self.config.min_transactions;
        self.last_duration = self.config.duration_goal;
    }

    /// Record the observed duration of the last batch and re-tune the
    /// recommended size.
    pub fn record_last_transaction_duration(&mut self, duration: Duration) {
        self.last_duration = duration;

        let goal = self.config.duration_goal;
        if duration == goal {
            return;
        }

        let close_threshold = goal.mul_f64(self.config.close_threshold_ratio);
        let size = i64::from(self.transaction_size);

        let next = if duration < goal {
            // Room to grow: aggressively when well under the goal, one unit
            // at a time once close.
            let difference = goal - duration;
            if difference > close_threshold {
                size + size / 10 + 1
            } else {
                size + 1
            }
        } else {
            // Too slow: graduated shrink steps by how far over goal we are.
            let difference = duration - goal;
            if difference > goal.mul_f64(self.config.reset_overshoot_factor) {
                i64::from(self.config.min_transactions)
            } else if difference > goal.mul_f64(self.config.halve_overshoot_factor) {
                size / 2
            } else if difference > close_threshold {
                size - size / 10 - 1
            } else {
                size - 1
            }
        };

        self.transaction_size = next
            .clamp(
                i64::from(self.config.min_transactions),
                i64::from(self.config.max_transactions),
            ) as u32;

        debug!(
            duration_ms = duration.as_millis() as u64,
            goal_ms = goal.as_millis() as u64,
            transaction_size = self.transaction_size,
            "transaction size re-tuned"
        );
    }

    /// Backoff sleep capped at `min(last_duration, 2 * duration_goal)`.
    ///
    /// Intended to be called after recording a duration, so a consumer does
    /// not hammer a struggling downstream system.
    pub async fn pause(&self) {
        let cap = self.config.duration_goal * 2;
        let wait = self.last_duration.min(cap);
        tokio::time::sleep(wait).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn calculator() -> TransactionSizeCalculator {
        TransactionSizeCalculator::new(
            TransactionSizeConfig::default()
                .with_duration_goal(Duration::from_millis(100))
                .with_min_transactions(5)
                .with_max_transactions(5000),
        )
    }

    #[test]
    fn test_on_goal_leaves_size_unchanged() {
        let mut calc = calculator();
        for _ in 0..10 {
            calc.record_last_transaction_duration(Duration::from_millis(100));
        }
        assert_eq!(calc.transaction_size(), 5);
    }

    #[test]
    fn test_fast_batches_grow_to_max() {
        let mut calc = calculator();
        let mut previous = calc.transaction_size();
        for _ in 0..200 {
            calc.record_last_transaction_duration(Duration::from_millis(50));
            assert!(calc.transaction_size() >= previous);
            previous = calc.transaction_size();
        }
        assert_eq!(calc.transaction_size(), 5000);
    }

    #[test]
    fn test_near_goal_grows_by_one() {
        let mut calc = calculator();
        // 95ms is within 15% of a 100ms goal: gentle unit step.
        calc.record_last_transaction_duration(Duration::from_millis(95));
        assert_eq!(calc.transaction_size(), 6);
    }

    #[test]
    fn test_near_goal_shrinks_by_one() {
        let mut calc = calculator();
        for _ in 0..200 {
            calc.record_last_transaction_duration(Duration::from_millis(50));
        }
        let grown = calc.transaction_size();
        calc.record_last_transaction_duration(Duration::from_millis(110));
        assert_eq!(calc.transaction_size(), grown - 1);
    }

    #[test]
    fn test_moderate_overshoot_shrinks_ten_percent() {
        let mut calc = calculator();
        for _ in 0..200 {
            calc.record_last_transaction_duration(Duration::from_millis(50));
        }
        let grown = i64::from(calc.transaction_size());
        // 150ms is 50% over a 100ms goal: past the close threshold, below 2x.
        calc.record_last_transaction_duration(Duration::from_millis(150));
        assert_eq!(
            i64::from(calc.transaction_size()),
            grown - grown / 10 - 1
        );
    }

    #[test]
    fn test_large_overshoot_halves() {
        let mut calc = calculator();
        for _ in 0..200 {
            calc.record_last_transaction_duration(Duration::from_millis(50));
        }
        let grown = calc.transaction_size();
        // 350ms is 2.5x over goal: halve.
        calc.record_last_transaction_duration(Duration::from_millis(350));
        assert_eq!(calc.transaction_size(), grown / 2);
    }

    #[test]
    fn test_catastrophic_overshoot_resets_to_min() {
        let mut calc = calculator();
        for _ in 0..200 {
            calc.record_last_transaction_duration(Duration::from_millis(50));
        }
        assert!(calc.transaction_size() > 5);
        calc.record_last_transaction_duration(Duration::from_millis(2000));
        assert_eq!(calc.transaction_size(), 5);
    }

    #[test]
    fn test_reset_restores_baseline() {
        let mut calc = calculator();
        calc.record_last_transaction_duration(Duration::from_millis(10));
        assert!(calc.transaction_size() > 5);
        calc.reset();
        assert_eq!(calc.transaction_size(), 5);
        assert_eq!(calc.last_duration(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_is_capped_at_twice_goal() {
        let mut calc = calculator();
        calc.record_last_transaction_duration(Duration::from_secs(60));
        let start = tokio::time::Instant::now();
        calc.pause().await;
        // Capped at 2 x 100ms despite the 60s recorded duration.
        assert_eq!(start.elapsed(), Duration::from_millis(200));
    }

    proptest! {
        #[test]
        fn prop_size_stays_within_bounds(durations in prop::collection::vec(0u64..10_000, 1..100)) {
            let mut calc = calculator();
            for millis in durations {
                calc.record_last_transaction_duration(Duration::from_millis(millis));
                prop_assert!(calc.transaction_size() >= 5);
                prop_assert!(calc.transaction_size() <= 5000);
            }
        }
    }
}
