//! Integration tests for the adaptive transaction-size controller.
//!
//! These exercise the documented convergence behavior of the control law
//! end to end: holding at goal, growing under headroom, and collapsing on
//! overshoot.

use std::time::Duration;

use workqueue_core::{TransactionSizeCalculator, TransactionSizeConfig};

fn controller(goal_ms: u64, min: u32, max: u32) -> TransactionSizeCalculator {
    TransactionSizeCalculator::new(
        TransactionSizeConfig::default()
            .with_duration_goal(Duration::from_millis(goal_ms))
            .with_min_transactions(min)
            .with_max_transactions(max),
    )
}

#[test]
fn test_exact_goal_durations_hold_size_steady() {
    let mut calc = controller(200, 10, 1000);
    assert_eq!(calc.transaction_size(), 10);

    for _ in 0..50 {
        calc.record_last_transaction_duration(Duration::from_millis(200));
    }
    assert_eq!(calc.transaction_size(), 10);
}

#[test]
fn test_half_goal_durations_grow_monotonically_to_max() {
    let mut calc = controller(200, 10, 1000);
    let mut previous = calc.transaction_size();

    for _ in 0..300 {
        calc.record_last_transaction_duration(Duration::from_millis(100));
        let current = calc.transaction_size();
        assert!(current >= previous, "growth must be monotonic");
        previous = current;
    }
    assert_eq!(calc.transaction_size(), 1000);
}

#[test]
fn test_twenty_times_goal_resets_to_min_from_any_size() {
    let mut calc = controller(200, 10, 1000);

    for _ in 0..300 {
        calc.record_last_transaction_duration(Duration::from_millis(100));
    }
    assert_eq!(calc.transaction_size(), 1000);

    calc.record_last_transaction_duration(Duration::from_millis(4000));
    assert_eq!(calc.transaction_size(), 10);
}

#[test]
fn test_recovery_after_reset_starts_from_min() {
    let mut calc = controller(100, 5, 500);

    for _ in 0..100 {
        calc.record_last_transaction_duration(Duration::from_millis(20));
    }
    let grown = calc.transaction_size();
    assert!(grown > 5);

    calc.reset();
    assert_eq!(calc.transaction_size(), 5);
    assert_eq!(calc.last_duration(), Duration::from_millis(100));

    calc.record_last_transaction_duration(Duration::from_millis(20));
    assert!(calc.transaction_size() > 5);
    assert!(calc.transaction_size() < grown);
}

#[tokio::test(start_paused = true)]
async fn test_pause_sleeps_for_last_duration_when_under_cap() {
    let mut calc = controller(100, 5, 500);
    calc.record_last_transaction_duration(Duration::from_millis(120));

    let started = tokio::time::Instant::now();
    calc.pause().await;
    assert_eq!(started.elapsed(), Duration::from_millis(120));
}

#[tokio::test(start_paused = true)]
async fn test_pause_is_capped_at_twice_goal() {
    let mut calc = controller(100, 5, 500);
    calc.record_last_transaction_duration(Duration::from_secs(30));

    let started = tokio::time::Instant::now();
    calc.pause().await;
    assert_eq!(started.elapsed(), Duration::from_millis(200));
}
