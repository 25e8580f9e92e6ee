//! # Queue and Controller Configuration
//!
//! Immutable per-instance settings for the work queue processor and the
//! adaptive transaction-size controller. Defaults mirror conservative
//! production values; builder-style `with_*` setters allow selective
//! overrides:
//!
//! ```rust
//! use std::time::Duration;
//! use workqueue_core::WorkQueueSettings;
//!
//! let settings = WorkQueueSettings::default()
//!     .with_max_events(1000)
//!     .with_retry_interval(Duration::from_secs(10));
//! assert_eq!(settings.max_events, 1000);
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for a [`crate::WorkQueueProcessor`] instance.
///
/// All values are fixed for the lifetime of the processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkQueueSettings {
    /// Maximum number of envelopes the backing store may hold before
    /// producers are subjected to backpressure.
    pub max_events: usize,
    /// Maximum time a producer will block while the queue is full before
    /// `submit` fails with a saturation error.
    pub max_submit_wait_time: Duration,
    /// Interval between append attempts while a producer waits on a full
    /// queue.
    pub submit_poll_interval: Duration,
    /// Delay before the worker re-attempts a head item that requested retry.
    pub retry_interval: Duration,
    /// Maximum age of an envelope before it is discarded unprocessed.
    pub retry_discard_age: Duration,
    /// Maximum time `close` waits for the worker to drain and exit.
    pub max_shutdown_wait_time: Duration,
}

impl Default for WorkQueueSettings {
    fn default() -> Self {
        Self {
            max_events: 5000,
            max_submit_wait_time: Duration::from_secs(5),
            submit_poll_interval: Duration::from_millis(100),
            retry_interval: Duration::from_secs(30),
            retry_discard_age: Duration::from_secs(3600),
            max_shutdown_wait_time: Duration::from_secs(5),
        }
    }
}

impl WorkQueueSettings {
    /// Set the maximum queue length.
    pub fn with_max_events(mut self, max_events: usize) -> Self {
        self.max_events = max_events;
        self
    }

    /// Set the maximum time a producer blocks on a full queue.
    pub fn with_max_submit_wait_time(mut self, wait: Duration) -> Self {
        self.max_submit_wait_time = wait;
        self
    }

    /// Set the polling interval used while waiting on a full queue.
    pub fn with_submit_poll_interval(mut self, interval: Duration) -> Self {
        self.submit_poll_interval = interval;
        self
    }

    /// Set the delay before a retrying head item is re-attempted.
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Set the maximum age before an item is discarded unprocessed.
    pub fn with_retry_discard_age(mut self, age: Duration) -> Self {
        self.retry_discard_age = age;
        self
    }

    /// Set the shutdown drain deadline.
    pub fn with_max_shutdown_wait_time(mut self, wait: Duration) -> Self {
        self.max_shutdown_wait_time = wait;
        self
    }
}

/// Settings for a [`crate::TransactionSizeCalculator`].
///
/// The threshold factors are empirically chosen control-law constants,
/// exposed as configuration so they can be re-tuned per workload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionSizeConfig {
    /// Target wall-clock duration for one batch.
    pub duration_goal: Duration,
    /// Lower bound for the recommended batch size.
    pub min_transactions: u32,
    /// Upper bound for the recommended batch size.
    pub max_transactions: u32,
    /// Fraction of the goal within which a duration counts as "close";
    /// close durations adjust by a single unit step.
    pub close_threshold_ratio: f64,
    /// Overshoot beyond `halve_overshoot_factor * goal` halves the size.
    pub halve_overshoot_factor: f64,
    /// Overshoot beyond `reset_overshoot_factor * goal` resets the size to
    /// `min_transactions`.
    pub reset_overshoot_factor: f64,
}

impl Default for TransactionSizeConfig {
    fn default() -> Self {
        Self {
            duration_goal: Duration::from_millis(100),
            min_transactions: 5,
            max_transactions: 5000,
            close_threshold_ratio: 0.15,
            halve_overshoot_factor: 2.0,
            reset_overshoot_factor: 10.0,
        }
    }
}

impl TransactionSizeConfig {
    /// Set the target batch duration.
    pub fn with_duration_goal(mut self, goal: Duration) -> Self {
        self.duration_goal = goal;
        self
    }

    /// Set the minimum batch size.
    pub fn with_min_transactions(mut self, min: u32) -> Self {
        self.min_transactions = min;
        self
    }

    /// Set the maximum batch size.
    pub fn with_max_transactions(mut self, max: u32) -> Self {
        self.max_transactions = max;
        self
    }
}
