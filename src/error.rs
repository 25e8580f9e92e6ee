//! # Work Queue Error Types
//!
//! Structured error taxonomy for the queue surface. Only producer-facing
//! conditions become errors; everything the worker loop can absorb (corrupt
//! envelopes, stale items, terminal processing failures) is logged and
//! swallowed so a single bad item can never wedge the queue.

/// Errors surfaced to producers by [`crate::WorkQueueProcessor`].
#[derive(Debug, thiserror::Error)]
pub enum WorkQueueError {
    /// `submit` was called after shutdown began.
    #[error("work queue '{name}' is closed, rejecting item: {item}")]
    Closed { name: String, item: String },

    /// The backing store stayed full past `max_submit_wait_time`.
    #[error("work queue '{name}' is saturated (waited {waited_ms}ms), rejecting item: {item}")]
    Saturated {
        name: String,
        item: String,
        waited_ms: u64,
    },

    /// The submitted item could not be serialized into an envelope.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, WorkQueueError>;
