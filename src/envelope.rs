//! # Work Item Envelope
//!
//! The persisted wrapper around a caller's work item: submission timestamp
//! (for age-based discard), a locally unique id (for log correlation), and
//! the payload itself. Envelopes are immutable once created and travel
//! through the backing store as JSON strings.
//!
//! The payload type is fixed per processor instance via the generic
//! parameter, so deserialization needs no runtime type lookup.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Immutable wrapper persisted to the backing store for each work item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItemEnvelope<T> {
    /// When the item was submitted.
    pub submitted_at: DateTime<Utc>,
    /// Locally unique id for logging and debugging.
    pub id: String,
    /// The caller's work item.
    pub payload: T,
}

impl<T> WorkItemEnvelope<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Wrap a payload, stamping the current time.
    pub fn new(id: String, payload: T) -> Self {
        Self {
            submitted_at: Utc::now(),
            id,
            payload,
        }
    }

    /// Serialize into the transportable string form.
    pub fn to_wire(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from the transportable string form.
    pub fn from_wire(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Elapsed time since submission. Negative on clock skew.
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.submitted_at
    }
}

/// Generator of locally unique envelope ids.
///
/// A monotonically advancing counter seeded from a random value at startup,
/// rendered as hex. Ids are unique within a process lifetime and unlikely to
/// collide across restarts, which keeps log correlation unambiguous.
#[derive(Debug)]
pub struct EnvelopeIdGenerator {
    counter: AtomicU64,
}

impl EnvelopeIdGenerator {
    /// Create a generator with a random starting point.
    pub fn new() -> Self {
        let seed = Uuid::new_v4().as_u128() as u64;
        Self {
            counter: AtomicU64::new(seed),
        }
    }

    /// Produce the next id.
    pub fn next_id(&self) -> String {
        let value = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{value:x}")
    }
}

impl Default for EnvelopeIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_round_trip() {
        let envelope = WorkItemEnvelope::new("abc123".to_string(), "payload-data".to_string());
        let raw = envelope.to_wire().expect("serialize envelope");
        let back: WorkItemEnvelope<String> =
            WorkItemEnvelope::from_wire(&raw).expect("deserialize envelope");

        assert_eq!(back.id, "abc123");
        assert_eq!(back.payload, "payload-data");
        assert_eq!(back.submitted_at, envelope.submitted_at);
    }

    #[test]
    fn test_from_wire_rejects_garbage() {
        let result = WorkItemEnvelope::<String>::from_wire("not valid json {{{");
        assert!(result.is_err());
    }

    #[test]
    fn test_id_generator_is_monotonic_and_unique() {
        let ids = EnvelopeIdGenerator::new();
        let first = u64::from_str_radix(&ids.next_id(), 16).expect("hex id");
        let second = u64::from_str_radix(&ids.next_id(), 16).expect("hex id");
        assert_eq!(second, first.wrapping_add(1));

        let mut seen = std::collections::HashSet::new();
        for _ in 0..1000 {
            assert!(seen.insert(ids.next_id()));
        }
    }

    #[test]
    fn test_age_is_non_negative_for_fresh_envelope() {
        let envelope = WorkItemEnvelope::new("id".to_string(), 42u32);
        assert!(envelope.age() >= chrono::Duration::zero());
    }
}
