//! # Backing Store Contract
//!
//! The durable, ordered sequence of serialized envelopes behind a work queue.
//! The processor treats the store as an opaque FIFO log: producers append at
//! the tail, the single worker peeks and removes at the head. Durability
//! across restarts is the store implementation's responsibility; the
//! processor only requires the four operations below.
//!
//! Access discipline: one writer at the tail (serialized by the processor's
//! submit path), one reader/remover at the head (the worker). Implementations
//! still need internal synchronization because appends and head removals may
//! happen concurrently.
//!
//! [`MemoryStore`] is the in-process reference implementation, used by the
//! test suite and suitable for embedders that do not need the backlog to
//! survive restarts.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;

/// Ordered, persistent double-ended sequence of serialized envelopes.
pub trait BackingStore: Send + Sync + fmt::Debug {
    /// Append a serialized envelope at the tail. Returns `false` when the
    /// store is full and the envelope was not stored.
    fn append_to_tail(&self, raw: &str) -> bool;

    /// Read the head envelope without removing it.
    fn peek_head(&self) -> Option<String>;

    /// Remove the head envelope. A no-op on an empty store.
    fn remove_head(&self);

    /// Number of envelopes currently stored.
    fn len(&self) -> usize;

    /// Whether the store holds no envelopes.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory [`BackingStore`] backed by a mutex-guarded `VecDeque`.
///
/// Not durable across restarts. An optional capacity makes `append_to_tail`
/// report "full", which exercises the processor's backpressure path.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<VecDeque<String>>,
    capacity: Option<usize>,
}

impl MemoryStore {
    /// Create an unbounded in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that reports "full" at `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: Some(capacity),
        }
    }
}

impl BackingStore for MemoryStore {
    fn append_to_tail(&self, raw: &str) -> bool {
        let mut entries = self.entries.lock();
        if let Some(capacity) = self.capacity {
            if entries.len() >= capacity {
                return false;
            }
        }
        entries.push_back(raw.to_string());
        true
    }

    fn peek_head(&self) -> Option<String> {
        self.entries.lock().front().cloned()
    }

    fn remove_head(&self) {
        self.entries.lock().pop_front();
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}
