//! # Work Queue Processor
//!
//! Durable background work-queue engine. Producers call [`WorkQueueProcessor::submit`],
//! which persists an envelope to the backing store and signals a single
//! background worker. The worker peeks the head envelope, invokes the
//! caller-supplied [`ItemProcessor`], and applies retry/discard/removal
//! policy. Ordering is strict FIFO: a retrying head item blocks everything
//! behind it until it resolves.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐  submit()   ┌──────────────┐  peek/remove  ┌──────────────┐
//! │ Producers │────────────▶│ BackingStore │◀──────────────│ Worker task  │
//! │ (many)    │  append     │ (durable     │               │ (exactly one)│
//! └───────────┘             │  FIFO log)   │               └──────┬───────┘
//!       │                   └──────────────┘                      │
//!       │ work-pending flag + Notify                              ▼
//!       └──────────────────────────────────────────────▶ ItemProcessor::process
//! ```
//!
//! Delivery is at-least-once: a crash between processing and head removal
//! re-delivers the item to the next processor instance, so callbacks must be
//! retry-idempotent.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use workqueue_core::{
//!     ItemProcessor, MemoryStore, ProcessResult, WorkQueueProcessor, WorkQueueSettings,
//! };
//!
//! struct AuditWriter;
//!
//! #[async_trait]
//! impl ItemProcessor<String> for AuditWriter {
//!     async fn process(&self, item: &String) -> ProcessResult {
//!         println!("writing audit record: {item}");
//!         ProcessResult::Success
//!     }
//!
//!     fn debug_string(&self, item: &String) -> String {
//!         item.clone()
//!     }
//! }
//!
//! # async fn example() -> anyhow::Result<()> {
//! let processor = WorkQueueProcessor::new(
//!     "audit",
//!     Arc::new(MemoryStore::new()),
//!     WorkQueueSettings::default(),
//!     Arc::new(AuditWriter),
//! );
//! processor.submit("user 42 logged in".to_string()).await?;
//! processor.close().await;
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::WorkQueueSettings;
use crate::envelope::{EnvelopeIdGenerator, WorkItemEnvelope};
use crate::error::{Result, WorkQueueError};
use crate::store::BackingStore;

/// Three-way outcome of processing one work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessResult {
    /// The item is done; remove it and continue.
    Success,
    /// Terminal failure; log, remove, never retry.
    Failed,
    /// Transient failure; leave the item at the head and re-attempt after
    /// the retry interval.
    Retry,
}

/// Caller-supplied processing callback for one work queue.
///
/// `process` is invoked repeatedly for an item that keeps returning
/// [`ProcessResult::Retry`], so implementations must be retry-idempotent and
/// must not block indefinitely.
#[async_trait::async_trait]
pub trait ItemProcessor<T>: Send + Sync {
    /// Process one deserialized work item.
    async fn process(&self, item: &T) -> ProcessResult;

    /// Human-readable rendering of an item for logs and error messages.
    fn debug_string(&self, item: &T) -> String;
}

/// Serializable snapshot of queue state for health endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct QueueHealth {
    /// Logical queue name.
    pub name: String,
    /// Envelopes currently in the backing store.
    pub queue_size: usize,
    /// Age of the eldest-item watermark, if any item was ever submitted.
    #[serde(serialize_with = "serialize_age_ms")]
    pub eldest_item_age: Option<Duration>,
    /// Whether shutdown has begun.
    pub closed: bool,
}

fn serialize_age_ms<S: Serializer>(
    age: &Option<Duration>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match age {
        Some(age) => serializer.serialize_some(&(age.as_millis() as u64)),
        None => serializer.serialize_none(),
    }
}

/// State shared between producers and the worker task.
#[derive(Debug)]
struct WorkerShared {
    /// Set once shutdown begins; checked by submit and the worker loop.
    closed: AtomicBool,
    /// Set before signaling, cleared only when the worker observes it.
    /// Closes the lost-wakeup race around the idle wait.
    work_pending: AtomicBool,
    /// Coalescing wake signal for new work and shutdown.
    wake: Notify,
    /// Serializes the length check and tail append across producers so the
    /// queue cannot overshoot `max_events`.
    submit_lock: parking_lot::Mutex<()>,
    /// Timestamp watermark recorded at each successful submit.
    eldest_item: parking_lot::Mutex<Option<DateTime<Utc>>>,
}

/// Durable background work-queue processor.
///
/// One instance owns one backing store and one worker task. The worker is
/// the only consumer of the store's head; any number of producers may call
/// [`submit`](Self::submit) concurrently. Destroy the instance with
/// [`close`](Self::close); items left in the store afterwards are picked up
/// by the next processor opened against the same store.
pub struct WorkQueueProcessor<T> {
    name: String,
    settings: WorkQueueSettings,
    store: Arc<dyn BackingStore>,
    processor: Arc<dyn ItemProcessor<T>>,
    shared: Arc<WorkerShared>,
    ids: EnvelopeIdGenerator,
    worker_handle: parking_lot::Mutex<Option<JoinHandle<usize>>>,
}

impl<T> WorkQueueProcessor<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Create a processor bound to `store` and `processor`, and immediately
    /// start its worker task. Any backlog already in the store is resumed.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        name: impl Into<String>,
        store: Arc<dyn BackingStore>,
        settings: WorkQueueSettings,
        processor: Arc<dyn ItemProcessor<T>>,
    ) -> Self {
        let name = name.into();
        let shared = Arc::new(WorkerShared {
            closed: AtomicBool::new(false),
            work_pending: AtomicBool::new(false),
            wake: Notify::new(),
            submit_lock: parking_lot::Mutex::new(()),
            eldest_item: parking_lot::Mutex::new(None),
        });

        let worker = Worker {
            name: name.clone(),
            settings: settings.clone(),
            store: Arc::clone(&store),
            processor: Arc::clone(&processor),
            shared: Arc::clone(&shared),
        };

        let backlog = store.len();
        info!(
            queue = %name,
            backlog,
            max_events = settings.max_events,
            "work queue processor starting"
        );

        let worker_handle = parking_lot::Mutex::new(Some(tokio::spawn(worker.run())));

        Self {
            name,
            settings,
            store,
            processor,
            shared,
            ids: EnvelopeIdGenerator::new(),
            worker_handle,
        }
    }

    /// Submit a work item for background processing.
    ///
    /// Serializes the item into an envelope and appends it to the tail of
    /// the backing store. While the queue is saturated the call sleeps and
    /// retries, up to `max_submit_wait_time`; past the deadline it fails
    /// with [`WorkQueueError::Saturated`]. Fails fast with
    /// [`WorkQueueError::Closed`] once shutdown has begun.
    pub async fn submit(&self, item: T) -> Result<()> {
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(WorkQueueError::Closed {
                name: self.name.clone(),
                item: self.processor.debug_string(&item),
            });
        }

        let envelope = WorkItemEnvelope::new(self.ids.next_id(), item);
        let raw = envelope.to_wire()?;
        let started = tokio::time::Instant::now();

        loop {
            if self.shared.closed.load(Ordering::Acquire) {
                return Err(WorkQueueError::Closed {
                    name: self.name.clone(),
                    item: self.processor.debug_string(&envelope.payload),
                });
            }

            let appended = {
                let _guard = self.shared.submit_lock.lock();
                self.store.len() < self.settings.max_events && self.store.append_to_tail(&raw)
            };
            if appended {
                break;
            }

            if started.elapsed() >= self.settings.max_submit_wait_time {
                warn!(
                    queue = %self.name,
                    item_id = %envelope.id,
                    queue_size = self.store.len(),
                    "queue saturated past submit deadline, rejecting item"
                );
                return Err(WorkQueueError::Saturated {
                    name: self.name.clone(),
                    item: self.processor.debug_string(&envelope.payload),
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }

            tokio::time::sleep(self.settings.submit_poll_interval).await;
        }

        *self.shared.eldest_item.lock() = Some(envelope.submitted_at);

        debug!(
            queue = %self.name,
            item_id = %envelope.id,
            queue_size = self.store.len(),
            "item submitted"
        );

        // Flag first, then signal: the worker clears the flag only after
        // observing it, so a wakeup racing the idle wait is never lost.
        self.shared.work_pending.store(true, Ordering::Release);
        self.shared.wake.notify_one();
        Ok(())
    }

    /// Begin shutdown and wait up to `max_shutdown_wait_time` for the worker
    /// to drain and exit.
    ///
    /// Never fails: items the worker could not drain before the deadline
    /// stay durably queued for the next processor instance, and a summary is
    /// logged.
    pub async fn close(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        info!(queue = %self.name, "work queue processor closing");
        self.shared.wake.notify_waiters();
        // notify_waiters leaves no permit behind; store one so a worker that
        // has not reached its wait yet still wakes.
        self.shared.wake.notify_one();

        let handle = self.worker_handle.lock().take();
        let Some(handle) = handle else {
            return;
        };

        match tokio::time::timeout(self.settings.max_shutdown_wait_time, handle).await {
            Ok(Ok(remaining)) if remaining == 0 => {
                info!(queue = %self.name, "work queue drained and closed");
            }
            Ok(Ok(remaining)) => {
                info!(
                    queue = %self.name,
                    remaining,
                    "work queue closed with unprocessed items left durably queued"
                );
            }
            Ok(Err(join_error)) => {
                error!(queue = %self.name, error = %join_error, "work queue worker task failed");
            }
            Err(_) => {
                warn!(
                    queue = %self.name,
                    remaining = self.store.len(),
                    "worker did not exit before shutdown deadline, backlog remains durable"
                );
            }
        }
    }

    /// Number of envelopes currently queued.
    pub fn queue_size(&self) -> usize {
        self.store.len()
    }

    /// Whether shutdown has begun.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Age of the eldest-item watermark recorded at submit time.
    pub fn eldest_item_age(&self) -> Option<Duration> {
        let watermark = (*self.shared.eldest_item.lock())?;
        (Utc::now() - watermark).to_std().ok()
    }

    /// Snapshot of queue state for health reporting.
    pub fn health(&self) -> QueueHealth {
        QueueHealth {
            name: self.name.clone(),
            queue_size: self.queue_size(),
            eldest_item_age: self.eldest_item_age(),
            closed: self.is_closed(),
        }
    }
}

impl<T> Drop for WorkQueueProcessor<T> {
    fn drop(&mut self) {
        // A processor dropped without close() must not strand its worker in
        // an idle wait.
        if !self.shared.closed.swap(true, Ordering::AcqRel) {
            self.shared.wake.notify_waiters();
            self.shared.wake.notify_one();
        }
    }
}

/// Outcome of handling the current head envelope.
enum HeadOutcome {
    /// Head was removed (or never existed); move on to the next item.
    Advance,
    /// Head stays in place; re-attempt after the retry interval.
    RetryLater,
}

/// The single background consumer of a work queue.
struct Worker<T> {
    name: String,
    settings: WorkQueueSettings,
    store: Arc<dyn BackingStore>,
    processor: Arc<dyn ItemProcessor<T>>,
    shared: Arc<WorkerShared>,
}

impl<T> Worker<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Main worker loop. Returns the number of envelopes left unprocessed.
    async fn run(self) -> usize {
        debug!(queue = %self.name, "worker task started");

        while !self.shared.closed.load(Ordering::Acquire) {
            match self.store.peek_head() {
                Some(raw) => match self.handle_head(&raw).await {
                    HeadOutcome::Advance => {}
                    HeadOutcome::RetryLater => {
                        if !self.wait_for_retry_window().await {
                            break;
                        }
                    }
                },
                None => self.wait_for_work().await,
            }
        }

        self.drain().await;

        let remaining = self.store.len();
        if remaining > 0 {
            info!(
                queue = %self.name,
                remaining,
                "worker exiting with backlog, items will resume with the next processor"
            );
        } else {
            debug!(queue = %self.name, "worker exiting with empty queue");
        }
        remaining
    }

    /// Best-effort shutdown drain: loop tightly (no idle waits) until the
    /// store empties, the head requests a retry, or the deadline passes.
    async fn drain(&self) {
        let deadline = tokio::time::Instant::now() + self.settings.max_shutdown_wait_time;

        while tokio::time::Instant::now() < deadline {
            let Some(raw) = self.store.peek_head() else {
                break;
            };
            match self.handle_head(&raw).await {
                HeadOutcome::Advance => {}
                HeadOutcome::RetryLater => {
                    // A retry needs a waiting period the shutdown window
                    // cannot afford; stop draining and leave the backlog.
                    debug!(queue = %self.name, "head item requested retry during shutdown, halting drain");
                    break;
                }
            }
        }
    }

    /// Handle the envelope currently at the head of the store.
    async fn handle_head(&self, raw: &str) -> HeadOutcome {
        let envelope = match WorkItemEnvelope::<T>::from_wire(raw) {
            Ok(envelope) => envelope,
            Err(err) => {
                // Corrupt entries must never block the queue.
                warn!(queue = %self.name, error = %err, "removing corrupt envelope at queue head");
                self.store.remove_head();
                return HeadOutcome::Advance;
            }
        };

        let age = envelope.age().to_std().unwrap_or_default();
        if age > self.settings.retry_discard_age {
            warn!(
                queue = %self.name,
                item_id = %envelope.id,
                age_secs = age.as_secs(),
                item = %self.processor.debug_string(&envelope.payload),
                "discarding stale item without processing"
            );
            self.store.remove_head();
            return HeadOutcome::Advance;
        }

        let result = AssertUnwindSafe(self.processor.process(&envelope.payload))
            .catch_unwind()
            .await;

        match result {
            Ok(ProcessResult::Success) => {
                debug!(queue = %self.name, item_id = %envelope.id, "item processed");
                self.store.remove_head();
                HeadOutcome::Advance
            }
            Ok(ProcessResult::Failed) => {
                error!(
                    queue = %self.name,
                    item_id = %envelope.id,
                    item = %self.processor.debug_string(&envelope.payload),
                    "item processing failed permanently, discarding"
                );
                self.store.remove_head();
                HeadOutcome::Advance
            }
            Ok(ProcessResult::Retry) => {
                debug!(
                    queue = %self.name,
                    item_id = %envelope.id,
                    retry_in_ms = self.settings.retry_interval.as_millis() as u64,
                    "item requested retry, holding at queue head"
                );
                HeadOutcome::RetryLater
            }
            Err(_panic) => {
                // Fail open: a panicking callback must not wedge the worker.
                error!(
                    queue = %self.name,
                    item_id = %envelope.id,
                    item = %self.processor.debug_string(&envelope.payload),
                    "processing callback panicked, discarding head item"
                );
                self.store.remove_head();
                HeadOutcome::Advance
            }
        }
    }

    /// Park until the retry wakeup time, interruptible by shutdown.
    /// Returns `false` when shutdown was observed during the wait.
    async fn wait_for_retry_window(&self) -> bool {
        let wakeup = tokio::time::Instant::now() + self.settings.retry_interval;
        loop {
            if self.shared.closed.load(Ordering::Acquire) {
                return false;
            }
            tokio::select! {
                _ = tokio::time::sleep_until(wakeup) => return true,
                // New-work signals do not shorten the retry window; the
                // retrying head still blocks everything behind it.
                _ = self.shared.wake.notified() => {}
            }
        }
    }

    /// Non-busy wait for a work signal. Returns immediately when a signal
    /// arrived while the worker was processing.
    async fn wait_for_work(&self) {
        if self.shared.work_pending.swap(false, Ordering::AcqRel) {
            return;
        }
        self.shared.wake.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    struct CountingProcessor;

    #[async_trait::async_trait]
    impl ItemProcessor<String> for CountingProcessor {
        async fn process(&self, _item: &String) -> ProcessResult {
            ProcessResult::Success
        }

        fn debug_string(&self, item: &String) -> String {
            item.clone()
        }
    }

    #[tokio::test]
    async fn test_health_snapshot_fields() {
        let processor = WorkQueueProcessor::new(
            "health-test",
            Arc::new(MemoryStore::new()),
            WorkQueueSettings::default(),
            Arc::new(CountingProcessor),
        );

        let health = processor.health();
        assert_eq!(health.name, "health-test");
        assert!(!health.closed);
        assert!(health.eldest_item_age.is_none());

        processor.submit("item".to_string()).await.expect("submit");
        assert!(processor.eldest_item_age().is_some());

        processor.close().await;
        assert!(processor.is_closed());
    }

    #[tokio::test]
    async fn test_health_serializes_to_json() {
        let health = QueueHealth {
            name: "q".to_string(),
            queue_size: 3,
            eldest_item_age: Some(Duration::from_millis(1500)),
            closed: false,
        };
        let json = serde_json::to_value(&health).expect("serialize health");
        assert_eq!(json["queue_size"], 3);
        assert_eq!(json["eldest_item_age"], 1500);
        assert_eq!(json["closed"], false);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let processor = WorkQueueProcessor::new(
            "close-twice",
            Arc::new(MemoryStore::new()),
            WorkQueueSettings::default(),
            Arc::new(CountingProcessor),
        );
        processor.close().await;
        processor.close().await;
        assert!(processor.is_closed());
    }
}
