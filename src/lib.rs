#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Workqueue Core
//!
//! Durable background work-queue processor with an adaptive transaction-size
//! controller, for decoupling request-time work (auditing, notification,
//! directory-write side effects) from slow or unreliable downstream systems.
//!
//! ## Overview
//!
//! A [`WorkQueueProcessor`] accepts submissions from any number of producer
//! tasks, persists each item as an envelope in a caller-supplied
//! [`BackingStore`], and drives exactly one background worker that dequeues
//! items in strict FIFO order and hands them to a caller-supplied
//! [`ItemProcessor`]. The worker applies retry, stale-discard, and
//! fail-open policy so that no single item can wedge the queue, while the
//! durable store guarantees the backlog survives process restarts.
//!
//! The companion [`TransactionSizeCalculator`] tunes how many work units a
//! batch-oriented consumer should process per transaction, trading
//! throughput against a target latency with an AIMD-like control law.
//!
//! ## Guarantees
//!
//! - **At-least-once delivery**: the head envelope is only removed after its
//!   processing outcome is known; callbacks must be retry-idempotent.
//! - **Strict FIFO**: items are processed in submission order; a retrying
//!   head item blocks everything behind it until it resolves.
//! - **Single consumer**: exactly one worker task per processor instance
//!   ever removes from the store's head.
//! - **Backpressure**: producers block (bounded) and then fail explicitly
//!   when the queue is saturated, instead of growing it without bound.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use workqueue_core::{
//!     ItemProcessor, MemoryStore, ProcessResult, WorkQueueProcessor, WorkQueueSettings,
//! };
//!
//! struct EmailSender;
//!
//! #[async_trait]
//! impl ItemProcessor<String> for EmailSender {
//!     async fn process(&self, address: &String) -> ProcessResult {
//!         match send_email(address).await {
//!             Ok(()) => ProcessResult::Success,
//!             Err(e) if e.is_transient() => ProcessResult::Retry,
//!             Err(_) => ProcessResult::Failed,
//!         }
//!     }
//!
//!     fn debug_string(&self, address: &String) -> String {
//!         format!("email to {address}")
//!     }
//! }
//! # struct SendError; impl SendError { fn is_transient(&self) -> bool { true } }
//! # async fn send_email(_: &str) -> Result<(), SendError> { Ok(()) }
//!
//! # async fn example() -> anyhow::Result<()> {
//! let queue = WorkQueueProcessor::new(
//!     "email",
//!     Arc::new(MemoryStore::new()),
//!     WorkQueueSettings::default(),
//!     Arc::new(EmailSender),
//! );
//!
//! queue.submit("user@example.com".to_string()).await?;
//! queue.close().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`processor`] - the work-queue engine: submit, worker loop, shutdown
//! - [`store`] - the durable backing-store contract and in-memory reference
//! - [`envelope`] - the persisted item envelope and id generation
//! - [`transaction_size`] - the adaptive batch-size controller
//! - [`config`] - immutable settings for both components
//! - [`error`] - structured error handling
//! - [`logging`] - optional structured logging setup

pub mod config;
pub mod envelope;
pub mod error;
pub mod logging;
pub mod processor;
pub mod store;
pub mod transaction_size;

pub use config::{TransactionSizeConfig, WorkQueueSettings};
pub use envelope::{EnvelopeIdGenerator, WorkItemEnvelope};
pub use error::{Result, WorkQueueError};
pub use processor::{ItemProcessor, ProcessResult, QueueHealth, WorkQueueProcessor};
pub use store::{BackingStore, MemoryStore};
pub use transaction_size::TransactionSizeCalculator;
