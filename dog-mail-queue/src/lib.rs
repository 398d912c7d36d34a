//! # dog-mail-queue: Priority Mail Delivery for DogRS Services
//!
//! **Enqueue returns immediately; delivery happens in the background**
//!
//! Business code hands a composed email to [`MailQueue::enqueue`] and moves on.
//! The job lands in a shared ordered store, and a poller in every running
//! instance claims the highest-priority ready jobs and hands them to a
//! [`MailTransport`].
//!
//! ## Features
//!
//! - **Priority Ordering**: Highest priority first, FIFO within a priority
//! - **At-Most-One Claim**: Atomic pop keeps concurrent instances from double-sending
//! - **Retry With Backoff**: Failed jobs come back later at a lower priority
//! - **Store Fallback**: If the store is down, the message is sent directly
//! - **Pluggable Stores**: In-memory for tests, Redis sorted sets for production
//! - **Structured Observability**: Event streams, counters and `tracing` spans
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dog_mail_queue::prelude::*;
//! use dog_mail_queue::{store::memory::MemoryStore, transport::memory::MemoryTransport};
//!
//! # async fn run() -> QueueResult<()> {
//! let queue = MailQueue::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(MemoryTransport::new()),
//! );
//! queue.start()?;
//!
//! let message = EmailMessage::new(
//!     EmailContent::new("ada@example.com", "Verify your email", "<p>Hi</p>", "Hi"),
//!     EmailCategory::Verification,
//! )
//! .with_priority(Priority::CRITICAL);
//!
//! let job_id = queue.enqueue(message).await?;
//! # let _ = job_id;
//! queue.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod types;
pub mod error;
pub mod config;
pub mod retry;
pub mod store;
pub mod transport;
pub mod dispatcher;
pub mod queue;
pub mod observability;

// Core API exports
pub use queue::MailQueue;
pub use types::{
    JobId, EmailCategory, Priority, EmailContent, EmailMessage, EmailJob,
    StoreCapabilities, JobEvent
};
pub use error::{QueueError, QueueResult, StoreError, StoreResult, TransportError, TransportResult};
pub use config::MailQueueConfig;
pub use retry::{Backoff, RetryDecision, RetryPolicy};
pub use store::OrderedStore;
pub use transport::{Delivery, MailTransport, TransportAdapter};
pub use dispatcher::{Dispatcher, TickReport};

// Observability exports
pub use observability::{ObservabilityLayer, LiveMetrics, QueueStats};

// Store implementations
#[cfg(feature = "memory")]
pub use store::memory::MemoryStore;

#[cfg(feature = "redis")]
pub use store::redis::{RedisStore, RedisStoreConfig};

// Transport implementations
#[cfg(feature = "memory")]
pub use transport::memory::MemoryTransport;

#[cfg(feature = "smtp")]
pub use transport::smtp::{SmtpConfig, SmtpTransport};

#[cfg(feature = "tracing-basic")]
pub use observability::{init_tracing, LogFormat};

/// Everything a service needs to enqueue mail
pub mod prelude {
    // Core service and traits
    pub use crate::{MailQueue, MailQueueConfig, MailTransport, OrderedStore};

    // Essential types
    pub use crate::{
        EmailCategory, EmailContent, EmailMessage, JobId, Priority, QueueError, QueueResult
    };

    // Retry tuning
    pub use crate::{Backoff, RetryPolicy};

    // Observability
    pub use crate::{JobEvent, QueueStats};

    // Essential traits
    pub use async_trait::async_trait;
}
