#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "redis")]
pub mod redis;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{EmailJob, StoreCapabilities, StoreResult};

/// Ordered store contract: the only shared state between queue instances
///
/// `pop_highest` must be atomic: it is what keeps two pollers from claiming
/// the same job. Every operation fails fast when the store cannot be reached.
#[async_trait]
pub trait OrderedStore: Send + Sync {
    /// Insert a job with the given score. Job ids must be unique in the store.
    async fn insert(&self, job: EmailJob, score: i64) -> StoreResult<()>;

    /// Atomically remove and return up to `n` jobs with the highest scores
    async fn pop_highest(&self, n: usize) -> StoreResult<Vec<EmailJob>>;

    /// Number of ready jobs (approximate is acceptable)
    async fn count(&self) -> StoreResult<u64>;

    /// Park a job that is not due yet.
    ///
    /// Stores without a delayed segment keep it in the ready set at its
    /// priority; the poller then re-queues it on every claim until it is due.
    async fn schedule(&self, job: EmailJob) -> StoreResult<()> {
        let score = job.priority.value();
        self.insert(job, score).await
    }

    /// Move up to `limit` delayed jobs that are due at `now` into the ready set
    async fn promote_due(&self, _now: DateTime<Utc>, _limit: usize) -> StoreResult<usize> {
        Ok(0)
    }

    /// Number of parked jobs
    async fn count_delayed(&self) -> StoreResult<u64> {
        Ok(0)
    }

    /// Get store capabilities
    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities::minimal()
    }

    /// Store name for logs
    fn name(&self) -> &'static str;
}
