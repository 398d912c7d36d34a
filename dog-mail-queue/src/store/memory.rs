use std::cmp::Reverse;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::trace;

use crate::{
    store::OrderedStore, EmailJob, JobId, StoreCapabilities, StoreError, StoreResult,
};

/// Ready set key: highest score last, FIFO within a score
type ReadyKey = (i64, Reverse<u64>);

#[derive(Default)]
struct Segments {
    ready: BTreeMap<ReadyKey, EmailJob>,
    delayed: BTreeMap<(DateTime<Utc>, u64), EmailJob>,
    ids: HashSet<JobId>,
    seq: u64,
}

impl Segments {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn claim_id(&mut self, id: &JobId) -> StoreResult<()> {
        if !self.ids.insert(id.clone()) {
            return Err(StoreError::DuplicateJob(id.clone()));
        }
        Ok(())
    }

    fn push_ready(&mut self, job: EmailJob, score: i64) {
        let seq = self.next_seq();
        self.ready.insert((score, Reverse(seq)), job);
    }
}

/// In-memory ordered store for tests, development and single-process setups
///
/// One mutex guards both segments, so pops and promotions are atomic with
/// respect to every other caller sharing the store.
pub struct MemoryStore {
    segments: Mutex<Segments>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            segments: Mutex::new(Segments::default()),
            offline: AtomicBool::new(false),
        }
    }

    /// Make every operation fail with `StoreError::Unavailable` (for testing)
    pub fn simulate_outage(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Ready jobs in pop order followed by delayed jobs in due order (for inspection)
    pub fn snapshot(&self) -> (Vec<EmailJob>, Vec<EmailJob>) {
        let segments = self.segments.lock();
        let ready = segments.ready.values().rev().cloned().collect();
        let delayed = segments.delayed.values().cloned().collect();
        (ready, delayed)
    }

    /// Check if a job id is currently stored in either segment
    pub fn contains(&self, id: &JobId) -> bool {
        self.segments.lock().ids.contains(id)
    }

    fn ensure_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("memory store offline"));
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderedStore for MemoryStore {
    async fn insert(&self, job: EmailJob, score: i64) -> StoreResult<()> {
        self.ensure_online()?;
        let mut segments = self.segments.lock();
        segments.claim_id(&job.id)?;
        trace!(job_id = %job.id, score, "Inserted job into ready set");
        segments.push_ready(job, score);
        Ok(())
    }

    async fn pop_highest(&self, n: usize) -> StoreResult<Vec<EmailJob>> {
        self.ensure_online()?;
        let mut segments = self.segments.lock();
        let mut claimed = Vec::with_capacity(n.min(segments.ready.len()));

        while claimed.len() < n {
            let Some((_, job)) = segments.ready.pop_last() else {
                break;
            };
            segments.ids.remove(&job.id);
            claimed.push(job);
        }

        Ok(claimed)
    }

    async fn count(&self) -> StoreResult<u64> {
        self.ensure_online()?;
        Ok(self.segments.lock().ready.len() as u64)
    }

    async fn schedule(&self, job: EmailJob) -> StoreResult<()> {
        self.ensure_online()?;
        let now = Utc::now();
        let mut segments = self.segments.lock();
        segments.claim_id(&job.id)?;

        match job.scheduled_at {
            Some(due) if due > now => {
                let seq = segments.next_seq();
                trace!(job_id = %job.id, %due, "Parked job in delayed set");
                segments.delayed.insert((due, seq), job);
            }
            _ => {
                let score = job.priority.value();
                segments.push_ready(job, score);
            }
        }
        Ok(())
    }

    async fn promote_due(&self, now: DateTime<Utc>, limit: usize) -> StoreResult<usize> {
        self.ensure_online()?;
        let mut segments = self.segments.lock();
        let mut promoted = 0;

        while promoted < limit {
            let due = matches!(segments.delayed.first_key_value(), Some(((at, _), _)) if *at <= now);
            if !due {
                break;
            }
            let Some((_, job)) = segments.delayed.pop_first() else {
                break;
            };
            let score = job.priority.value();
            segments.push_ready(job, score);
            promoted += 1;
        }

        Ok(promoted)
    }

    async fn count_delayed(&self) -> StoreResult<u64> {
        self.ensure_online()?;
        Ok(self.segments.lock().delayed.len() as u64)
    }

    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities {
            delayed_segment: true,
            shared: false,
            durable: false,
        }
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EmailCategory, EmailContent, EmailMessage, Priority};

    fn job(priority: i64) -> EmailJob {
        let message = EmailMessage::new(
            EmailContent::new("bob@example.com", "Reminder", "<p>r</p>", "r"),
            EmailCategory::Reminder,
        )
        .with_priority(priority);
        EmailJob::from_message(message, Priority::NORMAL, 3)
    }

    #[tokio::test]
    async fn test_fifo_within_same_score() {
        let store = MemoryStore::new();
        let first = job(5);
        let second = job(5);

        store.insert(first.clone(), 5).await.unwrap();
        store.insert(second.clone(), 5).await.unwrap();

        let popped = store.pop_highest(2).await.unwrap();
        assert_eq!(popped[0].id, first.id);
        assert_eq!(popped[1].id, second.id);
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let store = MemoryStore::new();
        let j = job(5);

        store.insert(j.clone(), 5).await.unwrap();
        let result = store.insert(j.clone(), 7).await;

        assert_eq!(result, Err(StoreError::DuplicateJob(j.id)));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_popped_id_can_be_reinserted() {
        let store = MemoryStore::new();
        let j = job(5);

        store.insert(j.clone(), 5).await.unwrap();
        let popped = store.pop_highest(1).await.unwrap().remove(0);
        assert!(!store.contains(&popped.id));

        store.insert(popped, 4).await.unwrap();
        assert!(store.contains(&j.id));
    }

    #[tokio::test]
    async fn test_schedule_parks_future_jobs_until_promoted() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let mut j = job(5);
        j.scheduled_at = Some(now + chrono::Duration::seconds(60));

        store.schedule(j.clone()).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
        assert_eq!(store.count_delayed().await.unwrap(), 1);
        assert!(store.pop_highest(1).await.unwrap().is_empty());

        assert_eq!(store.promote_due(now, 10).await.unwrap(), 0);
        let later = now + chrono::Duration::seconds(61);
        assert_eq!(store.promote_due(later, 10).await.unwrap(), 1);

        let popped = store.pop_highest(1).await.unwrap();
        assert_eq!(popped[0].id, j.id);
        assert_eq!(store.count_delayed().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_promote_respects_limit() {
        let store = MemoryStore::new();
        let past = Utc::now() - chrono::Duration::seconds(1);

        for _ in 0..3 {
            let mut j = job(5);
            j.scheduled_at = Some(Utc::now() + chrono::Duration::milliseconds(20));
            store.schedule(j).await.unwrap();
        }
        assert_eq!(store.promote_due(past, 10).await.unwrap(), 0);

        let later = Utc::now() + chrono::Duration::seconds(1);
        assert_eq!(store.promote_due(later, 2).await.unwrap(), 2);
        assert_eq!(store.count().await.unwrap(), 2);
        assert_eq!(store.count_delayed().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_outage_fails_every_operation() {
        let store = MemoryStore::new();
        store.insert(job(5), 5).await.unwrap();
        store.simulate_outage(true);

        assert!(store.insert(job(5), 5).await.unwrap_err().is_unavailable());
        assert!(store.pop_highest(1).await.unwrap_err().is_unavailable());
        assert!(store.count().await.unwrap_err().is_unavailable());
        assert!(store.promote_due(Utc::now(), 1).await.unwrap_err().is_unavailable());

        store.simulate_outage(false);
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
