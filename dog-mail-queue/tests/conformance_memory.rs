#![cfg(feature = "memory")]

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Utc};

use dog_mail_queue::{
    store::{memory::MemoryStore, OrderedStore},
    EmailCategory, EmailContent, EmailJob, EmailMessage, Priority, StoreError,
};

/// Test factory functions
fn create_test_job(priority: i64) -> EmailJob {
    let message = EmailMessage::new(
        EmailContent::new("reviewer@example.com", "New review", "<p>Review</p>", "Review"),
        EmailCategory::ReviewAssignment,
    )
    .with_priority(priority);
    EmailJob::from_message(message, Priority::NORMAL, 3)
}

async fn insert_at_priority(store: &dyn OrderedStore, priority: i64) -> EmailJob {
    let job = create_test_job(priority);
    store.insert(job.clone(), priority).await.unwrap();
    job
}

/// A1. Pop Returns Highest Score First
#[tokio::test]
async fn test_pop_returns_highest_score_first() {
    let store = MemoryStore::new();

    // Arrange: scores 3, 9, 1
    let three = insert_at_priority(&store, 3).await;
    let nine = insert_at_priority(&store, 9).await;
    let one = insert_at_priority(&store, 1).await;

    // Act + Assert: one at a time, descending
    assert_eq!(store.pop_highest(1).await.unwrap()[0].id, nine.id);
    assert_eq!(store.pop_highest(1).await.unwrap()[0].id, three.id);
    assert_eq!(store.pop_highest(1).await.unwrap()[0].id, one.id);
    assert!(store.pop_highest(1).await.unwrap().is_empty());
}

/// A2. Equal Scores Pop In Insertion Order
#[tokio::test]
async fn test_equal_scores_pop_fifo() {
    let store = MemoryStore::new();

    let mut inserted = Vec::new();
    for _ in 0..5 {
        inserted.push(insert_at_priority(&store, 5).await.id);
    }

    let popped: Vec<_> = store
        .pop_highest(5)
        .await
        .unwrap()
        .into_iter()
        .map(|job| job.id)
        .collect();
    assert_eq!(popped, inserted);
}

/// A3. Batch Pop Honours Limit And Order
#[tokio::test]
async fn test_batch_pop_limit() {
    let store = MemoryStore::new();
    for priority in [1, 10, 7, 5] {
        insert_at_priority(&store, priority).await;
    }

    let batch = store.pop_highest(2).await.unwrap();
    let priorities: Vec<_> = batch.iter().map(|job| job.priority.value()).collect();
    assert_eq!(priorities, vec![10, 7]);
    assert_eq!(store.count().await.unwrap(), 2);
}

/// A4. Count Tracks Inserts And Pops
#[tokio::test]
async fn test_count_tracks_contents() {
    let store = MemoryStore::new();
    assert_eq!(store.count().await.unwrap(), 0);

    insert_at_priority(&store, 5).await;
    insert_at_priority(&store, 5).await;
    assert_eq!(store.count().await.unwrap(), 2);

    store.pop_highest(1).await.unwrap();
    assert_eq!(store.count().await.unwrap(), 1);
}

/// A5. Duplicate Ids Are Rejected
#[tokio::test]
async fn test_duplicate_insert_rejected() {
    let store = MemoryStore::new();
    let job = insert_at_priority(&store, 5).await;

    let err = store.insert(job.clone(), 5).await.unwrap_err();
    assert_eq!(err, StoreError::DuplicateJob(job.id.clone()));
    assert_eq!(store.count().await.unwrap(), 1);
}

/// A6. Popped Jobs May Be Re-Inserted
#[tokio::test]
async fn test_reinsert_after_pop() {
    let store = MemoryStore::new();
    let job = insert_at_priority(&store, 5).await;

    let popped = store.pop_highest(1).await.unwrap().remove(0);
    store.insert(popped, 4).await.unwrap();

    assert!(store.contains(&job.id));
}

/// B1. Scheduled Jobs Stay Out Of The Ready Set Until Promoted
#[tokio::test]
async fn test_schedule_and_promote() {
    let store = MemoryStore::new();
    let now = Utc::now();

    let mut due = create_test_job(7);
    due.scheduled_at = Some(now + Duration::seconds(1));
    let mut later = create_test_job(9);
    later.scheduled_at = Some(now + Duration::minutes(5));

    store.schedule(due.clone()).await.unwrap();
    store.schedule(later.clone()).await.unwrap();
    assert_eq!(store.count().await.unwrap(), 0);
    assert_eq!(store.count_delayed().await.unwrap(), 2);

    let promoted = store
        .promote_due(now + Duration::seconds(2), 100)
        .await
        .unwrap();
    assert_eq!(promoted, 1);

    let ready = store.pop_highest(10).await.unwrap();
    assert_eq!(ready.len(), 1);
    assert_eq!(ready[0].id, due.id);
    assert_eq!(store.count_delayed().await.unwrap(), 1);
}

/// C1. Outage Fails Every Operation Fast
#[tokio::test]
async fn test_outage_fails_fast() {
    let store = MemoryStore::new();
    insert_at_priority(&store, 5).await;
    store.simulate_outage(true);

    assert!(store.insert(create_test_job(5), 5).await.unwrap_err().is_unavailable());
    assert!(store.pop_highest(1).await.unwrap_err().is_unavailable());
    assert!(store.count().await.unwrap_err().is_unavailable());
    assert!(store.promote_due(Utc::now(), 1).await.unwrap_err().is_unavailable());

    store.simulate_outage(false);
    assert_eq!(store.count().await.unwrap(), 1);
}

/// D1. Concurrent Pops Never Return The Same Job Twice
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_pops_are_disjoint() {
    let store = Arc::new(MemoryStore::new());
    for i in 0..200 {
        insert_at_priority(store.as_ref(), i % 10).await;
    }

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let mut seen = Vec::new();
            loop {
                let batch = store.pop_highest(3).await.unwrap();
                if batch.is_empty() {
                    break;
                }
                seen.extend(batch.into_iter().map(|job| job.id));
            }
            seen
        }));
    }

    let mut all = Vec::new();
    for handle in handles {
        all.extend(handle.await.unwrap());
    }
    let unique: HashSet<_> = all.iter().cloned().collect();
    assert_eq!(all.len(), 200);
    assert_eq!(unique.len(), 200);
}
