use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Delivery, MailTransport};
use crate::{EmailContent, TransportError, TransportResult};

/// Transport that keeps delivered mail in memory
///
/// Failures can be scripted for the next N sends or for every send, which
/// makes it the stand-in for a real mail server in tests and local runs.
#[derive(Default)]
pub struct MemoryTransport {
    delivered: Mutex<Vec<EmailContent>>,
    attempts: AtomicU64,
    fail_next: AtomicU32,
    fail_always: AtomicBool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` sends
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Fail every send until switched off
    pub fn fail_always(&self, fail: bool) {
        self.fail_always.store(fail, Ordering::SeqCst);
    }

    /// Messages accepted so far, in send order
    pub fn delivered(&self) -> Vec<EmailContent> {
        self.delivered.lock().clone()
    }

    /// Number of send calls, successful or not
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    fn should_fail(&self) -> bool {
        if self.fail_always.load(Ordering::SeqCst) {
            return true;
        }
        self.fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl MailTransport for MemoryTransport {
    async fn send(&self, email: &EmailContent) -> TransportResult<Delivery> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        if self.should_fail() {
            return Err(TransportError::connection(format!(
                "scripted failure on attempt {attempt}"
            )));
        }

        self.delivered.lock().push(email.clone());
        Ok(Delivery {
            message_id: Some(format!("memory-{attempt}")),
        })
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
