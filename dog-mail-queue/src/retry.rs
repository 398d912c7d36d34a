use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::EmailJob;

/// How the delay grows with the attempt count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// `base * attempts`
    Linear,
    /// `base * 2^(attempts - 1)`
    Exponential,
}

impl std::str::FromStr for Backoff {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "linear" => Ok(Self::Linear),
            "exponential" => Ok(Self::Exponential),
            _ => Err(format!("Invalid backoff: {}", s)),
        }
    }
}

/// What happens to a job after a failed attempt
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// Re-insert with the updated attempt count, priority and schedule
    Retry(EmailJob),
    /// Attempt budget used up; drop the job
    Exhausted(EmailJob),
}

/// Backoff and priority decay applied to failed deliveries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub backoff: Backoff,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff: Backoff::Linear,
            base_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(3600), // 1 hour
        }
    }
}

impl RetryPolicy {
    /// Delay before the next try once `attempts` tries have failed
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let attempts = attempts.max(1);
        let delay = match self.backoff {
            Backoff::Linear => self.base_delay.saturating_mul(attempts),
            Backoff::Exponential => {
                let factor = 2u32.checked_pow(attempts - 1).unwrap_or(u32::MAX);
                self.base_delay.saturating_mul(factor)
            }
        };
        delay.min(self.max_delay)
    }

    /// Apply one failed attempt to `job`
    pub fn on_failure(&self, mut job: EmailJob, error: &str, now: DateTime<Utc>) -> RetryDecision {
        job.attempts = job.attempts.saturating_add(1);
        job.last_error = Some(error.to_string());

        if job.is_exhausted() {
            return RetryDecision::Exhausted(job);
        }

        let delay = chrono::Duration::from_std(self.delay_for(job.attempts))
            .unwrap_or_else(|_| chrono::Duration::seconds(self.max_delay.as_secs() as i64));
        job.scheduled_at = Some(now + delay);
        job.priority = job.priority.decremented();

        RetryDecision::Retry(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EmailCategory, EmailContent, EmailMessage, Priority};
    use proptest::prelude::*;

    fn job(priority: i64, max_attempts: u32) -> EmailJob {
        let message = EmailMessage::new(
            EmailContent::new("kim@example.com", "Payment failed", "<p>x</p>", "x"),
            EmailCategory::PaymentStatus,
        )
        .with_priority(priority)
        .with_max_attempts(max_attempts);
        EmailJob::from_message(message, Priority::NORMAL, 3)
    }

    #[test]
    fn test_linear_delay() {
        let policy = RetryPolicy {
            backoff: Backoff::Linear,
            base_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(25),
        };
        assert_eq!(policy.delay_for(1), Duration::from_secs(10));
        assert_eq!(policy.delay_for(2), Duration::from_secs(20));
        assert_eq!(policy.delay_for(3), Duration::from_secs(25));
    }

    #[test]
    fn test_exponential_delay() {
        let policy = RetryPolicy {
            backoff: Backoff::Exponential,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(3600),
        };
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(4), Duration::from_secs(8));
        assert_eq!(policy.delay_for(40), Duration::from_secs(3600));
    }

    #[test]
    fn test_retry_lowers_priority_and_schedules() {
        let now = Utc::now();
        let policy = RetryPolicy::default();

        match policy.on_failure(job(10, 2), "421 try later", now) {
            RetryDecision::Retry(job) => {
                assert_eq!(job.attempts, 1);
                assert_eq!(job.priority, Priority(9));
                assert_eq!(job.scheduled_at, Some(now + chrono::Duration::seconds(30)));
                assert_eq!(job.last_error.as_deref(), Some("421 try later"));
            }
            other => panic!("expected retry, got {other:?}"),
        }
    }

    #[test]
    fn test_last_attempt_exhausts() {
        let policy = RetryPolicy::default();
        let mut j = job(10, 3);
        j.attempts = 2;

        match policy.on_failure(j, "550 mailbox unavailable", Utc::now()) {
            RetryDecision::Exhausted(job) => assert_eq!(job.attempts, 3),
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[test]
    fn test_backoff_parses() {
        assert_eq!("Exponential".parse::<Backoff>().unwrap(), Backoff::Exponential);
        assert!("fibonacci".parse::<Backoff>().is_err());
    }

    proptest! {
        #[test]
        fn prop_backoff_is_monotonic(
            max_attempts in 1u32..12,
            priority in -100i64..100,
            base_ms in 1u64..60_000,
            exponential in any::<bool>(),
            gaps in proptest::collection::vec(0i64..5_000, 12),
        ) {
            let policy = RetryPolicy {
                backoff: if exponential { Backoff::Exponential } else { Backoff::Linear },
                base_delay: Duration::from_millis(base_ms),
                max_delay: Duration::from_secs(365 * 24 * 3600),
            };

            let mut now = Utc::now();
            let mut current = job(priority, max_attempts);
            let mut last_scheduled: Option<DateTime<Utc>> = None;
            let mut failures = 0;

            loop {
                failures += 1;
                let previous_priority = current.priority;
                match policy.on_failure(current, "boom", now) {
                    RetryDecision::Retry(next) => {
                        prop_assert!(failures < max_attempts);
                        prop_assert!(next.priority <= previous_priority);
                        let scheduled = next.scheduled_at.unwrap();
                        if let Some(last) = last_scheduled {
                            prop_assert!(scheduled > last);
                        }
                        last_scheduled = Some(scheduled);
                        // the poller only retries once the job is due
                        now = scheduled + chrono::Duration::milliseconds(gaps[failures as usize % gaps.len()]);
                        current = next;
                    }
                    RetryDecision::Exhausted(done) => {
                        prop_assert_eq!(failures, max_attempts);
                        prop_assert_eq!(done.attempts, max_attempts);
                        break;
                    }
                }
            }
        }
    }
}
