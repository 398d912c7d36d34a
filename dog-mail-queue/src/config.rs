use std::str::FromStr;
use std::time::Duration;

use crate::{
    retry::{Backoff, RetryPolicy},
    Priority, QueueError, QueueResult,
};

/// Configuration for the mail queue service
#[derive(Debug, Clone)]
pub struct MailQueueConfig {
    /// Time between poller ticks
    pub poll_interval: Duration,

    /// Upper bound of random jitter added to each poll interval
    pub poll_jitter: Duration,

    /// Jobs claimed per tick
    pub batch_size: usize,

    /// Delayed jobs promoted to the ready set per tick
    pub promote_batch: usize,

    /// Priority for messages that do not set one
    pub default_priority: Priority,

    /// Attempt budget for messages that do not set one
    pub default_max_attempts: u32,

    /// Backoff applied to failed deliveries
    pub retry: RetryPolicy,

    /// Upper bound for a single transport send
    pub send_timeout: Duration,
}

impl Default for MailQueueConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            poll_jitter: Duration::from_millis(100),
            batch_size: 1,
            promote_batch: 100,
            default_priority: Priority::NORMAL,
            default_max_attempts: 3,
            retry: RetryPolicy::default(),
            send_timeout: Duration::from_secs(30),
        }
    }
}

impl MailQueueConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `MAIL_QUEUE_*` environment variables over the defaults
    pub fn from_env() -> QueueResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup (environment, secrets file, test map)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> QueueResult<Self> {
        let defaults = Self::default();

        let config = Self {
            poll_interval: millis(&lookup, "MAIL_QUEUE_POLL_INTERVAL_MS", defaults.poll_interval)?,
            poll_jitter: millis(&lookup, "MAIL_QUEUE_POLL_JITTER_MS", defaults.poll_jitter)?,
            batch_size: parsed(&lookup, "MAIL_QUEUE_BATCH_SIZE", defaults.batch_size)?,
            promote_batch: parsed(&lookup, "MAIL_QUEUE_PROMOTE_BATCH", defaults.promote_batch)?,
            default_priority: parsed(&lookup, "MAIL_QUEUE_DEFAULT_PRIORITY", defaults.default_priority)?,
            default_max_attempts: parsed(&lookup, "MAIL_QUEUE_MAX_ATTEMPTS", defaults.default_max_attempts)?,
            retry: RetryPolicy {
                backoff: parsed(&lookup, "MAIL_QUEUE_BACKOFF", defaults.retry.backoff)?,
                base_delay: millis(&lookup, "MAIL_QUEUE_RETRY_BASE_MS", defaults.retry.base_delay)?,
                max_delay: millis(&lookup, "MAIL_QUEUE_RETRY_MAX_MS", defaults.retry.max_delay)?,
            },
            send_timeout: millis(&lookup, "MAIL_QUEUE_SEND_TIMEOUT_MS", defaults.send_timeout)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values the queue cannot run with
    pub fn validate(&self) -> QueueResult<()> {
        if self.poll_interval.is_zero() {
            return Err(QueueError::InvalidConfig("poll interval must be positive".into()));
        }
        if self.batch_size == 0 {
            return Err(QueueError::InvalidConfig("batch size must be at least 1".into()));
        }
        if self.default_max_attempts == 0 {
            return Err(QueueError::InvalidConfig("max attempts must be at least 1".into()));
        }
        if self.retry.base_delay.is_zero() {
            return Err(QueueError::InvalidConfig("retry base delay must be positive".into()));
        }
        if self.retry.max_delay < self.retry.base_delay {
            return Err(QueueError::InvalidConfig(
                "retry max delay must be at least the base delay".into(),
            ));
        }
        if self.send_timeout.is_zero() {
            return Err(QueueError::InvalidConfig("send timeout must be positive".into()));
        }
        Ok(())
    }

    /// Set poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set poll jitter
    pub fn with_poll_jitter(mut self, jitter: Duration) -> Self {
        self.poll_jitter = jitter;
        self
    }

    /// Set jobs claimed per tick
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set default priority
    pub fn with_default_priority(mut self, priority: Priority) -> Self {
        self.default_priority = priority;
        self
    }

    /// Set default attempt budget
    pub fn with_default_max_attempts(mut self, max_attempts: u32) -> Self {
        self.default_max_attempts = max_attempts;
        self
    }

    /// Set retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set send timeout
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }
}

fn parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> QueueResult<T> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| QueueError::InvalidConfig(format!("{key}: invalid value '{raw}'"))),
        None => Ok(default),
    }
}

fn millis(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> QueueResult<Duration> {
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    parsed(lookup, key, default_ms).map(Duration::from_millis)
}
