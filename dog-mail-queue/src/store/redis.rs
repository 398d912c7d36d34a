//! Redis-backed ordered store.
//!
//! Job payloads live in one hash keyed by job id. Two sorted sets hold only
//! ids: ready jobs scored by priority, parked jobs scored by due time (epoch
//! millis). Every mutation is a Lua script, so the id guard, the claim and the
//! promotion are each atomic across processes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use tracing::{error, info, trace};

use crate::{
    store::OrderedStore, EmailJob, QueueError, QueueResult, StoreCapabilities, StoreError,
    StoreResult,
};

// KEYS: target set, payload hash. ARGV: id, score, payload.
// The hash is the id guard for both sets.
const INSERT_SCRIPT: &str = r"
if redis.call('HSETNX', KEYS[2], ARGV[1], ARGV[3]) == 0 then
    return 0
end
redis.call('ZADD', KEYS[1], ARGV[2], ARGV[1])
return 1
";

// KEYS: ready set, payload hash. ARGV: n.
const POP_HIGHEST_SCRIPT: &str = r"
local popped = redis.call('ZPOPMAX', KEYS[1], ARGV[1])
local payloads = {}
for i = 1, #popped, 2 do
    local payload = redis.call('HGET', KEYS[2], popped[i])
    redis.call('HDEL', KEYS[2], popped[i])
    if payload then
        payloads[#payloads + 1] = payload
    end
end
return payloads
";

// KEYS: delayed set, ready set, payload hash. ARGV: now millis, limit.
const PROMOTE_DUE_SCRIPT: &str = r"
local due = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1], 'LIMIT', 0, ARGV[2])
local promoted = 0
for _, id in ipairs(due) do
    redis.call('ZREM', KEYS[1], id)
    local payload = redis.call('HGET', KEYS[3], id)
    if payload then
        local job = cjson.decode(payload)
        redis.call('ZADD', KEYS[2], job.priority, id)
        promoted = promoted + 1
    end
end
return promoted
";

/// Connection and key settings for [`RedisStore`]
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    /// Redis connection string, e.g. `redis://127.0.0.1:6379`
    pub url: String,

    /// Sorted set holding ready jobs
    pub ready_key: String,

    /// Sorted set holding parked jobs
    pub delayed_key: String,

    /// Hash of job id to job JSON
    pub jobs_key: String,
}

impl RedisStoreConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_key_prefix(url, "mail:queue")
    }

    /// Derive every key from one prefix
    pub fn with_key_prefix(url: impl Into<String>, prefix: &str) -> Self {
        Self {
            url: url.into(),
            ready_key: prefix.to_string(),
            delayed_key: format!("{prefix}:delayed"),
            jobs_key: format!("{prefix}:jobs"),
        }
    }

    /// Read `REDIS_URL` and `MAIL_QUEUE_KEY`
    pub fn from_env() -> Self {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let prefix = std::env::var("MAIL_QUEUE_KEY").unwrap_or_else(|_| "mail:queue".to_string());
        Self::with_key_prefix(url, &prefix)
    }
}

/// Ordered store shared by every process pointing at the same Redis
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    config: RedisStoreConfig,
    insert_script: Script,
    pop_script: Script,
    promote_script: Script,
}

impl RedisStore {
    /// Connect and verify the server answers `PING`
    pub async fn connect(config: RedisStoreConfig) -> QueueResult<Self> {
        info!(url = %config.url, key = %config.ready_key, "Connecting mail queue to Redis");

        let client = Client::open(config.url.as_str())
            .map_err(|e| QueueError::InvalidConfig(format!("Invalid Redis URL: {}", e)))?;
        let connection = ConnectionManager::new(client).await.map_err(unavailable)?;

        let mut conn = connection.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;

        Ok(Self {
            connection,
            config,
            insert_script: Script::new(INSERT_SCRIPT),
            pop_script: Script::new(POP_HIGHEST_SCRIPT),
            promote_script: Script::new(PROMOTE_DUE_SCRIPT),
        })
    }

    /// Add `job` to `set_key` unless its id is already stored anywhere
    async fn add(&self, set_key: &str, job: &EmailJob, score: i64) -> StoreResult<()> {
        let payload = serde_json::to_string(job)?;
        let mut conn = self.connection.clone();

        let added: i64 = self
            .insert_script
            .key(set_key)
            .key(&self.config.jobs_key)
            .arg(job.id.as_str())
            .arg(score)
            .arg(payload)
            .invoke_async(&mut conn)
            .await
            .map_err(unavailable)?;
        if added == 0 {
            return Err(StoreError::DuplicateJob(job.id.clone()));
        }
        Ok(())
    }

    /// Get the key configuration
    pub fn config(&self) -> &RedisStoreConfig {
        &self.config
    }
}

fn unavailable(err: redis::RedisError) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

#[async_trait]
impl OrderedStore for RedisStore {
    async fn insert(&self, job: EmailJob, score: i64) -> StoreResult<()> {
        self.add(&self.config.ready_key, &job, score).await?;
        trace!(job_id = %job.id, score, "Inserted job into Redis ready set");
        Ok(())
    }

    async fn pop_highest(&self, n: usize) -> StoreResult<Vec<EmailJob>> {
        if n == 0 {
            return Ok(Vec::new());
        }

        let mut conn = self.connection.clone();
        let payloads: Vec<String> = self
            .pop_script
            .key(&self.config.ready_key)
            .key(&self.config.jobs_key)
            .arg(n)
            .invoke_async(&mut conn)
            .await
            .map_err(unavailable)?;

        let mut jobs = Vec::with_capacity(payloads.len());
        for payload in payloads {
            match serde_json::from_str::<EmailJob>(&payload) {
                Ok(job) => jobs.push(job),
                // Already removed; keep the queue moving
                Err(e) => error!(error = %e, "Dropping undecodable job from Redis"),
            }
        }
        Ok(jobs)
    }

    async fn count(&self) -> StoreResult<u64> {
        let mut conn = self.connection.clone();
        conn.zcard(&self.config.ready_key).await.map_err(unavailable)
    }

    async fn schedule(&self, job: EmailJob) -> StoreResult<()> {
        let due = match job.scheduled_at {
            Some(due) if due > Utc::now() => due,
            _ => {
                let score = job.priority.value();
                return self.insert(job, score).await;
            }
        };

        self.add(&self.config.delayed_key, &job, due.timestamp_millis())
            .await?;
        trace!(job_id = %job.id, %due, "Parked job in Redis delayed set");
        Ok(())
    }

    async fn promote_due(&self, now: DateTime<Utc>, limit: usize) -> StoreResult<usize> {
        let mut conn = self.connection.clone();
        let promoted: usize = self
            .promote_script
            .key(&self.config.delayed_key)
            .key(&self.config.ready_key)
            .key(&self.config.jobs_key)
            .arg(now.timestamp_millis())
            .arg(limit)
            .invoke_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(promoted)
    }

    async fn count_delayed(&self) -> StoreResult<u64> {
        let mut conn = self.connection.clone();
        conn.zcard(&self.config.delayed_key).await.map_err(unavailable)
    }

    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities {
            delayed_segment: true,
            shared: true,
            durable: true,
        }
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
